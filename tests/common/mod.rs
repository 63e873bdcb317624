//! Shared fixtures for integration tests: a scripted OpenAI-compatible
//! model server, store seeding and token minting.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{NaiveDate, NaiveDateTime};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use salesdesk::config::Config;
use salesdesk::store::{BusinessStore, NewExpense};

pub const OWNER: &str = "owner-1";
pub const JWT_SECRET: &str = "test-secret";

// ── Scripted model server ────────────────────────────────────────────────────

/// One canned reply, consumed in order.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Status(u16),
    /// 200 with no choices.
    Empty,
}

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
}

pub struct MockLlm {
    pub url: String,
    state: Arc<MockState>,
}

impl MockLlm {
    pub async fn spawn(script: Vec<Scripted>) -> Self {
        let state = Arc::new(MockState {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/chat/completions", post(complete))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url: format!("http://{addr}/v1/chat/completions"), state }
    }

    /// Prompts received so far, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.state.prompts.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.state.prompts.lock().unwrap().len()
    }
}

async fn complete(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default().to_string();
    state.prompts.lock().unwrap().push(prompt);

    let next = state.script.lock().unwrap().pop_front();
    match next {
        Some(Scripted::Reply(text)) => Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        }))
        .into_response(),
        Some(Scripted::Status(code)) => {
            let status = StatusCode::from_u16(code).unwrap();
            (status, Json(json!({ "error": { "message": "scripted failure" } }))).into_response()
        }
        Some(Scripted::Empty) => Json(json!({ "choices": [] })).into_response(),
        None => (StatusCode::IM_A_TEAPOT, "script exhausted").into_response(),
    }
}

// ── Config / store ───────────────────────────────────────────────────────────

/// Test config pointing the OpenAI-compatible provider at `mock`.
pub fn config_for(work_dir: &Path, mock: &MockLlm) -> Config {
    let mut config = Config::test_default(work_dir);
    config.llm.provider = "openai".into();
    config.llm.openai.api_base_url = mock.url.clone();
    config.llm.openai.timeout_seconds = 5;
    config.assistant.prompts_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/prompts");
    config
}

pub fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

pub fn add_expense(store: &BusinessStore, owner: &str, category: &str, amount: f64, date: NaiveDateTime) {
    store
        .insert_expense(
            owner,
            &NewExpense {
                category: category.into(),
                description: format!("{category} expense"),
                amount,
                date,
            },
        )
        .unwrap();
}

// ── Auth ─────────────────────────────────────────────────────────────────────

pub fn token_for(owner: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "id": owner }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
