//! Axum handlers for `/api/*` routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::assistant::AssistantError;

use super::AppState;
use super::auth::CallerId;

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct QueryRequest {
    #[serde(default)]
    query: String,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
pub(super) fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> Response {
        let body = json!({
            "message": "Failed to process AI query",
            "error": self.code(),
            "detail": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    let body = json!({
        "status": "ok",
        "provider": state.assistant.provider().name(),
        "model": &*state.model,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// POST /api/assistant/query
pub(super) async fn query(
    State(state): State<AppState>,
    CallerId(caller_id): CallerId,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(json) => json,
        Err(rejection) => {
            return (StatusCode::BAD_REQUEST, json_error("invalid_request", rejection.body_text()))
                .into_response();
        }
    };

    let query = req.query.trim();
    if query.is_empty() {
        return (StatusCode::BAD_REQUEST, json_error("invalid_request", "Query is required"))
            .into_response();
    }

    info!(%caller_id, query_len = query.len(), "assistant query received");
    match state.assistant.answer(&caller_id, query).await {
        Ok(answer) => (StatusCode::OK, Json(json!({ "answer": answer }))).into_response(),
        Err(e) => {
            error!(%caller_id, code = e.code(), error = %e, "assistant query failed");
            e.into_response()
        }
    }
}
