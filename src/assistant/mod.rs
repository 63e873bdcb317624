//! `assistant` — the query pipeline.
//!
//! ```text
//! query ─▶ classify ─▶ retrieve ─▶ format context ─▶ generate ─▶ answer
//! ```
//!
//! Stages run strictly in sequence. Both model calls share one
//! [`RetryPolicy`]; retrieval runs on the blocking pool because the store
//! is synchronous. Nothing is persisted between requests.

pub mod context;
pub mod date_range;
pub mod intent;
pub mod prompt;
pub mod retrieval;

use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{LlmProvider, ProviderError, RetryPolicy};
use crate::store::BusinessStore;

use intent::IntentResult;
use retrieval::RetrievedData;

// ── Stage / error ────────────────────────────────────────────────────────────

/// Per-request lifecycle, recorded on the request span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classifying,
    Retrieving,
    Formatting,
    Generating,
    Answered,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Classifying => "classifying",
            Stage::Retrieving => "retrieving",
            Stage::Formatting => "formatting",
            Stage::Generating => "generating",
            Stage::Answered => "answered",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal pipeline failures. Each maps to a distinct `error` code on the wire.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("intent classification failed: {0}")]
    Classification(#[source] ProviderError),

    #[error("data retrieval failed: {0}")]
    Retrieval(String),

    #[error("answer generation failed: {0}")]
    Generation(#[source] ProviderError),

    #[error("answer generation returned a malformed response: {0}")]
    MalformedAnswer(String),
}

impl AssistantError {
    pub fn code(&self) -> &'static str {
        match self {
            AssistantError::Classification(_) => "classification_failed",
            AssistantError::Retrieval(_) => "retrieval_failed",
            AssistantError::Generation(_) => "generation_failed",
            AssistantError::MalformedAnswer(_) => "malformed_answer",
        }
    }
}

// ── Assistant ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Assistant {
    store: BusinessStore,
    provider: LlmProvider,
    retry: RetryPolicy,
    prompts_dir: PathBuf,
    max_context_chars: usize,
}

impl Assistant {
    pub fn new(store: BusinessStore, provider: LlmProvider, config: &Config) -> Self {
        Self {
            store,
            provider,
            retry: RetryPolicy::from(&config.llm.retry),
            prompts_dir: config.assistant.prompts_dir.clone(),
            max_context_chars: config.assistant.max_context_chars,
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Answer `query` for `caller_id` against the caller's own records.
    pub async fn answer(&self, caller_id: &str, query: &str) -> Result<String, AssistantError> {
        self.answer_at(caller_id, query, Local::now().naive_local()).await
    }

    /// [`answer`](Self::answer) with an explicit "now" for period phrases.
    pub async fn answer_at(
        &self,
        caller_id: &str,
        query: &str,
        now: NaiveDateTime,
    ) -> Result<String, AssistantError> {
        let span = info_span!(
            "assistant_query",
            request_id = %Uuid::new_v4(),
            %caller_id,
            stage = %Stage::Received,
        );
        async move {
            let result = self.run_stages(caller_id, query, now).await;
            match &result {
                Ok(answer) => {
                    enter(Stage::Answered);
                    info!(answer_len = answer.len(), "query answered");
                }
                Err(e) => {
                    enter(Stage::Failed);
                    warn!(error = %e, code = e.code(), "query failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        caller_id: &str,
        query: &str,
        now: NaiveDateTime,
    ) -> Result<String, AssistantError> {
        enter(Stage::Classifying);
        let intent = self.classify(query).await?;

        enter(Stage::Retrieving);
        let data = self.retrieve(caller_id, intent, now).await?;

        enter(Stage::Formatting);
        let context = context::format_context(&data, self.max_context_chars);
        debug!(context_len = context.len(), "context assembled");

        enter(Stage::Generating);
        self.generate(query, &context).await
    }

    /// Classify `query`. Unparseable replies degrade to `general_question`;
    /// only a failed call is an error.
    pub async fn classify(&self, query: &str) -> Result<IntentResult, AssistantError> {
        let prompt = prompt::classification_prompt(&self.prompts_dir, query);
        match self.provider.complete_with_retry(&prompt, &self.retry).await {
            Ok(reply) => Ok(intent::normalize(&reply)),
            Err(ProviderError::MalformedResponse(detail)) => {
                warn!(%detail, "classifier response had no text — falling back to general_question");
                Ok(IntentResult::fallback())
            }
            Err(e) => Err(AssistantError::Classification(e)),
        }
    }

    pub async fn retrieve(
        &self,
        caller_id: &str,
        intent: IntentResult,
        now: NaiveDateTime,
    ) -> Result<RetrievedData, AssistantError> {
        let store = self.store.clone();
        let owner = caller_id.to_string();
        let span = Span::current();
        tokio::task::spawn_blocking(move || {
            let _guard = span.enter();
            retrieval::retrieve(&store, &owner, &intent, now)
        })
        .await
        .map_err(|e| AssistantError::Retrieval(format!("retrieval task failed: {e}")))?
        .map_err(|e| AssistantError::Retrieval(e.to_string()))
    }

    /// Ask the model for an answer grounded in `context`. The reply is
    /// returned verbatim.
    pub async fn generate(&self, query: &str, context: &str) -> Result<String, AssistantError> {
        let prompt = prompt::answer_prompt(&self.prompts_dir, query, context);
        self.provider
            .complete_with_retry(&prompt, &self.retry)
            .await
            .map_err(|e| match e {
                ProviderError::MalformedResponse(detail) => AssistantError::MalformedAnswer(detail),
                other => AssistantError::Generation(other),
            })
    }
}

fn enter(stage: Stage) {
    Span::current().record("stage", tracing::field::display(stage));
    debug!(%stage, "stage");
}
