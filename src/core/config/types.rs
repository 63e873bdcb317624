//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs that the server, store and
//! assistant consume. Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;
use std::time::Duration;

// ── Server ───────────────────────────────────────────────────────────────────

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the axum listener binds to.
    pub bind: String,
}

// ── Store ────────────────────────────────────────────────────────────────────

/// Record store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database file (already resolved against `work_dir`).
    pub path: PathBuf,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// Google Gemini provider configuration.
/// Populated from `[llm.gemini]` in the TOML.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL up to and including `/models`; the model and
    /// `:generateContent` suffix are appended per request.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Backoff policy shared by every outbound model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"`, `"openai"`, `"dummy"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub gemini: GeminiConfig,
    pub openai: OpenAiConfig,
    pub retry: RetryConfig,
}

impl LlmConfig {
    /// Model name of the active provider, for logs and the health endpoint.
    pub fn active_model(&self) -> &str {
        match self.provider.as_str() {
            "gemini" => &self.gemini.model,
            "openai" | "openai-compatible" => &self.openai.model,
            _ => "dummy",
        }
    }
}

// ── Assistant ────────────────────────────────────────────────────────────────

/// Query pipeline configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Directory holding `intent_classify.txt` and `answer_grounded.txt`.
    pub prompts_dir: PathBuf,
    /// Upper bound on the rendered context handed to the generator.
    pub max_context_chars: usize,
}

// ── Top-level ────────────────────────────────────────────────────────────────

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub assistant: AssistantConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    /// HS256 secret from `JWT_SECRET` env var. Never sourced from TOML.
    pub jwt_secret: Option<String>,
}
