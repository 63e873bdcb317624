//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `SALESDESK_WORK_DIR` and `SALESDESK_LOG_LEVEL` env overrides.
//! Secrets (`LLM_API_KEY`, `JWT_SECRET`) only ever come from the environment.
//!
//! # Module layout
//!
//! - **types** — Public configuration structs (`Config`, `LlmConfig`, …).
//! - **raw** — Raw TOML deserialization types; kept private.
//! - **load** — `merge_toml`, `load_raw_merged`, `load`, `load_from`,
//!   `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Safe `Config` for tests — dummy LLM, no API keys, no external calls.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            server: ServerConfig { bind: "127.0.0.1:0".into() },
            store: StoreConfig { path: work_dir.join("test.db") },
            llm: LlmConfig {
                provider: "dummy".into(),
                gemini: GeminiConfig {
                    api_base_url: "http://localhost:0/v1beta/models".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
                retry: RetryConfig {
                    max_attempts: 3,
                    base_delay: std::time::Duration::from_millis(1),
                },
            },
            assistant: AssistantConfig {
                prompts_dir: std::path::PathBuf::from("config/prompts"),
                max_context_chars: 8000,
            },
            llm_api_key: None,
            jwt_secret: Some("test-secret".into()),
        }
    }
}
