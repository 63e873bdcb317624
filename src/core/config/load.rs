//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `SALESDESK_WORK_DIR` and `SALESDESK_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

use super::raw::{self, RawConfig};
use super::types::*;

/// Deep-merge two TOML values.
/// Tables are merged recursively — the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, returns built-in defaults.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("SALESDESK_WORK_DIR").ok();
    let log_level_override = env::var("SALESDESK_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        return load_from(
            default_path,
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let work_dir_str = work_dir_override.unwrap_or_else(|| "~/.salesdesk".to_string());
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or_else(|| "info".to_string());
    let store_path = work_dir.join(raw::default_store_path());

    Ok(Config {
        name: "salesdesk".to_string(),
        work_dir,
        log_level,
        server: ServerConfig { bind: raw::default_bind() },
        store: StoreConfig { path: store_path },
        llm: LlmConfig {
            provider: raw::default_llm_provider(),
            gemini: GeminiConfig {
                api_base_url: raw::default_gemini_api_base_url(),
                model: raw::default_gemini_model(),
                temperature: 0.2,
                timeout_seconds: 60,
            },
            openai: OpenAiConfig {
                api_base_url: raw::default_openai_api_base_url(),
                model: raw::default_openai_model(),
                temperature: 0.2,
                timeout_seconds: 60,
            },
            retry: RetryConfig {
                max_attempts: raw::default_max_attempts(),
                base_delay: Duration::from_millis(raw::default_base_delay_ms()),
            },
        },
        assistant: AssistantConfig {
            prompts_dir: PathBuf::from(raw::default_prompts_dir()),
            max_context_chars: raw::default_max_context_chars(),
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        jwt_secret: env::var("JWT_SECRET").ok(),
    })
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    let s = parsed.server;

    let work_dir_str = work_dir_override.unwrap_or(&s.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();

    let store_path = {
        let p = expand_home(&parsed.store.path);
        if p.is_absolute() { p } else { work_dir.join(p) }
    };

    if parsed.assistant.max_context_chars == 0 {
        return Err(AppError::Config(
            "assistant.max_context_chars must be greater than zero".to_string(),
        ));
    }

    Ok(Config {
        name: s.name,
        work_dir,
        log_level,
        server: ServerConfig { bind: s.bind },
        store: StoreConfig { path: store_path },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            gemini: GeminiConfig {
                api_base_url: parsed.llm.gemini.api_base_url,
                model: parsed.llm.gemini.model,
                temperature: parsed.llm.gemini.temperature,
                timeout_seconds: parsed.llm.gemini.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
            retry: RetryConfig {
                max_attempts: parsed.llm.retry.max_attempts.max(1),
                base_delay: Duration::from_millis(parsed.llm.retry.base_delay_ms),
            },
        },
        assistant: AssistantConfig {
            prompts_dir: expand_home(&parsed.assistant.prompts_dir),
            max_context_chars: parsed.assistant.max_context_chars,
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        jwt_secret: env::var("JWT_SECRET").ok(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
