//! Logging for the salesdesk server.
//!
//! [`init`] installs one global fmt subscriber on stderr. Which filter wins,
//! the configured level or `RUST_LOG`, depends on whether the level came
//! from the command line.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// HTTP plumbing that is noisy at debug; held at warn unless `RUST_LOG`
/// or a full directive says otherwise.
const QUIET_DEPS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Initialise the global tracing subscriber.
///
/// `level` is a bare level (`"info"`, `"debug"`, ...) or a full `EnvFilter`
/// directive. With `prefer_level`, `level` wins and `RUST_LOG` is only the
/// fallback; otherwise the other way round.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, prefer_level, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn build_filter(
    level: &str,
    prefer_level: bool,
    rust_log: Option<&str>,
) -> Result<EnvFilter, AppError> {
    let configured = EnvFilter::try_new(with_quiet_deps(level));
    let from_env = rust_log.map(EnvFilter::try_new);

    match (prefer_level, configured, from_env) {
        (true, Ok(filter), _) => Ok(filter),
        (false, _, Some(Ok(filter))) => Ok(filter),
        (_, Ok(filter), _) => Ok(filter),
        (_, Err(_), Some(Ok(filter))) => Ok(filter),
        (_, Err(e), _) => Err(AppError::Logger(format!("invalid log level '{level}': {e}"))),
    }
}

/// Bare levels get [`QUIET_DEPS`] appended; full directives pass through.
fn with_quiet_deps(level: &str) -> String {
    match level.trim().parse::<LevelFilter>() {
        Ok(LevelFilter::OFF) | Err(_) => level.to_string(),
        Ok(_) => format!("{},{}", level.trim(), QUIET_DEPS.join(",")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_quiets_http_deps() {
        let directive = with_quiet_deps("debug");
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("hyper=warn"));
        assert_eq!(with_quiet_deps("salesdesk=trace"), "salesdesk=trace");
        assert_eq!(with_quiet_deps("off"), "off");
    }

    #[test]
    fn cli_level_beats_rust_log() {
        let filter = build_filter("debug", true, Some("warn")).unwrap().to_string();
        assert!(filter.contains("debug"), "{filter}");
        assert!(filter.contains("reqwest=warn"), "{filter}");
    }

    #[test]
    fn rust_log_beats_config_level() {
        let filter = build_filter("info", false, Some("salesdesk=trace")).unwrap().to_string();
        assert_eq!(filter, "salesdesk=trace");
    }

    #[test]
    fn unparsable_rust_log_falls_back_to_level() {
        let filter = build_filter("info", false, Some("salesdesk=loud")).unwrap().to_string();
        assert!(filter.contains("info"), "{filter}");
    }

    #[test]
    fn nothing_usable_is_a_logger_error() {
        let err = build_filter("salesdesk=loud", true, None).unwrap_err();
        assert!(matches!(err, AppError::Logger(ref msg) if msg.contains("salesdesk=loud")));
    }

    #[test]
    fn init_succeeds_or_is_already_set() {
        // Another test in this process may have installed a subscriber first.
        match init("info", true) {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
