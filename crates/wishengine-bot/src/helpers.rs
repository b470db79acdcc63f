//! Shared helper functions used across subcommands.

use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set.  Otherwise `LOG_LEVEL` (e.g. `DEBUG`, `info`)
/// is used, and `default_level` when neither is usable.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level_filter(env_non_empty("LOG_LEVEL").as_deref(), default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn level_filter(level: Option<&str>, default_level: &str) -> EnvFilter {
    level
        .map(|l| l.trim().to_ascii_lowercase())
        .and_then(|l| EnvFilter::try_new(l).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Read an environment variable, treating unset and blank the same.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The Telegram bot token, from `TELEGRAM_TOKEN` or `TELEGRAM_BOT_TOKEN`.
pub fn telegram_token() -> Option<String> {
    env_non_empty("TELEGRAM_TOKEN").or_else(|| env_non_empty("TELEGRAM_BOT_TOKEN"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_is_case_insensitive() {
        assert_eq!(level_filter(Some("DEBUG"), "info").to_string(), "debug");
        assert_eq!(level_filter(Some(" Warn "), "info").to_string(), "warn");
    }

    #[test]
    fn missing_or_bad_level_uses_default() {
        assert_eq!(level_filter(None, "info").to_string(), "info");
        assert_eq!(level_filter(Some("wishengine=loud"), "warn").to_string(), "warn");
    }
}
