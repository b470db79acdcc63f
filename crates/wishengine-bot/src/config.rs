//! Bot configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults.
//! 2. `config/default.toml` (`[bot]`, `[store]`, `[messages]`, `[rules]`),
//!    read field by field so a bad or missing value only falls back for that
//!    field.
//! 3. Environment variables: `API_ENDPOINT` and `HEALTH_BIND`.
//!
//! The Telegram token is not part of this struct; it is read from the
//! environment by the `run` subcommand only.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use wishengine_core::{Responses, RuleSet};
use wishengine_store::StoreConfig;
use wishengine_store::client::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS,
};

/// Location of the optional configuration file.
pub const CONFIG_PATH: &str = "config/default.toml";

/// Name the bot introduces itself with.
pub const DEFAULT_BOT_NAME: &str = "wishengine";

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name used in greetings and the empty `/fetch` reply.
    pub bot_name: String,
    /// Telegram long-polling timeout in seconds.
    pub poll_timeout: u64,
    /// Messages fetched per state by `/fetch`.
    pub fetch_limit: usize,
    /// Address of the health endpoint.
    pub health_bind: String,

    /// Message store base URL.
    pub store_endpoint: String,
    /// Store request timeout in seconds.
    pub store_timeout_secs: u64,
    /// Store connect timeout in seconds.
    pub store_connect_timeout_secs: u64,

    /// Acknowledgment templates.
    pub responses: Responses,
    /// Optional `/start` greeting override; `{name}` is the bot name.
    pub start_message: Option<String>,

    /// Extra affirmative phrases appended to the built-in table.
    pub extra_affirmative: Vec<String>,
    /// Extra negative phrases appended to the built-in table.
    pub extra_negative: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_name: DEFAULT_BOT_NAME.to_string(),
            poll_timeout: 30,
            fetch_limit: 1,
            health_bind: "0.0.0.0:8080".to_string(),
            store_endpoint: DEFAULT_ENDPOINT.to_string(),
            store_timeout_secs: DEFAULT_TIMEOUT_SECS,
            store_connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            responses: Responses::default(),
            start_message: None,
            extra_affirmative: Vec::new(),
            extra_negative: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from [`CONFIG_PATH`] and the process environment.
    pub fn load() -> Self {
        let mut config = Self::from_file(Path::new(CONFIG_PATH));
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Defaults overlaid with the given TOML file, if it can be read.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no config file, using defaults");
                Self::default()
            }
        }
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml_str(content: &str) -> Self {
        let mut config = Self::default();

        let table: toml::Table = match content.parse() {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "config file is not valid TOML, using defaults");
                return config;
            }
        };

        if let Some(toml::Value::Table(bot)) = table.get("bot") {
            if let Some(name) = non_empty_str(bot, "name") {
                config.bot_name = name;
            }
            if let Some(v) = bot.get("poll_timeout").and_then(|v| v.as_integer()) {
                config.poll_timeout = v.clamp(0, 50) as u64;
            }
            if let Some(v) = bot.get("fetch_limit").and_then(|v| v.as_integer()) {
                config.fetch_limit = v.max(0) as usize;
            }
            if let Some(bind) = non_empty_str(bot, "health_bind") {
                config.health_bind = bind;
            }
        }

        if let Some(toml::Value::Table(store)) = table.get("store") {
            if let Some(endpoint) = non_empty_str(store, "endpoint") {
                config.store_endpoint = endpoint;
            }
            if let Some(v) = store.get("timeout_secs").and_then(|v| v.as_integer()) {
                config.store_timeout_secs = v.max(1) as u64;
            }
            if let Some(v) = store.get("connect_timeout_secs").and_then(|v| v.as_integer()) {
                config.store_connect_timeout_secs = v.max(1) as u64;
            }
        }

        if let Some(toml::Value::Table(messages)) = table.get("messages") {
            if let Some(positive) = non_empty_str(messages, "positive") {
                config.responses.positive = positive;
            }
            if let Some(negative) = non_empty_str(messages, "negative") {
                config.responses.negative = negative;
            }
            config.start_message = non_empty_str(messages, "start");
        }

        if let Some(toml::Value::Table(rules)) = table.get("rules") {
            config.extra_affirmative = string_list(rules, "affirmative");
            config.extra_negative = string_list(rules, "negative");
        }

        config
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = non_empty("API_ENDPOINT") {
            self.store_endpoint = endpoint.trim().to_string();
        }
        if let Some(bind) = non_empty("HEALTH_BIND") {
            self.health_bind = bind.trim().to_string();
        }
    }

    /// Settings for the store client.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            endpoint: self.store_endpoint.clone(),
            timeout: Duration::from_secs(self.store_timeout_secs),
            connect_timeout: Duration::from_secs(self.store_connect_timeout_secs),
        }
    }

    /// Build the classification rules, built-ins plus configured extras.
    pub fn rule_set(&self) -> Arc<RuleSet> {
        Arc::new(RuleSet::with_extra_phrases(
            &self.extra_affirmative,
            &self.extra_negative,
        ))
    }
}

fn non_empty_str(table: &toml::Table, key: &str) -> Option<String> {
    table
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(table: &toml::Table, key: &str) -> Vec<String> {
    table
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use wishengine_core::State;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml"));
        assert_eq!(config.bot_name, "wishengine");
        assert_eq!(config.fetch_limit, 1);
        assert_eq!(config.store_endpoint, "http://localhost");
        assert_eq!(config.health_bind, "0.0.0.0:8080");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[bot]
name = "askbot"
poll_timeout = 20
fetch_limit = 3

[store]
endpoint = "http://store:8000/api"
timeout_secs = 2

[messages]
positive = "yay {{text}}"
start = "hi from {{name}}"

[rules]
affirmative = ["oui", "ja"]
negative = ["non"]
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path());
        assert_eq!(config.bot_name, "askbot");
        assert_eq!(config.poll_timeout, 20);
        assert_eq!(config.fetch_limit, 3);
        assert_eq!(config.store_endpoint, "http://store:8000/api");
        assert_eq!(config.store_timeout_secs, 2);
        assert_eq!(config.store_connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.responses.positive, "yay {text}");
        assert_eq!(config.responses.negative, Responses::default().negative);
        assert_eq!(config.start_message.as_deref(), Some("hi from {name}"));
        assert_eq!(config.extra_affirmative, ["oui", "ja"]);
        assert_eq!(config.extra_negative, ["non"]);
    }

    #[test]
    fn bad_values_fall_back_per_field() {
        let config = AppConfig::from_toml_str(
            r#"
[bot]
name = ""
fetch_limit = "lots"
poll_timeout = 500
"#,
        );
        assert_eq!(config.bot_name, "wishengine");
        assert_eq!(config.fetch_limit, 1);
        assert_eq!(config.poll_timeout, 50);
    }

    #[test]
    fn invalid_toml_gives_defaults() {
        let config = AppConfig::from_toml_str("this is = = not toml");
        assert_eq!(config.bot_name, "wishengine");
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> =
            HashMap::from([("API_ENDPOINT", " http://api:9000 "), ("HEALTH_BIND", "")]);
        let mut config = AppConfig::from_toml_str("[store]\nendpoint = \"http://file\"\n");
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.store_endpoint, "http://api:9000");
        assert_eq!(config.health_bind, "0.0.0.0:8080");
    }

    #[test]
    fn store_config_uses_seconds() {
        let config = AppConfig {
            store_timeout_secs: 3,
            store_connect_timeout_secs: 1,
            ..AppConfig::default()
        };
        let store = config.store_config();
        assert_eq!(store.timeout, Duration::from_secs(3));
        assert_eq!(store.connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn rule_set_includes_extras() {
        let config = AppConfig {
            extra_negative: vec!["nein".into()],
            ..AppConfig::default()
        };
        let rules = config.rule_set();
        assert_eq!(rules.evaluate("", "nein danke").state(), State::Negative);
    }
}
