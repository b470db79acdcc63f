//! Slash commands and their reply texts.

use wishengine_core::State;
use wishengine_store::StoredMessage;

/// Commands the bot answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Ping,
    Fetch,
}

impl Command {
    /// Parse the leading command of `text`.
    ///
    /// `/cmd@name` is accepted only when `name` matches `bot_username`
    /// (case-insensitively); commands addressed to other bots are ignored.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let word = text.trim_start().split_whitespace().next()?;
        let word = word.strip_prefix('/')?;

        let name = match word.split_once('@') {
            Some((name, target)) => {
                let ours = bot_username.is_some_and(|u| u.eq_ignore_ascii_case(target));
                if !ours {
                    return None;
                }
                name
            }
            None => word,
        };

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "ping" => Some(Self::Ping),
            "fetch" => Some(Self::Fetch),
            _ => None,
        }
    }
}

/// Default `/start` greeting; `{name}` is replaced by the bot name.
pub const DEFAULT_START_MESSAGE: &str = "Hello! I am your test bot. My name is {name}";

pub const HELP_TEXT: &str = "Available commands:
/start - Start the bot
/help - Show this help message

/ping - Check if bot is connected to server
/fetch - Show last messages in server

Reply to any of my messages and I will note whether you said yes or no.";

pub fn start_text(template: Option<&str>, bot_name: &str) -> String {
    template
        .unwrap_or(DEFAULT_START_MESSAGE)
        .replace("{name}", bot_name)
}

pub fn ping_text(healthy: bool) -> String {
    let status = if healthy { "healthy" } else { "unhealthy" };
    format!("pong! connection to server is {status}")
}

/// Render `/fetch` results as numbered `[state] text` blocks.
pub fn format_fetch(groups: &[(State, Vec<StoredMessage>)], bot_name: &str) -> String {
    let lines: Vec<String> = groups
        .iter()
        .flat_map(|(state, messages)| messages.iter().map(move |m| format!("[{state}] {}", m.text)))
        .enumerate()
        .map(|(i, line)| format!("Message #{i}:\n{line}"))
        .collect();

    if lines.is_empty() {
        return format!("No messages found from me ({bot_name})");
    }
    lines.join("\n\n")
}
