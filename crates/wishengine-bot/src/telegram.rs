//! Minimal Telegram Bot API client.
//!
//! Only the three methods the bot needs are wrapped: `getMe`, `getUpdates`
//! (long polling) and `sendMessage`.  The token is part of every request URL,
//! so transport errors are stripped of their URL before they are surfaced.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::handler::Responder;

/// Public Bot API host.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Longest chunk sent in one `sendMessage` call (Telegram's hard limit is
/// 4096 characters).
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Timeout for calls other than long polling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client bound to one bot token.
pub struct TelegramClient {
    /// `{base}/bot{token}`.
    api: String,
    http: reqwest::Client,
}

impl TelegramClient {
    /// Client for the public Bot API.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base(TELEGRAM_API_BASE, token)
    }

    /// Client for a Bot API server at `base`.
    pub fn with_base(base: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("wishengine/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Telegram HTTP client")?;
        Ok(Self {
            api: format!("{}/bot{token}", base.trim_end_matches('/')),
            http,
        })
    }

    /// Username of the bot behind the token.
    pub async fn get_me(&self) -> Result<String> {
        let me = self.call("getMe", json!({}), REQUEST_TIMEOUT).await?;
        me.get("username")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("getMe response has no username"))
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout` seconds.
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Value>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout,
            "allowed_updates": ["message"],
        });
        // The HTTP timeout must outlast the server-side long poll.
        let result = self
            .call("getUpdates", body, Duration::from_secs(timeout) + REQUEST_TIMEOUT)
            .await?;
        match result {
            Value::Array(updates) => Ok(updates),
            other => bail!("getUpdates returned a non-array result: {other}"),
        }
    }

    /// Send `text` to `chat_id`, split into chunks Telegram accepts.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": chunk }),
                REQUEST_TIMEOUT,
            )
            .await?;
        }
        Ok(())
    }

    async fn call(&self, method: &str, body: Value, timeout: Duration) -> Result<Value> {
        debug!(method, "calling Telegram");
        let response = self
            .http
            .post(format!("{}/{method}", self.api))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Telegram {method} request failed"))?;

        let json: Value = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Telegram {method} returned an unreadable body"))?;

        parse_telegram_response(&json).with_context(|| format!("Telegram {method} failed"))
    }
}

#[async_trait]
impl Responder for TelegramClient {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await
    }
}

// ---------------------------------------------------------------------------
// Response and update parsing
// ---------------------------------------------------------------------------

/// Unwrap a Bot API envelope: the `result` on `"ok": true`, the
/// description otherwise.
pub fn parse_telegram_response(body: &Value) -> Result<Value> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body.get("result").cloned().unwrap_or(Value::Null));
    }
    let description = body
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("no description");
    let code = body.get("error_code").and_then(Value::as_i64).unwrap_or(0);
    Err(anyhow!("Telegram API error {code}: {description}"))
}

/// The parts of an incoming text message the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    /// Text of the message this one replies to, if any.
    pub reply_to_text: Option<String>,
    /// Sender's username or first name, for logs.
    pub from: Option<String>,
}

impl IncomingMessage {
    /// Extract a text message from an update, or `None` for anything else.
    pub fn from_update(update: &Value) -> Option<Self> {
        let message = update.get("message")?;
        let text = message.get("text")?.as_str()?.to_string();
        let chat_id = message.get("chat")?.get("id")?.as_i64()?;
        let message_id = message.get("message_id").and_then(Value::as_i64).unwrap_or(0);

        let reply_to_text = message
            .get("reply_to_message")
            .and_then(|r| r.get("text").or_else(|| r.get("caption")))
            .and_then(Value::as_str)
            .map(str::to_string);

        let from = message.get("from").and_then(|f| {
            f.get("username")
                .or_else(|| f.get("first_name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        Some(Self {
            chat_id,
            message_id,
            text,
            reply_to_text,
            from,
        })
    }
}

/// Split `text` into chunks of at most `max_len` bytes, preferring line then
/// word boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_owned());
            break;
        }

        let mut boundary = max_len;
        while boundary > 0 && !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }
        if boundary == 0 {
            // max_len is smaller than the first character.
            boundary = remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i);
        }

        let head = &remaining[..boundary];
        let split_at = match head.rfind('\n').or_else(|| head.rfind(' ')) {
            Some(0) | None => boundary,
            Some(i) => i,
        };

        chunks.push(remaining[..split_at].to_owned());
        remaining = remaining[split_at..].trim_start();
    }

    if chunks.len() > 1 {
        debug!(parts = chunks.len(), "outgoing message split");
    }
    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
