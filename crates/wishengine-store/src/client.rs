//! HTTP client for the remote message store.
//!
//! The store exposes three endpoints, all relative to the configured base
//! URL:
//!
//! - `POST /messages` with `{"text": ..., "state": <token>}`
//! - `GET /messages?state=<token>&limit=<n>` returning a JSON array
//! - `GET /health`
//!
//! Each call is a single request bounded by the configured timeout.  Failed
//! calls are reported once and never retried.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use wishengine_core::State;

use crate::error::{Result, StoreError};
use crate::message::StoredMessage;
use crate::traits::{HealthReport, MessageStore};

/// Default endpoint when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost";

/// Default whole-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Longest response body kept in errors and health reports.
const MAX_BODY_CHARS: usize = 512;

/// Settings for [`MessageStoreClient`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store, e.g. `http://localhost` or `http://host/api`.
    pub endpoint: String,
    /// Upper bound for a whole request, body included.
    pub timeout: Duration,
    /// Upper bound for establishing the connection.
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Client for the remote message store.
///
/// Holds no per-call state: one instance can serve any number of concurrent
/// calls.
pub struct MessageStoreClient {
    /// The endpoint as configured, for diagnostics.
    endpoint: String,
    /// Parsed base URL, always ending in `/`.
    base: Url,
    /// Request timeout, kept for error reporting.
    timeout: Duration,
    http: reqwest::Client,
}

impl MessageStoreClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let base = parse_base_url(&config.endpoint)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("wishengine/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;

        info!(endpoint = %config.endpoint, timeout = ?config.timeout, "message store client ready");

        Ok(Self {
            endpoint: config.endpoint,
            base,
            timeout: config.timeout,
            http,
        })
    }

    /// Send one message to the store.
    pub async fn store_message(&self, text: &str, state: State) -> Result<bool> {
        const OP: &str = "store";
        let url = self.url("messages")?;
        let body = json!({
            "text": text,
            "state": state.token(),
        });

        debug!(url = %url, state = %state, "storing message");

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(OP, e))?;
        let raw = self.success_body(OP, response).await?;

        if raw.trim().is_empty() {
            warn!(state = %state, "store accepted the request without a confirmation body");
            return Ok(false);
        }

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::MalformedResponse {
                operation: OP,
                reason: format!("body is not JSON: {e}"),
            })?;

        let confirmed = is_confirmation(&value);
        debug!(state = %state, confirmed, "store responded");
        Ok(confirmed)
    }

    /// Fetch up to `limit` messages for `state`.
    ///
    /// Records that fail validation are logged and skipped.
    pub async fn get_messages(&self, state: State, limit: usize) -> Result<Vec<StoredMessage>> {
        const OP: &str = "fetch";
        if limit == 0 {
            debug!(state = %state, "fetch with limit 0, skipping request");
            return Ok(Vec::new());
        }

        let mut url = self.url("messages")?;
        url.query_pairs_mut()
            .append_pair("state", state.token())
            .append_pair("limit", &limit.to_string());

        debug!(url = %url, "fetching messages");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(OP, e))?;
        let raw = self.success_body(OP, response).await?;

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::MalformedResponse {
                operation: OP,
                reason: format!("body is not JSON: {e}"),
            })?;
        let Value::Array(records) = value else {
            return Err(StoreError::MalformedResponse {
                operation: OP,
                reason: "expected a JSON array of records".into(),
            });
        };

        let total = records.len();
        let mut messages = Vec::with_capacity(total.min(limit));
        for (index, record) in records.iter().enumerate() {
            if messages.len() == limit {
                break;
            }
            match StoredMessage::from_record(record, state) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!(state = %state, index, error = %e, record = %record, "skipping invalid record");
                }
            }
        }

        debug!(state = %state, received = total, kept = messages.len(), "fetch completed");
        Ok(messages)
    }

    /// Query `/health`.
    ///
    /// Any HTTP answer is a report; only transport failures are errors.
    pub async fn check_health(&self) -> Result<HealthReport> {
        const OP: &str = "health check";
        let url = self.url("health")?;

        debug!(url = %url, "checking store health");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(OP, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(OP, e))?;

        let report = HealthReport {
            endpoint: self.endpoint.clone(),
            status_code: status.as_u16(),
            body: truncate(&body),
            connected: status.is_success(),
        };
        info!(status = report.status_code, connected = report.connected, "store health checked");
        Ok(report)
    }

    // -- Private helpers ----------------------------------------------------

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| StoreError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: format!("cannot build request URL: {e}"),
            })
    }

    fn transport_error(&self, operation: &'static str, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout {
                operation,
                timeout: self.timeout,
            }
        } else {
            StoreError::Network {
                operation,
                reason: e.to_string(),
            }
        }
    }

    /// Read the body of a 2xx response, or turn anything else into
    /// [`StoreError::Status`].
    async fn success_body(
        &self,
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if !status.is_success() {
            return Err(StoreError::Status {
                operation,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MessageStore for MessageStoreClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn store(&self, text: &str, state: State) -> Result<bool> {
        self.store_message(text, state).await
    }

    async fn fetch(&self, state: State, limit: usize) -> Result<Vec<StoredMessage>> {
        self.get_messages(state, limit).await
    }

    async fn health(&self) -> Result<HealthReport> {
        self.check_health().await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse the configured endpoint into a base URL that relative paths can be
/// joined onto without dropping its last path segment.
fn parse_base_url(endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| StoreError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be used as a base".into()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Whether a 2xx JSON body confirms the write.
///
/// Only an object without `"ok": false` / `"success": false`, or the bare
/// literal `true`, confirms.  `null`, numbers, strings and arrays do not.
fn is_confirmation(body: &Value) -> bool {
    match body {
        Value::Bool(b) => *b,
        Value::Object(obj) => !["ok", "success"]
            .iter()
            .any(|key| obj.get(*key) == Some(&Value::Bool(false))),
        Value::Null | Value::Number(_) | Value::String(_) | Value::Array(_) => false,
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
