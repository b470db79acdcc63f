//! Store client error types.
//!
//! Every failed interaction with the remote store surfaces as a
//! [`StoreError`].  None of them is fatal to the bot: callers log the error
//! and carry on.  Per-record validation failures during a fetch are
//! [`InvalidRecord`]s; they are logged and the record is skipped, they never
//! fail the fetch as a whole.

use std::time::Duration;

/// Unified error type for the message store client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // -- Setup ----------------------------------------------------------------
    /// The configured endpoint is not a usable HTTP base URL.
    #[error("invalid store endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    // -- Transport ------------------------------------------------------------
    /// The request did not complete within the configured timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The store could not be reached (connection refused, DNS, reset, ...).
    #[error("{operation} failed: {reason}")]
    Network {
        operation: &'static str,
        reason: String,
    },

    // -- Response -------------------------------------------------------------
    /// The store answered with a non-success HTTP status.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed response to {operation}: {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },
}

impl StoreError {
    /// Whether the error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Why a single fetched record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRecord {
    /// The record is not a JSON object.
    #[error("record is not an object")]
    NotAnObject,

    /// The record has no string `text` field.
    #[error("record has no string `text` field")]
    MissingText,
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;
