//! The store contract the bot depends on.
//!
//! The bot never talks to [`MessageStoreClient`](crate::MessageStoreClient)
//! directly; it receives an `Arc<dyn MessageStore>` so that tests can
//! substitute an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wishengine_core::State;

use crate::error::Result;
use crate::message::StoredMessage;

/// Result of probing the store's `/health` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// The endpoint that was checked, as configured.
    pub endpoint: String,
    /// HTTP status code returned by `/health`.
    pub status_code: u16,
    /// Response body, truncated for display.
    pub body: String,
    /// `true` when the status code was 2xx.
    pub connected: bool,
}

/// Access to the remote message store.
///
/// Implementations perform exactly one attempt per call; there are no
/// retries.  Every call is bounded by a timeout.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The configured store endpoint, for diagnostics.
    fn endpoint(&self) -> &str;

    /// Persist `text` under `state`.
    ///
    /// `Ok(true)` means the store confirmed the write; `Ok(false)` means it
    /// answered but did not confirm it.
    async fn store(&self, text: &str, state: State) -> Result<bool>;

    /// Fetch up to `limit` messages stored under `state`, in store order.
    async fn fetch(&self, state: State, limit: usize) -> Result<Vec<StoredMessage>>;

    /// Query the store's health endpoint.
    async fn health(&self) -> Result<HealthReport>;
}
