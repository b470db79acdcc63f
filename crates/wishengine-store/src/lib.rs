//! Remote message store access for wishengine.
//!
//! [`MessageStoreClient`] implements the [`MessageStore`] contract over HTTP:
//! storing classified replies, fetching them back by state, and probing the
//! store's health.  Fetched records are validated into [`StoredMessage`]s at
//! the boundary; malformed ones are skipped individually.

pub mod client;
pub mod error;
pub mod message;
pub mod traits;

pub use client::{MessageStoreClient, StoreConfig};
pub use error::{InvalidRecord, Result, StoreError};
pub use message::StoredMessage;
pub use traits::{HealthReport, MessageStore};
