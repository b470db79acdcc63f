//! The validated shape of a stored message.
//!
//! Records come back from the store as loosely-typed JSON.  They are checked
//! here, one at a time, before anything else in the process sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use wishengine_core::State;

use crate::error::InvalidRecord;

/// A message as persisted by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned identifier, when the store reports one.
    pub id: Option<String>,

    /// The stored clean text.
    pub text: String,

    /// The classification the text was stored under.
    pub state: State,

    /// Store-assigned creation time, when the store reports one.
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredMessage {
    /// Validate one raw record from a fetch for `requested` state.
    ///
    /// Only `text` is required.  A missing `state` means the record belongs
    /// to the requested state; an unrecognised one degrades to
    /// [`State::Unknown`].  `id` may be a string or a number; the timestamp
    /// is read from `created_at` or `timestamp` as RFC 3339.
    pub fn from_record(record: &Value, requested: State) -> Result<Self, InvalidRecord> {
        let obj = record.as_object().ok_or(InvalidRecord::NotAnObject)?;

        let text = obj
            .get("text")
            .and_then(Value::as_str)
            .ok_or(InvalidRecord::MissingText)?
            .to_string();

        let state = match obj.get("state").and_then(Value::as_str) {
            Some(token) => State::from_token_lossy(token),
            None => requested,
        };

        let id = match obj.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let created_at = obj
            .get("created_at")
            .or_else(|| obj.get("timestamp"))
            .and_then(Value::as_str)
            .and_then(|raw| match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(e) => {
                    debug!(raw, error = %e, "ignoring unparseable record timestamp");
                    None
                }
            });

        Ok(Self {
            id,
            text,
            state,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
