//! Core error types.
//!
//! The classifier itself never fails: unclassifiable input resolves to
//! [`State::Unknown`](crate::State::Unknown).  The only error surfaced by this
//! crate concerns state tokens arriving from outside (the remote store or
//! configuration).

/// A state token that does not name any [`State`](crate::State).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown state token `{token}`")]
pub struct UnknownStateError {
    /// The token as it was received.
    pub token: String,
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, UnknownStateError>;
