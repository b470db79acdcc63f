//! The closed set of classification outcomes.
//!
//! [`State`] is the only place state tokens are spelled out.  The tokens are
//! part of the contract with the remote message store: they are sent as the
//! `state` field when storing and as the `state` query value when fetching,
//! so they must not change independently of the store's schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, UnknownStateError};

/// Classification outcome for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// The reply agrees with the prompt.
    Positive,
    /// The reply disagrees with the prompt.
    Negative,
    /// The reply could not be classified.
    #[default]
    Unknown,
}

impl State {
    /// Every state, in declaration order.
    pub const ALL: [State; 3] = [State::Positive, State::Negative, State::Unknown];

    /// The canonical token for this state.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a token into a state.
    ///
    /// Matching ignores surrounding whitespace and ASCII case, so `"POSITIVE"`
    /// and `" positive "` both resolve; anything else is an
    /// [`UnknownStateError`].
    pub fn from_token(token: &str) -> Result<Self> {
        let trimmed = token.trim();
        Self::ALL
            .into_iter()
            .find(|state| state.token().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStateError {
                token: token.to_string(),
            })
    }

    /// Parse a token, degrading to [`State::Unknown`] on failure.
    ///
    /// Used on data received from outside the process, where an unexpected
    /// token must not abort the surrounding operation.
    pub fn from_token_lossy(token: &str) -> Self {
        match Self::from_token(token) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "unrecognised state token, treating as unknown");
                Self::Unknown
            }
        }
    }

    /// Whether this state represents a successful classification.
    pub const fn is_classified(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for State {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
