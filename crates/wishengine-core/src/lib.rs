//! Reply classification for wishengine.
//!
//! This crate provides:
//!
//! - **State model**: the closed set of outcomes and their store tokens via
//!   [`state::State`].
//! - **Rules**: deterministic phrase tables and matchers via
//!   [`rules::RuleSet`].
//! - **Parser**: cleaning, classification and acknowledgment of a reply via
//!   [`parser::Parser`].

pub mod error;
pub mod parser;
pub mod rules;
pub mod state;

pub use error::{Result, UnknownStateError};
pub use parser::{ClassificationResult, Parser, Responses, clean_reply};
pub use rules::{RuleSet, Verdict};
pub use state::State;
