//! Reply parser: turns a `(prompt, reply)` pair into a classified result.
//!
//! Processing happens in three stages:
//!
//! 1. **Clean**: surrounding whitespace, leading `@mention` tokens and a
//!    leading `[state]` tag are removed and whitespace runs are collapsed.
//!    The result is the canonical form that gets stored.
//! 2. **Classify**: the clean text, lowercased and with typographic
//!    apostrophes folded to `'`, is evaluated against the [`RuleSet`].  Ambiguous and unmatched replies become [`State::Unknown`].
//! 3. **Respond**: classified replies render an acknowledgment template;
//!    unknown replies produce an empty response, meaning "send nothing".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::{RuleSet, Verdict, fold_apostrophes};
use crate::state::State;

/// Default acknowledgment for positive replies.
pub const DEFAULT_POSITIVE_RESPONSE: &str = "Glad to hear it! Noted: {text}";

/// Default acknowledgment for negative replies.
pub const DEFAULT_NEGATIVE_RESPONSE: &str = "Thanks for being honest. Noted: {text}";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The outcome of processing one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// The classification outcome.
    pub state: State,

    /// The canonical stored form of the reply.  Never empty unless `state` is
    /// [`State::Unknown`].
    pub clean_text: String,

    /// The message to send back.  Empty means nothing should be sent.
    pub response_text: String,
}

/// Acknowledgment templates.  `{text}` is replaced with the clean text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Responses {
    /// Template for [`State::Positive`] replies.
    pub positive: String,
    /// Template for [`State::Negative`] replies.
    pub negative: String,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            positive: DEFAULT_POSITIVE_RESPONSE.to_string(),
            negative: DEFAULT_NEGATIVE_RESPONSE.to_string(),
        }
    }
}

impl Responses {
    fn render(&self, state: State, clean_text: &str) -> String {
        let template = match state {
            State::Positive => &self.positive,
            State::Negative => &self.negative,
            State::Unknown => return String::new(),
        };
        template.replace("{text}", clean_text)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// The reply parser.
///
/// Holds the result of the most recent [`Parser::process`] call; every call
/// replaces it entirely.  The rule set is shared, so cloning a parser or
/// creating one per request is cheap.
#[derive(Debug, Clone)]
pub struct Parser {
    rules: Arc<RuleSet>,
    responses: Responses,
    result: ClassificationResult,
}

impl Parser {
    /// Create a parser with the built-in rules and default responses.
    pub fn new() -> Self {
        Self::with_rules(Arc::new(RuleSet::builtin()), Responses::default())
    }

    /// Create a parser over a shared rule set and custom responses.
    pub fn with_rules(rules: Arc<RuleSet>, responses: Responses) -> Self {
        Self {
            rules,
            responses,
            result: ClassificationResult::default(),
        }
    }

    /// Process a reply to `prompt`, replacing the previous result.
    pub fn process(&mut self, prompt: &str, reply: &str) {
        self.result = self.classify(prompt, reply);
    }

    /// Classify a reply without touching the held result.
    pub fn classify(&self, prompt: &str, reply: &str) -> ClassificationResult {
        let clean_text = clean_reply(reply);
        if clean_text.is_empty() {
            debug!("reply is empty after cleaning");
            return ClassificationResult::default();
        }

        let lowered = fold_apostrophes(&clean_text.to_lowercase());
        let verdict = self.rules.evaluate(prompt, &lowered);
        match &verdict {
            Verdict::Matched { state, trigger } => {
                debug!(state = %state, trigger = %trigger, "reply classified");
            }
            Verdict::Ambiguous { hedge } => {
                debug!(hedge = %hedge, "reply is ambiguous, leaving unclassified");
            }
            Verdict::Unmatched => {
                debug!("no rule matched reply");
            }
        }

        let state = verdict.state();
        let response_text = self.responses.render(state, &clean_text);

        ClassificationResult {
            state,
            clean_text,
            response_text,
        }
    }

    /// State of the last processed reply.
    pub fn state(&self) -> State {
        self.result.state
    }

    /// Response to send for the last processed reply (may be empty).
    pub fn text(&self) -> &str {
        &self.result.response_text
    }

    /// Canonical form of the last processed reply.
    pub fn text_clean(&self) -> &str {
        &self.result.clean_text
    }

    /// The whole result of the last processed reply.
    pub fn result(&self) -> &ClassificationResult {
        &self.result
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Reduce a reply to its canonical stored form.
///
/// Leading `@mention` tokens and one leading `[positive]` / `[negative]` /
/// `[unknown]` tag are dropped, then whitespace runs (newlines included) are
/// collapsed to single spaces.  Casing is preserved.
pub fn clean_reply(reply: &str) -> String {
    let mut words = reply.split_whitespace().peekable();

    while let Some(word) = words.peek() {
        if is_mention(word) {
            words.next();
        } else {
            break;
        }
    }

    let mut out: Vec<&str> = Vec::new();
    if let Some(first) = words.next() {
        match strip_state_tag(first) {
            Some("") => {}
            Some(rest) => out.push(rest),
            None => out.push(first),
        }
    }
    out.extend(words);
    out.join(" ")
}

/// `@name`, optionally followed by `,` or `:`.
fn is_mention(word: &str) -> bool {
    let Some(name) = word.strip_prefix('@') else {
        return false;
    };
    let name = name.trim_end_matches([',', ':']);
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// If `word` starts with a `[state]` tag, return what follows it.
fn strip_state_tag(word: &str) -> Option<&str> {
    let inner = word.strip_prefix('[')?;
    let (tag, rest) = inner.split_once(']')?;
    State::from_token(tag).ok()?;
    Some(rest.trim_start_matches([':', ',']))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
