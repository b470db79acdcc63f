//! Deterministic classification rules.
//!
//! A reply is classified by a short cascade, evaluated on the normalized,
//! lowercased reply text:
//!
//! | Step | Rule | Outcome |
//! |------|------|---------|
//! | 1 | A hedge phrase appears anywhere (`not sure`, `maybe`, ...) | ambiguous |
//! | 2 | The prompt carries a `[yes-option/no-option]` choice marker and the reply starts with one of the options | positive / negative |
//! | 3 | The reply starts with an affirmative or negative phrase (longest match, whole word) | positive / negative |
//! | 4 | Nothing matched | unmatched |
//!
//! Phrase lookup uses an [`aho_corasick`] automaton; hedge detection uses a
//! single compiled [`regex`] alternation with word boundaries.  Extra phrases
//! may be appended to the built-in tables, never removed from them.

use aho_corasick::AhoCorasick;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::state::State;

/// Built-in affirmative phrases.
pub const AFFIRMATIVE_PHRASES: &[&str] = &[
    "yes",
    "y",
    "yeah",
    "yea",
    "yep",
    "yup",
    "sure",
    "ok",
    "okay",
    "absolutely",
    "definitely",
    "certainly",
    "indeed",
    "of course",
    "i do",
    "i like it",
    "love it",
    "👍",
    "+1",
];

/// Built-in negative phrases.
pub const NEGATIVE_PHRASES: &[&str] = &[
    "no",
    "n",
    "nope",
    "nah",
    "never",
    "not really",
    "not at all",
    "no way",
    "i don't",
    "i dont",
    "i do not",
    "👎",
    "-1",
];

/// Phrases that make a reply ambiguous wherever they appear.
pub const HEDGE_PHRASES: &[&str] = &[
    "don't know",
    "dont know",
    "do not know",
    "not sure",
    "idk",
    "dunno",
    "maybe",
    "perhaps",
    "meh",
    "kind of",
    "sort of",
    "whatever",
];

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of evaluating a reply against a [`RuleSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A rule classified the reply.
    Matched {
        /// The resulting state (never [`State::Unknown`]).
        state: State,
        /// The phrase or choice option that triggered the match.
        trigger: String,
    },
    /// The reply hedges; it is deliberately left unclassified.
    Ambiguous {
        /// The hedge phrase that was found.
        hedge: String,
    },
    /// No rule applied.
    Unmatched,
}

impl Verdict {
    /// Collapse the verdict into a state.
    pub fn state(&self) -> State {
        match self {
            Self::Matched { state, .. } => *state,
            Self::Ambiguous { .. } | Self::Unmatched => State::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// The phrase tables and compiled matchers used by the parser.
///
/// Building a rule set compiles its automata, so construct it once and share
/// it (the parser holds it behind an `Arc`).
pub struct RuleSet {
    /// Lowercased leading phrases and the state each one selects.
    phrases: Vec<(String, State)>,

    /// Automaton over `phrases`, in the same order.
    automaton: Option<AhoCorasick>,

    /// Alternation over the hedge phrases, bounded by `\b`.
    hedges: Option<Regex>,
}

impl RuleSet {
    /// The built-in rule set.
    pub fn builtin() -> Self {
        Self::with_extra_phrases(&[], &[])
    }

    /// The built-in rule set extended with extra leading phrases.
    ///
    /// Extra phrases are trimmed and lowercased.  A phrase already present in
    /// either table is skipped so that no phrase can select two states.
    pub fn with_extra_phrases(affirmative: &[String], negative: &[String]) -> Self {
        let mut phrases: Vec<(String, State)> = Vec::new();

        let builtin = AFFIRMATIVE_PHRASES
            .iter()
            .map(|p| (p.to_string(), State::Positive))
            .chain(NEGATIVE_PHRASES.iter().map(|p| (p.to_string(), State::Negative)));
        let extra = affirmative
            .iter()
            .map(|p| (p.clone(), State::Positive))
            .chain(negative.iter().map(|p| (p.clone(), State::Negative)));

        for (phrase, state) in builtin.chain(extra) {
            let phrase = fold_apostrophes(&phrase.trim().to_lowercase());
            if phrase.is_empty() {
                continue;
            }
            if let Some((_, existing)) = phrases.iter().find(|(p, _)| *p == phrase) {
                if *existing != state {
                    warn!(phrase = %phrase, kept = %existing, "phrase registered for two states, keeping the first");
                }
                continue;
            }
            phrases.push((phrase, state));
        }

        let automaton = build_automaton(&phrases);
        let hedges = build_hedge_regex(HEDGE_PHRASES);

        debug!(phrases = phrases.len(), hedges = HEDGE_PHRASES.len(), "rule set built");

        Self {
            phrases,
            automaton,
            hedges,
        }
    }

    /// Number of registered leading phrases.
    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    /// Evaluate a reply.
    ///
    /// `text` must already be normalized and lowercased; `prompt` is used as
    /// given (choice markers are matched case-insensitively).
    pub fn evaluate(&self, prompt: &str, text: &str) -> Verdict {
        if text.is_empty() {
            return Verdict::Unmatched;
        }

        if let Some(hedge) = self.find_hedge(text) {
            return Verdict::Ambiguous { hedge };
        }

        if let Some((positive, negative)) = choice_marker(prompt) {
            if starts_with_word(text, &positive) {
                return Verdict::Matched {
                    state: State::Positive,
                    trigger: positive,
                };
            }
            if starts_with_word(text, &negative) {
                return Verdict::Matched {
                    state: State::Negative,
                    trigger: negative,
                };
            }
        }

        match self.leading_phrase(text) {
            Some((phrase, state)) => Verdict::Matched {
                state,
                trigger: phrase.to_string(),
            },
            None => Verdict::Unmatched,
        }
    }

    // -- Private helpers ----------------------------------------------------

    fn find_hedge(&self, text: &str) -> Option<String> {
        let re = self.hedges.as_ref()?;
        re.find(text).map(|m| m.as_str().to_string())
    }

    /// The longest registered phrase that starts `text` and ends on a word
    /// boundary.
    fn leading_phrase(&self, text: &str) -> Option<(&str, State)> {
        let ac = self.automaton.as_ref()?;

        let mut best: Option<(usize, usize)> = None; // (pattern_index, match_len)

        for mat in ac.find_overlapping_iter(text) {
            if mat.start() != 0 || !is_word_end(text, mat.end()) {
                continue;
            }
            let len = mat.end();
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((mat.pattern().as_usize(), len));
            }
        }

        let (idx, _) = best?;
        let (phrase, state) = &self.phrases[idx];
        Some((phrase.as_str(), *state))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("phrases", &self.phrases.len())
            .field("automaton", &self.automaton.is_some())
            .field("hedges", &self.hedges.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Matching helpers
// ---------------------------------------------------------------------------

fn build_automaton(phrases: &[(String, State)]) -> Option<AhoCorasick> {
    if phrases.is_empty() {
        return None;
    }
    let patterns: Vec<&str> = phrases.iter().map(|(p, _)| p.as_str()).collect();
    match AhoCorasick::new(&patterns) {
        Ok(ac) => Some(ac),
        Err(e) => {
            error!(error = %e, "failed to build phrase automaton, leading-phrase rule disabled");
            None
        }
    }
}

fn build_hedge_regex(hedges: &[&str]) -> Option<Regex> {
    let alternation = hedges
        .iter()
        .map(|h| regex::escape(h))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!(r"\b(?:{alternation})\b")) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(error = %e, "failed to compile hedge pattern, hedge rule disabled");
            None
        }
    }
}

/// `true` when `end` is the end of `text` or is followed by a character that
/// cannot continue a word.
fn is_word_end(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric())
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.starts_with(word) && is_word_end(text, word.len())
}

/// Replace typographic apostrophes (`’`, `‘`, `ʼ`) with `'`.
///
/// Phrase tables are written with `'`; mobile keyboards usually send `’`.
pub fn fold_apostrophes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}', '\u{02BC}'], "'")
}

/// Extract the options of the last `[positive/negative]` marker in a prompt.
///
/// Bracket groups are scanned from the right; groups that are not a valid
/// marker (no `/`, an empty option, more than one `/`) are skipped.  Both
/// options are trimmed and lowercased.
pub fn choice_marker(prompt: &str) -> Option<(String, String)> {
    let mut rest = prompt;
    while let Some(close) = rest.rfind(']') {
        let open = rest[..close].rfind('[')?;
        if let Some(options) = parse_choice(&rest[open + 1..close]) {
            return Some(options);
        }
        rest = &rest[..open];
    }
    None
}

fn parse_choice(inner: &str) -> Option<(String, String)> {
    let (positive, negative) = inner.split_once('/')?;
    if negative.contains('/') {
        return None;
    }

    let positive = fold_apostrophes(&positive.trim().to_lowercase());
    let negative = fold_apostrophes(&negative.trim().to_lowercase());
    if positive.is_empty() || negative.is_empty() || positive == negative {
        return None;
    }
    Some((positive, negative))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
