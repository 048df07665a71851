//! Query parsing and the explicit term filter.
//!
//! Query syntax is whitespace-delimited. `+word` requires `word` and
//! `-word` blocks it (both case-folded); every other token is part of the
//! natural-language query handed to the models.

use std::collections::HashSet;

use tracing::debug;

use crate::model::types::{Entry, Hit};

/// Parsed form of a raw query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilterSpec {
    /// Natural-language query with filter tokens removed.
    pub query: String,
    pub required: HashSet<String>,
    pub blocked: HashSet<String>,
}

impl QueryFilterSpec {
    pub fn parse(raw: &str) -> Self {
        let mut words = Vec::new();
        let mut required = HashSet::new();
        let mut blocked = HashSet::new();

        for token in raw.split_whitespace() {
            if let Some(term) = token.strip_prefix('+') {
                // A bare "+" names no term.
                if !term.is_empty() {
                    required.insert(term.to_lowercase());
                }
            } else if let Some(term) = token.strip_prefix('-') {
                if !term.is_empty() {
                    blocked.insert(term.to_lowercase());
                }
            } else {
                words.push(token);
            }
        }

        Self {
            query: words.join(" "),
            required,
            blocked,
        }
    }

    pub fn has_filters(&self) -> bool {
        !self.required.is_empty() || !self.blocked.is_empty()
    }

    /// Whether nothing is left to embed after stripping filter tokens.
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }
}

/// Keep hits whose entry satisfies the required/blocked terms, in order.
///
/// | required | blocked | keep a hit when its tokens ...        |
/// |----------|---------|----------------------------------------|
/// | empty    | empty   | (always)                               |
/// | non-empty| any     | meet `required` and miss `blocked`     |
/// | empty    | non-empty | miss `blocked`                       |
///
/// A token present in both sets therefore always excludes its entry.
/// Hits pointing past the end of `entries` are dropped.
pub fn explicit_filter(
    hits: Vec<Hit>,
    entries: &[Entry],
    required: &HashSet<String>,
    blocked: &HashSet<String>,
) -> Vec<Hit> {
    if required.is_empty() && blocked.is_empty() {
        return hits;
    }

    let before = hits.len();
    let kept: Vec<Hit> = hits
        .into_iter()
        .filter(|hit| {
            let Some(entry) = entries.get(hit.corpus_id) else {
                return false;
            };
            let tokens = entry.tokens();
            let clear_of_blocked = tokens.is_disjoint(blocked);
            if required.is_empty() {
                clear_of_blocked
            } else {
                !tokens.is_disjoint(required) && clear_of_blocked
            }
        })
        .collect();

    debug!(
        before,
        after = kept.len(),
        required = required.len(),
        blocked = blocked.len(),
        "explicit_filter"
    );
    kept
}
