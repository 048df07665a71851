//! Normalized entity structs.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::search::canonicalize::filter_tokens;

/// Logical corpus partitions, each with its own store, cache and pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Notes,
    Music,
    Ledger,
}

impl ContentType {
    /// Dispatch order used when a query does not name a content type.
    pub const ALL: [ContentType; 3] = [ContentType::Notes, ContentType::Music, ContentType::Ledger];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Notes => "notes",
            ContentType::Music => "music",
            ContentType::Ledger => "ledger",
        }
    }

    /// Profile a content type uses when the config does not name one.
    pub fn default_profile(self) -> SearchProfile {
        match self {
            ContentType::Notes | ContentType::Music => SearchProfile::Asymmetric,
            ContentType::Ledger => SearchProfile::Symmetric,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notes" | "org" => Ok(ContentType::Notes),
            "music" => Ok(ContentType::Music),
            "ledger" => Ok(ContentType::Ledger),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// Model profile a content type is searched with.
///
/// `Asymmetric` pairs short queries with long entries (notes, music);
/// `Symmetric` pairs queries and entries of similar length (ledger).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchProfile {
    #[default]
    Asymmetric,
    Symmetric,
}

impl fmt::Display for SearchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchProfile::Asymmetric => f.write_str("asymmetric"),
            SearchProfile::Symmetric => f.write_str("symmetric"),
        }
    }
}

/// One unit of searchable content.
///
/// Immutable after load. The filter token set is derived on first use.
#[derive(Debug)]
pub struct Entry {
    idx: usize,
    text: String,
    tokens: OnceCell<HashSet<String>>,
}

impl Entry {
    pub fn new(idx: usize, text: impl Into<String>) -> Self {
        Self {
            idx,
            text: text.into(),
            tokens: OnceCell::new(),
        }
    }

    /// Corpus-local index, aligned with the embedding set.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lowercase word set used by the explicit filter.
    pub fn tokens(&self) -> &HashSet<String> {
        self.tokens.get_or_init(|| filter_tokens(&self.text))
    }
}

impl Clone for Entry {
    fn clone(&self) -> Self {
        Self::new(self.idx, self.text.clone())
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx && self.text == other.text
    }
}

/// A candidate flowing through retrieval, filtering and re-ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Back-reference into the entry store.
    pub corpus_id: usize,
    /// Coarse (bi-encoder) similarity.
    pub score: f32,
    /// Refined (cross-encoder) relevance; `None` until re-ranked.
    pub cross_score: Option<f32>,
}

impl Hit {
    pub fn new(corpus_id: usize, score: f32) -> Self {
        Self {
            corpus_id,
            score,
            cross_score: None,
        }
    }
}

/// Collated result returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    #[serde(rename = "Entry")]
    pub entry: String,
    /// Refined score formatted with three decimals.
    #[serde(rename = "Score")]
    pub score: String,
}
