//! Text canonicalization for entry units, filter tokens and fingerprints.
//!
//! Three derived forms are computed from an entry:
//!
//! 1. **Entry unit** - title, tags and body joined into the single string
//!    that is embedded, re-ranked, filtered and displayed.
//! 2. **Filter tokens** - lowercase word set the explicit filter intersects
//!    with required/blocked terms.
//! 3. **Content hash** - SHA256 of the NFC-normalized unit, stored next to
//!    each cached vector so a cache can be checked against its entries.
//!
//! All three are deterministic: the same input always yields the same
//! output, which is what makes cached embeddings reusable across runs.

use std::collections::HashSet;

use ring::digest::{self, SHA256};
use unicode_normalization::UnicodeNormalization;

/// Maximum characters passed to an embedding model.
pub const MAX_EMBED_CHARS: usize = 2000;

/// Punctuation that separates filter tokens, in addition to whitespace.
pub const TOKEN_SEPARATORS: &[char] = &[',', '.', '[', ']', '(', ')', '{', '}'];

/// Join an entry's fields into its retrieval unit.
///
/// Format: `"{title}\t{tags}\n{body}"`, with an empty tag slot when the
/// entry has no tags. The format is part of the cache contract.
pub fn entry_text(title: &str, tags: Option<&str>, body: &str) -> String {
    format!("{title}\t{}\n{body}", tags.unwrap_or(""))
}

/// Tokenize text into the lowercase word set used by the explicit filter.
///
/// Splits on any whitespace and on [`TOKEN_SEPARATORS`]; empty pieces are
/// dropped.
pub fn filter_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| c.is_whitespace() || TOKEN_SEPARATORS.contains(&c))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Canonicalize text before it is handed to an embedding model.
///
/// Applies Unicode NFC normalization and truncates to
/// [`MAX_EMBED_CHARS`]. Line structure is preserved.
pub fn canonicalize_for_embedding(text: &str) -> String {
    let normalized: String = text.nfc().collect();
    truncate_to_chars(normalized.trim(), MAX_EMBED_CHARS)
}

/// Compute SHA256 content hash of text.
///
/// The hash is computed on the NFC-normalized UTF-8 bytes, so visually
/// identical units hash identically.
pub fn content_hash(text: &str) -> [u8; 32] {
    let normalized: String = text.nfc().collect();
    let digest = digest::digest(&SHA256, normalized.as_bytes());
    let mut hash = [0u8; 32];
    hash.copy_from_slice(digest.as_ref());
    hash
}

/// Truncate string to at most N characters, respecting char boundaries.
fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
