//! Token-overlap reranker.
//!
//! Always-available pair scorer used when no cross-encoder is installed.
//! The score is the fraction of distinct query words that also occur in
//! the document, so it lies in `[0, 1]` and is deterministic.

use crate::search::canonicalize::filter_tokens;

use super::reranker::{Reranker, RerankerResult};

pub const OVERLAP_RERANKER_ID: &str = "token-overlap";

#[derive(Debug, Clone, Default)]
pub struct OverlapReranker;

impl OverlapReranker {
    pub fn new() -> Self {
        Self
    }
}

impl Reranker for OverlapReranker {
    fn score_pairs(&self, query: &str, documents: &[&str]) -> RerankerResult<Vec<f32>> {
        let query_tokens = filter_tokens(query);
        if query_tokens.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }
        let total = query_tokens.len() as f32;
        Ok(documents
            .iter()
            .map(|doc| {
                let doc_tokens = filter_tokens(doc);
                query_tokens.intersection(&doc_tokens).count() as f32 / total
            })
            .collect())
    }

    fn id(&self) -> &str {
        OVERLAP_RERANKER_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_fraction_of_query_terms() {
        let scores = OverlapReranker::new()
            .score_pairs("rust async", &["async rust runtime", "rust only", "python"])
            .unwrap();
        assert_eq!(scores, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn empty_query_scores_zero() {
        let scores = OverlapReranker::new().score_pairs("", &["a", "b"]).unwrap();
        assert_eq!(scores, vec![0.0, 0.0]);
    }

    #[test]
    fn score_pair_matches_batch() {
        let r = OverlapReranker::new();
        assert_eq!(r.score_pair("Tax", "tax return").unwrap(), 1.0);
    }
}
