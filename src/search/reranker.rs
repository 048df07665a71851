//! Reranker trait and the precise re-ranking stage.
//!
//! A reranker scores `(query, text)` pairs jointly. It is more accurate
//! than comparing independent embeddings but costs a model call per pair,
//! so it only runs on the shortlist that survives retrieval and filtering.

use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::model::types::{Entry, Hit};

/// Errors raised by a pair-scoring provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RerankerError {
    #[error("reranker unavailable: {0}")]
    Unavailable(String),

    #[error("invalid reranker input: {0}")]
    InvalidInput(String),

    #[error("reranker timed out after {0} ms")]
    Timeout(u64),

    #[error("reranking failed: {0}")]
    Failed(String),
}

pub type RerankerResult<T> = Result<T, RerankerError>;

pub trait Reranker: Send + Sync {
    /// Score each document against the query. Output order matches input.
    fn score_pairs(&self, query: &str, documents: &[&str]) -> RerankerResult<Vec<f32>>;

    /// Score one pair.
    fn score_pair(&self, query: &str, document: &str) -> RerankerResult<f32> {
        self.score_pairs(query, &[document])?
            .into_iter()
            .next()
            .ok_or_else(|| RerankerError::Failed("reranker returned no score".to_string()))
    }

    /// Stable identifier.
    fn id(&self) -> &str;
}

/// Populate refined scores and reorder hits.
///
/// Hits are sorted by coarse score, then by refined score, both descending
/// and both stable. Since the refined sort runs last it decides the order;
/// hits with equal refined scores keep their relative order from the
/// first pass.
pub fn rerank(
    mut hits: Vec<Hit>,
    entries: &[Entry],
    query: &str,
    reranker: &dyn Reranker,
) -> RerankerResult<Vec<Hit>> {
    if hits.is_empty() {
        return Ok(hits);
    }

    let started = Instant::now();
    let documents = hits
        .iter()
        .map(|hit| {
            entries
                .get(hit.corpus_id)
                .map(Entry::text)
                .ok_or_else(|| {
                    RerankerError::InvalidInput(format!(
                        "hit references missing entry {}",
                        hit.corpus_id
                    ))
                })
        })
        .collect::<RerankerResult<Vec<&str>>>()?;

    let scores = reranker.score_pairs(query, &documents)?;
    if scores.len() != hits.len() {
        return Err(RerankerError::Failed(format!(
            "expected {} scores, got {}",
            hits.len(),
            scores.len()
        )));
    }

    for (hit, score) in hits.iter_mut().zip(scores) {
        hit.cross_score = Some(score);
    }

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.sort_by(|a, b| refined(b).total_cmp(&refined(a)));

    debug!(
        reranker = reranker.id(),
        hits = hits.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rerank_complete"
    );
    Ok(hits)
}

fn refined(hit: &Hit) -> f32 {
    hit.cross_score.unwrap_or(f32::NEG_INFINITY)
}
