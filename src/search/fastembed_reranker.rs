//! FastEmbed-backed cross-encoder reranker.

use std::path::Path;

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use parking_lot::Mutex;
use tracing::info;

use super::reranker::{Reranker, RerankerError, RerankerResult};

const RERANK_BATCH_SIZE: usize = 32;

pub struct FastEmbedReranker {
    model: Mutex<TextRerank>,
    id: String,
}

impl FastEmbedReranker {
    /// Load a cross-encoder, downloading it into `cache_dir` on first use.
    pub fn load(model: RerankerModel, id: &str, cache_dir: &Path) -> RerankerResult<Self> {
        info!(reranker = id, cache_dir = %cache_dir.display(), "reranker_load");
        let options = RerankInitOptions::new(model)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(false);
        let model = TextRerank::try_new(options).map_err(|e| {
            RerankerError::Unavailable(format!("failed to load reranker '{id}': {e}"))
        })?;
        Ok(Self {
            model: Mutex::new(model),
            id: id.to_string(),
        })
    }
}

impl Reranker for FastEmbedReranker {
    fn score_pairs(&self, query: &str, documents: &[&str]) -> RerankerResult<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        if query.trim().is_empty() {
            return Err(RerankerError::InvalidInput("empty query".to_string()));
        }

        let mut model = self.model.lock();
        let results = model
            .rerank(query, documents.to_vec(), false, Some(RERANK_BATCH_SIZE))
            .map_err(|e| RerankerError::Failed(e.to_string()))?;
        drop(model);

        // fastembed returns results sorted by score; put them back in input order.
        let mut scores = vec![f32::NEG_INFINITY; documents.len()];
        for result in results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RerankerError::Failed(format!("reranker returned index {}", result.index))
            })?;
            *slot = result.score;
        }
        Ok(scores)
    }

    fn id(&self) -> &str {
        &self.id
    }
}
