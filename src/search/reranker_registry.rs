//! Reranker registry for model selection.
//!
//! Mirrors the embedder registry: a static table of pair scorers, lookup by
//! name or id, validation against the current build, and a fallback that
//! never needs model files.
//!
//! # Supported Rerankers
//!
//! | Name | ID | Type | Notes |
//! |------|-----|------|-------|
//! | bge-reranker | bge-reranker-base | Cross-encoder | Default |
//! | jina-reranker-turbo | jina-reranker-v1-turbo-en | Cross-encoder | Fast, English |
//! | overlap | token-overlap | Lexical | Always available fallback |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::overlap_reranker::{OVERLAP_RERANKER_ID, OverlapReranker};
use super::reranker::{Reranker, RerankerError, RerankerResult};

/// Overlap reranker name (always available).
pub const OVERLAP_RERANKER: &str = "overlap";

/// Information about a registered reranker.
#[derive(Debug, Clone)]
pub struct RegisteredReranker {
    pub name: &'static str,
    pub id: &'static str,
    pub description: &'static str,
    pub requires_ml_runtime: bool,
    pub huggingface_id: &'static str,
}

impl RegisteredReranker {
    pub fn is_supported(&self) -> bool {
        !self.requires_ml_runtime || cfg!(feature = "fastembed")
    }

    pub fn model_dir(&self, models_dir: &Path) -> Option<PathBuf> {
        if !self.requires_ml_runtime {
            return None;
        }
        Some(
            models_dir.join(format!("models--{}", self.huggingface_id.replace('/', "--"))),
        )
    }

    pub fn is_installed(&self, models_dir: &Path) -> bool {
        if !self.is_supported() {
            return false;
        }
        match self.model_dir(models_dir) {
            Some(dir) => dir.is_dir(),
            None => true,
        }
    }
}

/// Static registry of all supported rerankers.
pub static RERANKERS: &[RegisteredReranker] = &[
    RegisteredReranker {
        name: "bge-reranker",
        id: "bge-reranker-base",
        description: "BGE Reranker base - cross-encoder relevance scoring",
        requires_ml_runtime: true,
        huggingface_id: "BAAI/bge-reranker-base",
    },
    RegisteredReranker {
        name: "jina-reranker-turbo",
        id: "jina-reranker-v1-turbo-en",
        description: "Jina Reranker v1 Turbo - fast, optimized for English",
        requires_ml_runtime: true,
        huggingface_id: "jinaai/jina-reranker-v1-turbo-en",
    },
    RegisteredReranker {
        name: "overlap",
        id: OVERLAP_RERANKER_ID,
        description: "Query term overlap - lexical fallback, always available",
        requires_ml_runtime: false,
        huggingface_id: "",
    },
];

/// Reranker registry rooted at a models directory.
pub struct RerankerRegistry {
    models_dir: PathBuf,
}

impl RerankerRegistry {
    pub fn new(models_dir: &Path) -> Self {
        Self {
            models_dir: models_dir.to_path_buf(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static RegisteredReranker> {
        let name_lower = name.trim().to_ascii_lowercase();
        RERANKERS
            .iter()
            .find(|r| r.name == name_lower || r.id == name_lower)
    }

    /// Best installed reranker (cross-encoder if installed, overlap fallback).
    pub fn best_available(&self) -> &'static RegisteredReranker {
        RERANKERS
            .iter()
            .filter(|r| r.requires_ml_runtime)
            .find(|r| r.is_installed(&self.models_dir))
            .unwrap_or(&RERANKERS[RERANKERS.len() - 1])
    }

    pub fn validate(&self, name: &str) -> RerankerResult<&'static RegisteredReranker> {
        let reranker = self.get(name).ok_or_else(|| {
            RerankerError::Unavailable(format!(
                "unknown reranker '{}'. Available: {}",
                name,
                RERANKERS
                    .iter()
                    .map(|r| r.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        if !reranker.is_supported() {
            return Err(RerankerError::Unavailable(format!(
                "reranker '{}' needs the ML runtime; rebuild with the `fastembed` feature or use '{}'",
                reranker.name, OVERLAP_RERANKER
            )));
        }
        Ok(reranker)
    }
}

/// Load a reranker by name (or the best installed one if None).
pub fn get_reranker(models_dir: &Path, name: Option<&str>) -> RerankerResult<Arc<dyn Reranker>> {
    let registry = RerankerRegistry::new(models_dir);
    let info = match name {
        Some(n) => registry.validate(n)?,
        None => registry.best_available(),
    };
    load_reranker(models_dir, info)
}

fn load_reranker(
    models_dir: &Path,
    info: &'static RegisteredReranker,
) -> RerankerResult<Arc<dyn Reranker>> {
    match info.name {
        "overlap" => Ok(Arc::new(OverlapReranker::new())),
        #[cfg(feature = "fastembed")]
        "bge-reranker" | "jina-reranker-turbo" => {
            use super::fastembed_reranker::FastEmbedReranker;
            use fastembed::RerankerModel;

            let model = match info.name {
                "bge-reranker" => RerankerModel::BGERerankerBase,
                _ => RerankerModel::JINARerankerV1TurboEn,
            };
            let reranker = FastEmbedReranker::load(model, info.id, models_dir)?;
            Ok(Arc::new(reranker))
        }
        _ => {
            let _ = models_dir;
            Err(RerankerError::Unavailable(format!(
                "reranker '{}' not implemented",
                info.name
            )))
        }
    }
}
