//! Embedder registry for model selection.
//!
//! This module provides a registry of available embedding backends that allows:
//! - Listing registered embedders with metadata
//! - Selecting an embedder by name from config
//! - Validating that a backend can be loaded in this build
//! - Falling back to the hash embedder when no model is installed
//!
//! # Supported Embedders
//!
//! | Name | ID | Dimension | Type | Notes |
//! |------|-----|-----------|------|-------|
//! | minilm | minilm-384 | 384 | ML | Default asymmetric embedder |
//! | bge-small | bge-small-en-384 | 384 | ML | Symmetric-friendly alternative |
//! | hash | fnv1a-384 | 384 | Hash | Always available fallback |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::embedder::{Embedder, EmbedderError, EmbedderResult};
use super::hash_embedder::{DEFAULT_HASH_DIMENSION, HashEmbedder};

/// Hash embedder name (always available).
pub const HASH_EMBEDDER: &str = "hash";

/// Information about a registered embedder.
#[derive(Debug, Clone)]
pub struct RegisteredEmbedder {
    /// Short name for config (e.g., "minilm", "hash").
    pub name: &'static str,
    /// Unique embedder ID; becomes part of the embedding cache header.
    pub id: &'static str,
    pub dimension: usize,
    pub is_semantic: bool,
    pub description: &'static str,
    /// Whether loading needs the ML runtime (the `fastembed` feature).
    pub requires_ml_runtime: bool,
    /// HuggingFace model ID the runtime downloads.
    pub huggingface_id: &'static str,
}

impl RegisteredEmbedder {
    /// Whether this build can load the embedder at all.
    pub fn is_supported(&self) -> bool {
        !self.requires_ml_runtime || cfg!(feature = "fastembed")
    }

    /// Directory the ML runtime caches this model in.
    pub fn model_dir(&self, models_dir: &Path) -> Option<PathBuf> {
        if !self.requires_ml_runtime {
            return None;
        }
        Some(
            models_dir.join(format!("models--{}", self.huggingface_id.replace('/', "--"))),
        )
    }

    /// Whether the model can be used without a download.
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

/// Static registry of all supported embedders.
pub static EMBEDDERS: &[RegisteredEmbedder] = &[
    RegisteredEmbedder {
        name: "minilm",
        id: "minilm-384",
        dimension: 384,
        is_semantic: true,
        description: "MiniLM L6 v2 - fast semantic embeddings for short queries over long entries",
        requires_ml_runtime: true,
        huggingface_id: "Qdrant/all-MiniLM-L6-v2-onnx",
    },
    RegisteredEmbedder {
        name: "bge-small",
        id: "bge-small-en-384",
        dimension: 384,
        is_semantic: true,
        description: "BGE small en v1.5 - compact embeddings for similar-length texts",
        requires_ml_runtime: true,
        huggingface_id: "Xenova/bge-small-en-v1.5",
    },
    RegisteredEmbedder {
        name: "hash",
        id: "fnv1a-384",
        dimension: DEFAULT_HASH_DIMENSION,
        is_semantic: false,
        description: "FNV-1a feature hashing - lexical fallback, always available",
        requires_ml_runtime: false,
        huggingface_id: "",
    },
];

/// Directory ML models are cached under.
pub fn models_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("models")
}

/// Embedder registry rooted at a models directory.
pub struct EmbedderRegistry {
    models_dir: PathBuf,
}

impl EmbedderRegistry {
    pub fn new(models_dir: &Path) -> Self {
        Self {
            models_dir: models_dir.to_path_buf(),
        }
    }

    /// Embedders usable without a download.
    pub fn installed(&self) -> Vec<&'static RegisteredEmbedder> {
        EMBEDDERS
            .iter()
            .filter(|e| e.is_installed(&self.models_dir))
            .collect()
    }

    /// Get embedder info by name or id.
    pub fn get(&self, name: &str) -> Option<&'static RegisteredEmbedder> {
        let name_lower = name.trim().to_ascii_lowercase();
        EMBEDDERS
            .iter()
            .find(|e| e.name == name_lower || e.id == name_lower)
    }

    /// Best installed embedder (ML if installed, hash fallback).
    pub fn best_available(&self) -> &'static RegisteredEmbedder {
        EMBEDDERS
            .iter()
            .filter(|e| e.is_semantic)
            .find(|e| e.is_installed(&self.models_dir))
            .unwrap_or(&EMBEDDERS[EMBEDDERS.len() - 1])
    }

    /// Validate that an embedder is known and loadable in this build.
    pub fn validate(&self, name: &str) -> EmbedderResult<&'static RegisteredEmbedder> {
        let embedder = self.get(name).ok_or_else(|| {
            EmbedderError::Unavailable(format!(
                "unknown embedder '{}'. Available: {}",
                name,
                EMBEDDERS
                    .iter()
                    .map(|e| e.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        if !embedder.is_supported() {
            return Err(EmbedderError::Unavailable(format!(
                "embedder '{}' needs the ML runtime; rebuild with the `fastembed` feature or use '{}'",
                embedder.name, HASH_EMBEDDER
            )));
        }
        Ok(embedder)
    }
}

/// Load an embedder by name (or the best installed one if None).
pub fn get_embedder(models_dir: &Path, name: Option<&str>) -> EmbedderResult<Arc<dyn Embedder>> {
    let registry = EmbedderRegistry::new(models_dir);
    let info = match name {
        Some(n) => registry.validate(n)?,
        None => registry.best_available(),
    };
    load_embedder(models_dir, info)
}

fn load_embedder(
    models_dir: &Path,
    info: &'static RegisteredEmbedder,
) -> EmbedderResult<Arc<dyn Embedder>> {
    match info.name {
        "hash" => Ok(Arc::new(HashEmbedder::new(info.dimension))),
        #[cfg(feature = "fastembed")]
        "minilm" | "bge-small" => {
            use super::fastembed_embedder::FastEmbedder;
            use fastembed::EmbeddingModel;

            let model = match info.name {
                "minilm" => EmbeddingModel::AllMiniLML6V2,
                _ => EmbeddingModel::BGESmallENV15,
            };
            let embedder =
                FastEmbedder::load(model, info.id, info.dimension, models_dir)?;
            Ok(Arc::new(embedder))
        }
        _ => {
            let _ = models_dir;
            Err(EmbedderError::Unavailable(format!(
                "embedder '{}' not implemented",
                info.name
            )))
        }
    }
}
