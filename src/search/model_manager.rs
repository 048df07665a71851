//! Model provider wiring per search profile.
//!
//! A [`ModelProvider`] pairs the embedder used for coarse retrieval with the
//! reranker used for precise scoring. The [`ModelRegistry`] loads one per
//! profile from the configured model names and keeps loaded models around,
//! so content types sharing a profile share the model instances and a
//! reload does not pay the load cost twice.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use super::embedder::Embedder;
use super::embedder_registry::{EMBEDDERS, get_embedder};
use super::pipeline::PipelineError;
use super::reranker::Reranker;
use super::reranker_registry::{RERANKERS, get_reranker};
use crate::config::SearchConfig;
use crate::model::types::SearchProfile;

/// Embedder and reranker handles injected into a pipeline.
#[derive(Clone)]
pub struct ModelProvider {
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
}

impl ModelProvider {
    pub fn new(embedder: Arc<dyn Embedder>, reranker: Arc<dyn Reranker>) -> Self {
        Self { embedder, reranker }
    }

    /// Load registered models by name (`None` picks the best installed).
    pub fn load(
        embedder: Option<&str>,
        reranker: Option<&str>,
        models_dir: &Path,
    ) -> Result<Self, PipelineError> {
        let embedder = get_embedder(models_dir, embedder)?;
        let reranker = get_reranker(models_dir, reranker)?;
        Ok(Self { embedder, reranker })
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn reranker(&self) -> &dyn Reranker {
        self.reranker.as_ref()
    }
}

impl fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProvider")
            .field("embedder", &self.embedder.id())
            .field("reranker", &self.reranker.id())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProviderKey {
    embedder: Option<String>,
    reranker: Option<String>,
    models_dir: PathBuf,
}

/// Loads and caches model providers per profile.
#[derive(Default)]
pub struct ModelRegistry {
    pinned: HashMap<SearchProfile, ModelProvider>,
    loaded: Mutex<HashMap<ProviderKey, ModelProvider>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that serves `provider` for every profile.
    pub fn fixed(provider: ModelProvider) -> Self {
        let mut registry = Self::new();
        registry.pin(SearchProfile::Asymmetric, provider.clone());
        registry.pin(SearchProfile::Symmetric, provider);
        registry
    }

    /// Serve `provider` for `profile` instead of loading from config.
    pub fn pin(&mut self, profile: SearchProfile, provider: ModelProvider) {
        self.pinned.insert(profile, provider);
    }

    /// Provider for `profile`, loading the configured models on first use.
    pub fn provider(
        &self,
        config: &SearchConfig,
        profile: SearchProfile,
    ) -> Result<ModelProvider, PipelineError> {
        if let Some(provider) = self.pinned.get(&profile) {
            return Ok(provider.clone());
        }

        let settings = config.profile(profile);
        let key = ProviderKey {
            embedder: settings.embedder.clone(),
            reranker: settings.reranker.clone(),
            models_dir: config.models_dir(profile),
        };
        if let Some(provider) = self.loaded.lock().get(&key) {
            return Ok(provider.clone());
        }

        // Load outside the lock; model loads can take seconds.
        let provider = ModelProvider::load(
            key.embedder.as_deref(),
            key.reranker.as_deref(),
            &key.models_dir,
        )?;
        info!(
            profile = %profile,
            embedder = provider.embedder.id(),
            reranker = provider.reranker.id(),
            "models_ready"
        );
        Ok(self.loaded.lock().entry(key).or_insert(provider).clone())
    }
}

/// Row in the model listing.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub kind: &'static str,
    pub name: &'static str,
    pub id: &'static str,
    pub description: &'static str,
    pub supported: bool,
    pub installed: bool,
}

/// Every registered embedder and reranker with its local status.
pub fn list_models(models_dir: &Path) -> Vec<ModelStatus> {
    let embedders = EMBEDDERS.iter().map(|e| ModelStatus {
        kind: "embedder",
        name: e.name,
        id: e.id,
        description: e.description,
        supported: e.is_supported(),
        installed: e.is_installed(models_dir),
    });
    let rerankers = RERANKERS.iter().map(|r| ModelStatus {
        kind: "reranker",
        name: r.name,
        id: r.id,
        description: r.description,
        supported: r.is_supported(),
        installed: r.is_installed(models_dir),
    });
    embedders.chain(rerankers).collect()
}
