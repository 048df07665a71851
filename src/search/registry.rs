//! Registry of active pipelines, one per content type.
//!
//! Pipelines are built outside the lock and swapped in whole, so a query
//! sees either the previous pipeline or the new one, never a partial build.
//! Rebuilding one content type leaves every other entry untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use super::embedding_cache::CacheOutcome;
use super::model_manager::ModelRegistry;
use super::pipeline::{Pipeline, PipelineError};
use crate::config::SearchConfig;
use crate::model::types::{ContentType, Hit, SearchResult};

/// Result of rebuilding one content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReloadOutcome {
    Installed { entries: usize, cache_reused: bool },
    Failed { error: String },
    NotConfigured,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReloadReport {
    pub outcomes: Vec<(ContentType, ReloadOutcome)>,
}

impl ReloadReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| matches!(o, ReloadOutcome::Installed { .. }))
    }

    pub fn outcome(&self, content_type: ContentType) -> Option<&ReloadOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| *t == content_type)
            .map(|(_, o)| o)
    }

    pub fn failures(&self) -> impl Iterator<Item = (ContentType, &str)> {
        self.outcomes.iter().filter_map(|(t, o)| match o {
            ReloadOutcome::Failed { error } => Some((*t, error.as_str())),
            _ => None,
        })
    }
}

pub struct SearchRegistry {
    pipelines: RwLock<HashMap<ContentType, Arc<Pipeline>>>,
    models: ModelRegistry,
}

impl SearchRegistry {
    pub fn new(models: ModelRegistry) -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            models,
        }
    }

    /// Swap in a pipeline, returning the one it replaced.
    pub fn install(&self, pipeline: Pipeline) -> Option<Arc<Pipeline>> {
        let content_type = pipeline.content_type();
        self.pipelines
            .write()
            .insert(content_type, Arc::new(pipeline))
    }

    pub fn get(&self, content_type: ContentType) -> Option<Arc<Pipeline>> {
        self.pipelines.read().get(&content_type).cloned()
    }

    /// Installed content types in dispatch order.
    pub fn installed(&self) -> Vec<ContentType> {
        let pipelines = self.pipelines.read();
        ContentType::ALL
            .into_iter()
            .filter(|t| pipelines.contains_key(t))
            .collect()
    }

    /// Pipeline answering a query: the named type, or the first installed.
    pub fn resolve(&self, content_type: Option<ContentType>) -> Option<Arc<Pipeline>> {
        match content_type {
            Some(t) => self.get(t),
            None => {
                let pipelines = self.pipelines.read();
                ContentType::ALL
                    .iter()
                    .find_map(|t| pipelines.get(t).cloned())
            }
        }
    }

    /// Final hits plus the pipeline that produced them.
    pub fn query(
        &self,
        text: &str,
        content_type: Option<ContentType>,
    ) -> Result<Option<(Arc<Pipeline>, Vec<Hit>)>, PipelineError> {
        let Some(pipeline) = self.resolve(content_type) else {
            return Ok(None);
        };
        let hits = pipeline.query(text)?;
        Ok(Some((pipeline, hits)))
    }

    /// Top `count` collated results; empty when no pipeline answers.
    pub fn search(
        &self,
        text: &str,
        count: usize,
        content_type: Option<ContentType>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        match self.resolve(content_type) {
            Some(pipeline) => pipeline.search(text, count),
            None => Ok(Vec::new()),
        }
    }

    /// Rebuild reusing caches.
    pub fn reload(&self, config: &SearchConfig, content_type: Option<ContentType>) -> ReloadReport {
        self.rebuild(config, content_type, false, None)
    }

    /// Rebuild recomputing every embedding.
    pub fn regenerate(
        &self,
        config: &SearchConfig,
        content_type: Option<ContentType>,
    ) -> ReloadReport {
        self.rebuild(config, content_type, true, None)
    }

    /// Rebuild `content_type` (or every configured type) and swap each in.
    ///
    /// A failed build leaves that type's previous pipeline installed and
    /// does not stop the remaining types.
    pub fn rebuild(
        &self,
        config: &SearchConfig,
        content_type: Option<ContentType>,
        regenerate: bool,
        progress: Option<&ProgressBar>,
    ) -> ReloadReport {
        let targets = match content_type {
            Some(t) => vec![t],
            None => config.configured_types(),
        };

        let mut report = ReloadReport::default();
        for target in targets {
            let outcome = match self.build_one(config, target, regenerate, progress) {
                Ok(None) => ReloadOutcome::NotConfigured,
                Ok(Some(pipeline)) => {
                    let outcome = ReloadOutcome::Installed {
                        entries: pipeline.entries().len(),
                        cache_reused: *pipeline.cache_outcome() == CacheOutcome::Loaded,
                    };
                    self.install(pipeline);
                    outcome
                }
                Err(err) => {
                    warn!(
                        content_type = %target,
                        error = %err,
                        kept_previous = self.get(target).is_some(),
                        "pipeline_build_failed"
                    );
                    ReloadOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            report.outcomes.push((target, outcome));
        }
        report
    }

    fn build_one(
        &self,
        config: &SearchConfig,
        content_type: ContentType,
        regenerate: bool,
        progress: Option<&ProgressBar>,
    ) -> Result<Option<Pipeline>, PipelineError> {
        let Some(content) = config.content(content_type) else {
            return Ok(None);
        };
        let started = Instant::now();
        let profile = content.profile_for(content_type);
        let models = self.models.provider(config, profile)?;
        let pipeline = Pipeline::from_config(
            content_type,
            content,
            models,
            config.profile(profile).top_k,
            regenerate,
            progress,
        )?;
        info!(
            content_type = %content_type,
            profile = %profile,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline_ready"
        );
        Ok(Some(pipeline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::corpus::{MemorySource, RawEntry, write_jsonl_gz};
    use crate::search::hash_embedder::HashEmbedder;
    use crate::search::model_manager::ModelProvider;
    use crate::search::overlap_reranker::OverlapReranker;
    use crate::search::pipeline::PipelineOptions;
    use std::path::Path;
    use tempfile::tempdir;

    fn models() -> ModelRegistry {
        ModelRegistry::fixed(ModelProvider::new(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(OverlapReranker::new()),
        ))
    }

    fn write_corpus(dir: &Path, name: &str, bodies: &[&str]) -> ContentConfig {
        let records: Vec<RawEntry> = bodies
            .iter()
            .enumerate()
            .map(|(i, b)| RawEntry::new(format!("{name} {i}"), None, *b))
            .collect();
        let jsonl = dir.join(format!("{name}.jsonl.gz"));
        write_jsonl_gz(&jsonl, &records).unwrap();
        ContentConfig::new(jsonl, dir.join(format!("{name}.cemb")))
    }

    #[test]
    fn empty_registry_returns_no_results() {
        let registry = SearchRegistry::new(models());
        assert!(registry.search("anything", 5, None).unwrap().is_empty());
        assert!(registry.query("anything", Some(ContentType::Notes)).unwrap().is_none());
    }

    #[test]
    fn unnamed_query_goes_to_first_installed_type() {
        let dir = tempdir().unwrap();
        let registry = SearchRegistry::new(models());
        let provider = ModelProvider::new(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(OverlapReranker::new()),
        );
        let ledger = MemorySource::new(vec![RawEntry::new("tx", None, "coffee shop")]);
        let music = MemorySource::new(vec![RawEntry::new("song", None, "coffee jazz")]);
        for (t, source) in [(ContentType::Ledger, ledger), (ContentType::Music, music)] {
            let options = PipelineOptions::new(dir.path().join(format!("{t}.cemb")));
            registry.install(Pipeline::setup(t, &source, provider.clone(), &options, None).unwrap());
        }

        assert_eq!(registry.installed(), vec![ContentType::Music, ContentType::Ledger]);
        let results = registry.search("coffee", 5, None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].entry.contains("jazz"));
    }

    #[test]
    fn reload_installs_every_configured_type() {
        let dir = tempdir().unwrap();
        let mut config = SearchConfig::default();
        config
            .content_type
            .set(ContentType::Notes, write_corpus(dir.path(), "notes", &["alpha", "beta"]));
        config
            .content_type
            .set(ContentType::Ledger, write_corpus(dir.path(), "ledger", &["rent"]));

        let registry = SearchRegistry::new(models());
        let report = registry.reload(&config, None);
        assert!(report.is_success());
        assert_eq!(
            report.outcome(ContentType::Notes),
            Some(&ReloadOutcome::Installed {
                entries: 2,
                cache_reused: false
            })
        );

        let report = registry.reload(&config, Some(ContentType::Ledger));
        assert_eq!(
            report.outcome(ContentType::Ledger),
            Some(&ReloadOutcome::Installed {
                entries: 1,
                cache_reused: true
            })
        );
    }

    #[test]
    fn regenerate_one_type_leaves_others_untouched() {
        let dir = tempdir().unwrap();
        let mut config = SearchConfig::default();
        config
            .content_type
            .set(ContentType::Notes, write_corpus(dir.path(), "notes", &["alpha"]));
        config
            .content_type
            .set(ContentType::Music, write_corpus(dir.path(), "music", &["beta"]));

        let registry = SearchRegistry::new(models());
        registry.reload(&config, None);
        let notes_before = registry.get(ContentType::Notes).unwrap();

        let report = registry.regenerate(&config, Some(ContentType::Music));
        assert!(report.is_success());
        assert!(Arc::ptr_eq(&notes_before, &registry.get(ContentType::Notes).unwrap()));
    }

    #[test]
    fn failed_rebuild_keeps_previous_pipeline() {
        let dir = tempdir().unwrap();
        let mut config = SearchConfig::default();
        let notes = write_corpus(dir.path(), "notes", &["alpha"]);
        config.content_type.set(ContentType::Notes, notes.clone());

        let registry = SearchRegistry::new(models());
        registry.reload(&config, None);
        let before = registry.get(ContentType::Notes).unwrap();

        std::fs::remove_file(&notes.compressed_jsonl).unwrap();
        let report = registry.regenerate(&config, None);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(Arc::ptr_eq(&before, &registry.get(ContentType::Notes).unwrap()));
    }

    #[test]
    fn unconfigured_type_is_reported() {
        let registry = SearchRegistry::new(models());
        let report = registry.reload(&SearchConfig::default(), Some(ContentType::Ledger));
        assert_eq!(
            report.outcome(ContentType::Ledger),
            Some(&ReloadOutcome::NotConfigured)
        );
    }
}
