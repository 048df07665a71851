//! Per-content-type search pipeline.
//!
//! `setup` loads the entry store and embedding set for one content type;
//! `query` runs retrieval, the explicit filter and re-ranking against that
//! state. A built pipeline is immutable and safe to share across threads.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{debug, info};

use super::canonicalize::canonicalize_for_embedding;
use super::embedder::EmbedderError;
use super::embedding_cache::{CacheOutcome, CacheSettings, EmbeddingSet, get_or_build};
use super::model_manager::ModelProvider;
use super::query::{QueryFilterSpec, explicit_filter};
use super::reranker::{RerankerError, rerank};
use super::retriever::{RetrieveError, retrieve};
use crate::config::{ContentConfig, DEFAULT_TOP_K};
use crate::corpus::{CorpusError, CorpusSource, EntryStore, JsonlSource};
use crate::model::types::{ContentType, Entry, Hit, SearchResult};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Embedder(#[from] EmbedderError),

    #[error(transparent)]
    Reranker(#[from] RerankerError),

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error("content type '{0}' is not configured")]
    NotConfigured(ContentType),
}

impl PipelineError {
    /// Whether a model could not be loaded or reached.
    pub fn is_model_unavailable(&self) -> bool {
        match self {
            PipelineError::Embedder(e) => e.is_unavailable(),
            PipelineError::Reranker(e) => {
                matches!(e, RerankerError::Unavailable(_) | RerankerError::Timeout(_))
            }
            _ => false,
        }
    }
}

/// Build-time settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub cache_path: PathBuf,
    pub cache: CacheSettings,
    pub top_k: usize,
    pub regenerate: bool,
}

impl PipelineOptions {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            cache: CacheSettings::default(),
            top_k: DEFAULT_TOP_K,
            regenerate: false,
        }
    }

    pub fn from_content(content: &ContentConfig, top_k: usize, regenerate: bool) -> Self {
        Self {
            cache_path: content.embeddings_file.clone(),
            cache: content.cache_settings(),
            top_k,
            regenerate,
        }
    }
}

/// Loaded state for one content type.
#[derive(Debug)]
pub struct Pipeline {
    content_type: ContentType,
    store: EntryStore,
    embeddings: EmbeddingSet,
    models: ModelProvider,
    top_k: usize,
    cache_outcome: CacheOutcome,
}

impl Pipeline {
    /// Load entries and their embeddings.
    ///
    /// Fails without side effects on the caller's state if the corpus is
    /// unreadable or the embedder is unavailable.
    pub fn setup(
        content_type: ContentType,
        source: &dyn CorpusSource,
        models: ModelProvider,
        options: &PipelineOptions,
        progress: Option<&ProgressBar>,
    ) -> Result<Self, PipelineError> {
        let started = Instant::now();
        info!(
            content_type = %content_type,
            source = %source.describe(),
            regenerate = options.regenerate,
            "setup_start"
        );

        let store = EntryStore::load(source)?;
        let (embeddings, cache_outcome) = get_or_build(
            store.entries(),
            models.embedder(),
            &options.cache_path,
            options.regenerate,
            options.cache,
            progress,
        )?;

        info!(
            content_type = %content_type,
            entries = store.len(),
            outcome = ?cache_outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "setup_complete"
        );
        Ok(Self {
            content_type,
            store,
            embeddings,
            models,
            top_k: options.top_k,
            cache_outcome,
        })
    }

    /// Set up from a content-type config entry.
    pub fn from_config(
        content_type: ContentType,
        content: &ContentConfig,
        models: ModelProvider,
        top_k: usize,
        regenerate: bool,
        progress: Option<&ProgressBar>,
    ) -> Result<Self, PipelineError> {
        let source = JsonlSource::new(&content.compressed_jsonl);
        let options = PipelineOptions::from_content(content, top_k, regenerate);
        Self::setup(content_type, &source, models, &options, progress)
    }

    /// Final ranked hits for a raw query, refined scores populated.
    ///
    /// An empty corpus or a query with nothing left after removing filter
    /// terms yields no hits.
    pub fn query(&self, raw: &str) -> Result<Vec<Hit>, PipelineError> {
        let spec = QueryFilterSpec::parse(raw);
        if spec.is_empty() || self.store.is_empty() {
            debug!(content_type = %self.content_type, "query_skipped");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let query_vec = self
            .models
            .embedder()
            .embed(&canonicalize_for_embedding(&spec.query))?;
        let embed_ms = started.elapsed().as_millis() as u64;

        let hits = retrieve(&query_vec, &self.embeddings, self.top_k)?;
        let retrieved = hits.len();
        let hits = explicit_filter(hits, self.store.entries(), &spec.required, &spec.blocked);
        let filtered = hits.len();
        let hits = rerank(hits, self.store.entries(), &spec.query, self.models.reranker())?;

        debug!(
            content_type = %self.content_type,
            retrieved,
            filtered,
            embed_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query_complete"
        );
        Ok(hits)
    }

    /// Query and collate the top `count` results.
    pub fn search(&self, raw: &str, count: usize) -> Result<Vec<SearchResult>, PipelineError> {
        let hits = self.query(raw)?;
        Ok(collate_results(&hits, self.store.entries(), count))
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn entries(&self) -> &[Entry] {
        self.store.entries()
    }

    pub fn embeddings(&self) -> &EmbeddingSet {
        &self.embeddings
    }

    pub fn models(&self) -> &ModelProvider {
        &self.models
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn cache_outcome(&self) -> &CacheOutcome {
        &self.cache_outcome
    }
}

/// First `count` hits as display records with 3-decimal refined scores.
pub fn collate_results(hits: &[Hit], entries: &[Entry], count: usize) -> Vec<SearchResult> {
    hits.iter()
        .filter_map(|hit| {
            let entry = entries.get(hit.corpus_id)?;
            Some(SearchResult {
                entry: entry.text().to_string(),
                score: format!("{:.3}", hit.cross_score.unwrap_or(hit.score)),
            })
        })
        .take(count)
        .collect()
}

/// Plain-text report of the top `count` hits.
///
/// With `show_coarse`, a section ordered by coarse score precedes the
/// re-ranked section.
pub fn render_results(hits: &[Hit], entries: &[Entry], count: usize, show_coarse: bool) -> String {
    let mut out = String::new();
    let text = |hit: &Hit| entries.get(hit.corpus_id).map(Entry::text).unwrap_or("");

    if show_coarse {
        let mut coarse = hits.to_vec();
        coarse.sort_by(|a, b| b.score.total_cmp(&a.score));
        let _ = writeln!(out, "\n-------------------------\n");
        let _ = writeln!(out, "Top-{count} Bi-Encoder Retrieval hits");
        for hit in coarse.iter().take(count) {
            let _ = writeln!(out, "Score: {:.3}\n------------\n{}", hit.score, text(hit));
        }
    }

    let mut refined = hits.to_vec();
    refined.sort_by(|a, b| {
        let a = a.cross_score.unwrap_or(a.score);
        let b = b.cross_score.unwrap_or(b.score);
        b.total_cmp(&a)
    });
    let _ = writeln!(out, "\n-------------------------\n");
    let _ = writeln!(out, "Top-{count} Cross-Encoder Re-ranker hits");
    for hit in refined.iter().take(count) {
        let _ = writeln!(
            out,
            "CrossScore: {:.3}\n-----------------\n{}",
            hit.cross_score.unwrap_or(hit.score),
            text(hit)
        );
    }
    out
}
