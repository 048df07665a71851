//! Semantic search layer.
//!
//! - **[`canonicalize`]**: text preprocessing before embedding and filtering.
//! - **[`embedder`]** / **[`reranker`]**: model capability traits.
//! - **[`embedder_registry`]** / **[`reranker_registry`]**: named model lookup.
//! - **[`hash_embedder`]** / **[`overlap_reranker`]**: always-available fallbacks.
//! - **[`embedding_cache`]**: persisted embedding sets (`.cemb`).
//! - **[`retriever`]**: brute-force top-k over an embedding set.
//! - **[`query`]**: `+term`/`-term` parsing and the explicit filter.
//! - **[`model_manager`]**: embedder + reranker providers per profile.
//! - **[`pipeline`]**: setup and query for one content type.
//! - **[`registry`]**: active pipelines across content types.

pub mod canonicalize;
pub mod embedder;
pub mod embedder_registry;
pub mod embedding_cache;
#[cfg(feature = "fastembed")]
pub mod fastembed_embedder;
#[cfg(feature = "fastembed")]
pub mod fastembed_reranker;
pub mod hash_embedder;
pub mod model_manager;
pub mod overlap_reranker;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod reranker;
pub mod reranker_registry;
pub mod retriever;
