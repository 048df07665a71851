//! Coarse retrieval: exact top-k over an embedding set by dot product.
//!
//! Stored vectors and query vectors are L2-normalized, so the dot product is
//! cosine similarity. Large sets are scanned in parallel with thread-local
//! heaps; ties on score are broken by the lower entry index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use half::f16;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use thiserror::Error;

use super::embedder::l2_normalize;
use super::embedding_cache::{EmbeddingSet, VectorSlab};
use crate::model::types::Hit;

/// Minimum set size for a parallel scan; below it rayon overhead dominates.
const PARALLEL_THRESHOLD: usize = 10_000;

/// Entries per parallel work item.
const PARALLEL_CHUNK_SIZE: usize = 1024;

/// Set CSEARCH_PARALLEL_SEARCH=0 to force sequential scans.
static PARALLEL_SEARCH_ENABLED: Lazy<bool> = Lazy::new(|| env_flag("CSEARCH_PARALLEL_SEARCH"));

/// Set CSEARCH_SIMD_DOT=0 to use the scalar dot product.
static SIMD_DOT_ENABLED: Lazy<bool> = Lazy::new(|| env_flag("CSEARCH_SIMD_DOT"));

fn env_flag(name: &str) -> bool {
    dotenvy::var(name)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(true)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrieveError {
    #[error("query dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding set is unusable: {0}")]
    Corrupt(String),
}

/// Top `top_k` entries by cosine similarity to `query`, best first.
///
/// The query is normalized here; stored vectors are normalized when the
/// set is built. Returns the whole set when `top_k` exceeds it; an empty set or
/// `top_k == 0` yields no hits.
pub fn retrieve(
    query: &[f32],
    corpus: &EmbeddingSet,
    top_k: usize,
) -> Result<Vec<Hit>, RetrieveError> {
    if corpus.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }
    let dimension = corpus.dimension();
    if query.len() != dimension {
        return Err(RetrieveError::DimensionMismatch {
            expected: dimension,
            actual: query.len(),
        });
    }

    let mut query = query.to_vec();
    l2_normalize(&mut query);
    let query = query.as_slice();

    let parallel = *PARALLEL_SEARCH_ENABLED && corpus.len() >= PARALLEL_THRESHOLD;
    let slab = corpus
        .slab()
        .map_err(|e| RetrieveError::Corrupt(format!("{e:#}")))?;
    let scored = match slab {
        VectorSlab::F32(values) => top_k_scan(values, dimension, query, top_k, parallel, dot_product),
        VectorSlab::F16(values) => {
            top_k_scan(values, dimension, query, top_k, parallel, dot_product_f16)
        }
    };

    Ok(scored
        .into_iter()
        .map(|entry| Hit::new(entry.idx, entry.score))
        .collect())
}

fn top_k_scan<T, F>(
    slab: &[T],
    dimension: usize,
    query: &[f32],
    k: usize,
    parallel: bool,
    score: F,
) -> Vec<ScoredEntry>
where
    T: Sync,
    F: Fn(&[T], &[f32]) -> f32 + Sync,
{
    let mut results: Vec<ScoredEntry> = if parallel {
        let partial: Vec<Vec<ScoredEntry>> = slab
            .par_chunks(dimension * PARALLEL_CHUNK_SIZE)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let base = chunk_idx * PARALLEL_CHUNK_SIZE;
                scan_into_heap(chunk, dimension, base, query, k, &score)
                    .into_iter()
                    .map(|r| r.0)
                    .collect()
            })
            .collect();

        let mut final_heap = BinaryHeap::with_capacity(k + 1);
        for entry in partial.into_iter().flatten() {
            final_heap.push(std::cmp::Reverse(entry));
            if final_heap.len() > k {
                final_heap.pop();
            }
        }
        final_heap.into_iter().map(|r| r.0).collect()
    } else {
        scan_into_heap(slab, dimension, 0, query, k, &score)
            .into_iter()
            .map(|r| r.0)
            .collect()
    };

    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.idx.cmp(&b.idx)));
    results
}

fn scan_into_heap<T, F>(
    slab: &[T],
    dimension: usize,
    base: usize,
    query: &[f32],
    k: usize,
    score: &F,
) -> BinaryHeap<std::cmp::Reverse<ScoredEntry>>
where
    F: Fn(&[T], &[f32]) -> f32,
{
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (offset, vector) in slab.chunks_exact(dimension).enumerate() {
        heap.push(std::cmp::Reverse(ScoredEntry {
            score: score(vector, query),
            idx: base + offset,
        }));
        if heap.len() > k {
            heap.pop();
        }
    }
    heap
}

/// Heap element. Orders by score, then prefers the lower index so ties
/// evict later entries first.
#[derive(Debug, Clone)]
struct ScoredEntry {
    score: f32,
    idx: usize,
}

impl PartialEq for ScoredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredEntry {}

impl PartialOrd for ScoredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

#[inline]
fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// 8-lane SIMD dot product. Reordered accumulation differs from the scalar
/// sum by ~1e-7 relative error.
#[inline]
fn dot_product_simd(a: &[f32], b: &[f32]) -> f32 {
    use wide::f32x8;

    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    let mut sum = f32x8::ZERO;
    for (ca, cb) in chunks_a.zip(chunks_b) {
        let mut arr_a = [0f32; 8];
        let mut arr_b = [0f32; 8];
        arr_a.copy_from_slice(ca);
        arr_b.copy_from_slice(cb);
        sum += f32x8::from(arr_a) * f32x8::from(arr_b);
    }

    let mut scalar_sum: f32 = sum.reduce_add();
    for (a, b) in remainder_a.iter().zip(remainder_b) {
        scalar_sum += a * b;
    }
    scalar_sum
}

#[inline]
fn dot_product_f16_scalar(a: &[f16], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| f32::from(*x) * y).sum()
}

#[inline]
fn dot_product_f16_simd(a: &[f16], b: &[f32]) -> f32 {
    use wide::f32x8;

    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    let mut sum = f32x8::ZERO;
    for (ca, cb) in chunks_a.zip(chunks_b) {
        let mut arr_a = [0f32; 8];
        for (dst, src) in arr_a.iter_mut().zip(ca) {
            *dst = f32::from(*src);
        }
        let mut arr_b = [0f32; 8];
        arr_b.copy_from_slice(cb);
        sum += f32x8::from(arr_a) * f32x8::from(arr_b);
    }

    let mut scalar_sum = sum.reduce_add();
    for (a, b) in remainder_a.iter().zip(remainder_b) {
        scalar_sum += f32::from(*a) * b;
    }
    scalar_sum
}

#[inline]
pub(crate) fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if *SIMD_DOT_ENABLED {
        dot_product_simd(a, b)
    } else {
        dot_product_scalar(a, b)
    }
}

#[inline]
fn dot_product_f16(a: &[f16], b: &[f32]) -> f32 {
    if *SIMD_DOT_ENABLED {
        dot_product_f16_simd(a, b)
    } else {
        dot_product_f16_scalar(a, b)
    }
}

/// Bench-only wrapper for scalar dot product.
#[doc(hidden)]
pub fn dot_product_scalar_bench(a: &[f32], b: &[f32]) -> f32 {
    dot_product_scalar(a, b)
}

/// Bench-only wrapper for SIMD dot product.
#[doc(hidden)]
pub fn dot_product_simd_bench(a: &[f32], b: &[f32]) -> f32 {
    dot_product_simd(a, b)
}
