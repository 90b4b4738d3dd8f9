//! Per-session append-only vector index.
//!
//! Brute-force inner-product search over L2-normalized vectors (equal to
//! cosine similarity). Entries get dense, monotonically increasing handles
//! that are never reused or renumbered; only whole-session eviction removes
//! them.
//!
//! The structure is deliberately not synchronized — callers serialize
//! access through the owning session's guard.

use crate::error::{DocsiftError, Result};

/// Key back into the owning session's document list: (document position,
/// chunk position within that document).
pub type ChunkKey = (usize, usize);

#[derive(Debug, Clone)]
struct IndexEntry {
    vector: Vec<f32>,
    chunk_key: ChunkKey,
}

/// A scored entry returned from [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub handle: u64,
    pub chunk_key: ChunkKey,
    pub score: f32,
}

#[derive(Debug)]
pub struct VectorIndex {
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry and return its handle. Handles are the entry's
    /// position at insertion time, so the handle space stays dense.
    pub fn add(&mut self, vector: Vec<f32>, chunk_key: ChunkKey) -> Result<u64> {
        if vector.len() != self.dims {
            return Err(DocsiftError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        let handle = self.entries.len() as u64;
        self.entries.push(IndexEntry { vector, chunk_key });
        Ok(handle)
    }

    /// Top-k entries by inner product against `query`, strictly descending
    /// by score; ties broken by ascending handle (earlier-inserted wins).
    /// An empty index yields an empty vec.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        if query.len() != self.dims {
            return Err(DocsiftError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredEntry> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| ScoredEntry {
                handle: i as u64,
                chunk_key: entry.chunk_key,
                score: dot(query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.handle.cmp(&b.handle))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
