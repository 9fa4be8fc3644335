//! Bounded cache of read-only chunk handles.
//!
//! File descriptors are the scarce resource on the read path: a long replay
//! touches every chunk of the ledger, but only `bound` sealed chunks may be
//! open at once. Eviction is strict LRU over a map keyed by start index plus
//! a recency list. Tracks hit/miss/eviction counters for observability.
//!
//! The write head's handle is not counted here; the bound covers read-side
//! handles only.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::{chunk::ChunkFile, error::Result};

/// Strict-LRU cache of open read-only chunk handles.
#[derive(Debug)]
pub struct ReadCache {
    inner: Mutex<Inner>,
    bound: usize,
}

#[derive(Debug)]
struct Inner {
    /// Open handles keyed by chunk start index.
    chunks: BTreeMap<u64, Arc<ChunkFile>>,
    /// Start indices ordered least- to most-recently used.
    recency: Vec<u64>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    /// Moves `start_idx` to the most-recently-used position.
    fn touch(&mut self, start_idx: u64) {
        self.recency.retain(|&s| s != start_idx);
        self.recency.push(start_idx);
    }
}

/// Read-cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Handles currently open.
    pub open_handles: usize,
    /// Maximum handles kept open.
    pub bound: usize,
    /// Lookups served from an already-open handle.
    pub hits: u64,
    /// Lookups that had to open a file.
    pub misses: u64,
    /// Handles closed to make room.
    pub evictions: u64,
}

impl ReadCache {
    /// Creates a cache holding at most `bound` open handles.
    #[must_use]
    pub fn new(bound: usize) -> Self {
        debug_assert!(bound >= 1, "read cache bound validated at construction");
        Self {
            inner: Mutex::new(Inner {
                chunks: BTreeMap::new(),
                recency: Vec::with_capacity(bound),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            bound,
        }
    }

    /// Returns the cached chunk covering `idx`, if one is open.
    #[must_use]
    pub fn find_covering(&self, idx: u64) -> Option<Arc<ChunkFile>> {
        let mut inner = self.inner.lock();
        let (&start_idx, chunk) = inner.chunks.range(..=idx).next_back()?;
        if !chunk.contains(idx) {
            return None;
        }
        let chunk = Arc::clone(chunk);
        inner.hits += 1;
        inner.touch(start_idx);
        Some(chunk)
    }

    /// Returns the handle for the chunk starting at `start_idx`, opening
    /// `path` read-only on a miss and evicting the least-recently-used
    /// handle first when the cache is full.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the file cannot be opened or scanned.
    pub fn get_or_open(&self, start_idx: u64, path: &Path) -> Result<Arc<ChunkFile>> {
        let mut inner = self.inner.lock();
        if let Some(chunk) = inner.chunks.get(&start_idx) {
            let chunk = Arc::clone(chunk);
            inner.hits += 1;
            inner.touch(start_idx);
            return Ok(chunk);
        }

        if inner.chunks.len() >= self.bound {
            // recency is non-empty whenever chunks is
            let lru = inner.recency.remove(0);
            inner.chunks.remove(&lru);
            inner.evictions += 1;
            debug!(start_idx = lru, "evicted read handle");
        }

        let chunk = Arc::new(ChunkFile::open(path.to_path_buf(), start_idx, false)?);
        inner.misses += 1;
        inner.chunks.insert(start_idx, Arc::clone(&chunk));
        inner.touch(start_idx);
        Ok(chunk)
    }

    /// Drops every cached handle whose chunk holds entries above `idx`.
    ///
    /// Called on truncation so later reads reopen files and observe the
    /// shortened state.
    pub fn invalidate_beyond(&self, idx: u64) {
        let mut inner = self.inner.lock();
        let stale: Vec<u64> = inner
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.last_idx() > idx)
            .map(|(&start, _)| start)
            .collect();
        for start_idx in stale {
            inner.chunks.remove(&start_idx);
            inner.recency.retain(|&s| s != start_idx);
        }
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            open_handles: inner.chunks.len(),
            bound: self.bound,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}
