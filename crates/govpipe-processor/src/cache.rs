//! # Content Cache
//!
//! Maps a content checksum to the [`ParsedDocument`] previously computed for
//! it. Keyed by checksum rather than by submitter, so byte-identical
//! documents from different enterprises collapse to one entry.
//!
//! ## Concurrency
//!
//! Backed by `DashMap`, so concurrent runs read and write without a global
//! lock. A get-then-put race on one checksum only duplicates work. Writes go
//! through a per-key compare-and-set that never replaces a fresher entry
//! with an older one.
//!
//! No eviction: the map is unbounded. [`ContentCache::clear`] exists for test
//! isolation and operator resets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use govpipe_core::{Checksum, ParsedDocument};
use serde::Serialize;

/// Snapshot of cache occupancy and effectiveness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of cached documents.
    pub size: usize,
    /// Cached checksums, sorted.
    pub fingerprints: Vec<String>,
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub hit_rate: f64,
}

/// Thread-safe checksum → parsed document map.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: DashMap<Checksum, Arc<ParsedDocument>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a checksum, counting the hit or miss.
    pub fn get(&self, checksum: &Checksum) -> Option<Arc<ParsedDocument>> {
        let found = self.entries.get(checksum).map(|e| Arc::clone(e.value()));
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `doc`, unless the cache already holds a fresher entry.
    ///
    /// Returns whichever document the cache holds afterwards.
    pub fn put(&self, checksum: Checksum, doc: Arc<ParsedDocument>) -> Arc<ParsedDocument> {
        match self.entries.entry(checksum) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().processed_at > doc.processed_at {
                    return Arc::clone(occupied.get());
                }
                occupied.insert(Arc::clone(&doc));
                doc
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&doc));
                doc
            }
        }
    }

    /// Store `doc` only if no entry exists for the checksum.
    ///
    /// Returns the entry the cache holds afterwards: `doc` when it was
    /// inserted, otherwise the concurrent run's earlier result.
    pub fn insert_if_absent(
        &self,
        checksum: Checksum,
        doc: Arc<ParsedDocument>,
    ) -> Arc<ParsedDocument> {
        Arc::clone(self.entries.entry(checksum).or_insert(doc).value())
    }

    /// Drop every entry and reset the hit/miss counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot occupancy and hit rate.
    pub fn stats(&self) -> CacheStats {
        let mut fingerprints: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.key().as_str().to_string())
            .collect();
        fingerprints.sort();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            size: fingerprints.len(),
            fingerprints,
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}
