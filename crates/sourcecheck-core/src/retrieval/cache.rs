//! Shared cache of built retriever indexes.
//!
//! Building an index is the expensive part of retrieval, and one document
//! is usually checked claim after claim. Entries are keyed by document
//! content, retriever kind, canonical config and embedder, so a config
//! change always misses.
//!
//! Concurrent requests for the same key build once: the first caller
//! initialises the slot while the others block on it. Slots still being
//! built are never evicted, so the cache may briefly exceed its bound.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::{Embedder, HashEmbedder, RetrieverIndex, RetrieverKind, RetrieverSettings};

/// Default bound on cached indexes.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    document: Arc<str>,
    kind: RetrieverKind,
    config: String,
    embedder: String,
}

impl CacheKey {
    fn new(document: &str, settings: &RetrieverSettings, embedder: &dyn Embedder) -> Self {
        Self {
            document: Arc::from(document),
            kind: settings.kind(),
            config: settings.canonical(),
            embedder: embedder.name().to_string(),
        }
    }
}

type Slot = Arc<OnceLock<RetrieverIndex>>;

#[derive(Default)]
struct Entries {
    slots: HashMap<CacheKey, Slot>,
    /// Insertion order for eviction
    order: VecDeque<CacheKey>,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub hit_rate: f64,
}

/// Bounded, thread-safe cache of retriever indexes.
pub struct RetrieverCache {
    entries: Mutex<Entries>,
    max_entries: usize,
    default_embedder: Arc<dyn Embedder>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
}

impl RetrieverCache {
    /// A cache holding at most `max_entries` indexes. Zero disables
    /// caching: every request builds.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            max_entries,
            default_embedder: Arc::new(HashEmbedder::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Index for `document` using the default embedder.
    pub fn get_or_build(&self, document: &str, settings: &RetrieverSettings) -> RetrieverIndex {
        let embedder = self.default_embedder.clone();
        self.get_or_build_with(document, settings, &embedder)
    }

    pub fn get_or_build_with(
        &self,
        document: &str,
        settings: &RetrieverSettings,
        embedder: &Arc<dyn Embedder>,
    ) -> RetrieverIndex {
        if self.max_entries == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.build(document, settings, embedder);
        }

        let key = CacheKey::new(document, settings, embedder.as_ref());
        let slot = {
            let mut entries = self.entries.lock();
            match entries.slots.get(&key) {
                Some(slot) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    slot.clone()
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    while entries.order.len() >= self.max_entries {
                        let built = entries
                            .order
                            .iter()
                            .position(|k| entries.slots.get(k).is_some_and(|slot| slot.get().is_some()));
                        let Some(oldest) = built.and_then(|pos| entries.order.remove(pos)) else {
                            tracing::debug!(pending = entries.order.len(), "all cached indexes still building");
                            break;
                        };
                        entries.slots.remove(&oldest);
                        tracing::debug!(kind = %oldest.kind, "evicted retriever index");
                    }
                    let slot: Slot = Arc::new(OnceLock::new());
                    entries.slots.insert(key.clone(), slot.clone());
                    entries.order.push_back(key);
                    slot
                }
            }
        };

        // Built outside the map lock; the slot serialises builders of one key.
        slot.get_or_init(|| self.build(document, settings, embedder))
            .clone()
    }

    fn build(&self, document: &str, settings: &RetrieverSettings, embedder: &Arc<dyn Embedder>) -> RetrieverIndex {
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = %settings.kind(), doc_len = document.len(), "building retriever index");
        settings.build(document, embedder)
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.entries.lock().slots.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            size,
            max_size: self.max_entries,
            hits,
            misses,
            builds: self.builds.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    /// Drop all entries and reset counters.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.slots.clear();
        entries.order.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.builds.store(0, Ordering::Relaxed);
    }
}

impl Default for RetrieverCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for RetrieverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{Bm25Config, SemanticConfig};
    use std::sync::Barrier;

    const DOC: &str = "Patient denies chest pain. No fever noted.";

    #[test]
    fn test_second_request_hits() {
        let cache = RetrieverCache::default();
        let settings = RetrieverSettings::default();
        let a = cache.get_or_build(DOC, &settings);
        let b = cache.get_or_build(DOC, &settings);
        assert!(Arc::ptr_eq(&a, &b));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.builds), (1, 1, 1));
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_config_change_misses() {
        let cache = RetrieverCache::default();
        cache.get_or_build(DOC, &RetrieverSettings::default());
        let smaller = RetrieverSettings::Bm25(Bm25Config {
            chunk_size: 20,
            overlap: 5,
            ..Default::default()
        });
        cache.get_or_build(DOC, &smaller);
        cache.get_or_build("another document", &RetrieverSettings::default());
        let stats = cache.stats();
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.builds, 3);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_concurrent_requests_build_once() {
        let cache = RetrieverCache::default();
        let settings = RetrieverSettings::default();
        let barrier = Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    cache.get_or_build(DOC, &settings);
                });
            }
        });

        let stats = cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits + stats.misses, 8);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = RetrieverCache::new(2);
        let settings = RetrieverSettings::default();
        cache.get_or_build("first", &settings);
        cache.get_or_build("second", &settings);
        cache.get_or_build("third", &settings);
        assert_eq!(cache.stats().size, 2);

        // "first" was evicted, "third" is still cached
        cache.get_or_build("third", &settings);
        assert_eq!(cache.stats().hits, 1);
        cache.get_or_build("first", &settings);
        assert_eq!(cache.stats().builds, 4);
    }

    /// Blocks while embedding text containing "held" until released.
    struct GatedEmbedder {
        started: Barrier,
        release: Barrier,
        inner: HashEmbedder,
    }

    impl Embedder for GatedEmbedder {
        fn name(&self) -> &str {
            "gated"
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            if text.contains("held") {
                self.started.wait();
                self.release.wait();
            }
            self.inner.embed(text)
        }
    }

    #[test]
    fn test_building_index_survives_eviction() {
        let cache = RetrieverCache::new(1);
        let settings = RetrieverSettings::Semantic(SemanticConfig::default());
        let gated = Arc::new(GatedEmbedder {
            started: Barrier::new(2),
            release: Barrier::new(2),
            inner: HashEmbedder::default(),
        });
        let embedder: Arc<dyn Embedder> = gated.clone();

        let size_during_build = std::thread::scope(|scope| {
            let first = scope.spawn(|| cache.get_or_build_with("Pain is held steady.", &settings, &embedder));
            gated.started.wait();

            cache.get_or_build_with("No fever noted.", &settings, &embedder);
            let size = cache.stats().size;

            gated.release.wait();
            first.join().unwrap();
            size
        });
        // Over capacity, but the in-flight slot was kept.
        assert_eq!(size_during_build, 2);

        cache.get_or_build_with("Pain is held steady.", &settings, &embedder);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.builds), (1, 2, 2));
    }

    #[test]
    fn test_identical_documents_share_entry() {
        let cache = RetrieverCache::default();
        let settings = RetrieverSettings::default();
        let owned = String::from(DOC);
        cache.get_or_build(DOC, &settings);
        cache.get_or_build(&owned, &settings);
        cache.get_or_build(&owned[..owned.len() - 1], &settings);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.builds), (1, 2));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = RetrieverCache::new(0);
        let settings = RetrieverSettings::default();
        cache.get_or_build(DOC, &settings);
        cache.get_or_build(DOC, &settings);
        let stats = cache.stats();
        assert_eq!((stats.size, stats.hits, stats.misses, stats.builds), (0, 0, 2, 2));
    }

    #[test]
    fn test_clear_resets() {
        let cache = RetrieverCache::default();
        cache.get_or_build(DOC, &RetrieverSettings::default());
        cache.clear();
        let stats = cache.stats();
        assert_eq!((stats.size, stats.hits, stats.misses, stats.builds), (0, 0, 0, 0));
    }
}
