//! Process-wide memo of [`ReferenceStatistics`], keyed by dataset fingerprint.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use lru::LruCache;
use synth_model::{Dataset, DatasetFingerprint, Result};
use tracing::debug;

use crate::stats::ReferenceStatistics;

pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(15);

static GLOBAL: OnceLock<StatisticsCache> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<DatasetFingerprint, Arc<ReferenceStatistics>>,
    stats: CacheStats,
}

/// LRU cache of reference statistics.
///
/// Entries are immutable once inserted; a modified reference has a new
/// fingerprint and misses.
#[derive(Debug)]
pub struct StatisticsCache {
    inner: Mutex<Inner>,
}

impl StatisticsCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn global() -> &'static StatisticsCache {
        GLOBAL.get_or_init(|| StatisticsCache::new(DEFAULT_CAPACITY))
    }

    /// Cached statistics for `reference`, computing them on a miss.
    ///
    /// The lock is released while computing, so two threads missing on the
    /// same dataset may both compute; the results are identical.
    pub fn get_or_compute(&self, reference: &Dataset) -> Result<Arc<ReferenceStatistics>> {
        let fingerprint = reference.fingerprint();
        {
            let mut inner = self.lock();
            if let Some(hit) = inner.entries.get(&fingerprint).cloned() {
                inner.stats.hits += 1;
                debug!(fingerprint = %fingerprint.short(), "reference statistics cache hit");
                return Ok(hit);
            }
            inner.stats.misses += 1;
        }
        let computed = Arc::new(ReferenceStatistics::compute(reference)?);
        debug!(
            fingerprint = %fingerprint.short(),
            rows = reference.len(),
            "reference statistics computed"
        );
        self.lock().entries.put(fingerprint, Arc::clone(&computed));
        Ok(computed)
    }

    pub fn contains(&self, fingerprint: &DatasetFingerprint) -> bool {
        self.lock().entries.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Row, Schema, VariableSpec};

    fn dataset(offset: f64) -> Dataset {
        let schema = Schema::new(vec![VariableSpec::continuous("X", 0.0, 100.0, 1)])
            .expect("schema");
        let rows = (0..5)
            .map(|i| {
                Row::new(format!("S{i}"), "01", "A", "V1").with_num("X", offset + f64::from(i))
            })
            .collect();
        Dataset::new(schema, rows).expect("dataset")
    }

    #[test]
    fn second_lookup_hits() {
        let cache = StatisticsCache::new(DEFAULT_CAPACITY);
        let reference = dataset(10.0);
        let first = cache.get_or_compute(&reference).expect("stats");
        let second = cache.get_or_compute(&reference).expect("stats");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn changed_dataset_misses() {
        let cache = StatisticsCache::new(DEFAULT_CAPACITY);
        cache.get_or_compute(&dataset(10.0)).expect("stats");
        let changed = dataset(11.0);
        assert!(!cache.contains(&changed.fingerprint()));
        cache.get_or_compute(&changed).expect("stats");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = StatisticsCache::new(NonZeroUsize::MIN);
        let first = dataset(1.0);
        cache.get_or_compute(&first).expect("stats");
        cache.get_or_compute(&dataset(2.0)).expect("stats");
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&first.fingerprint()));
    }
}
