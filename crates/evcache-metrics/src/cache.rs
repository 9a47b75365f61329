//! Per-kind instrument cache with exactly-once creation.
//!
//! ```text
//! get_or_create(key)
//!   entries.get(key) ── hit ──────────────────────────────▶ Arc<T>
//!        │ miss
//!   create_lock ─▶ entries.get(key) ── hit (lost race) ───▶ Arc<T>
//!                       │ miss
//!                  creator(key) ── Err ─▶ nothing stored ─▶ Err
//!                       │ Ok
//!                  entries.insert(key) ───────────────────▶ Arc<T>
//! ```
//!
//! Lookups only take a shard read lock inside the map. The creation lock is
//! per kind and held only across the re-check, the backend call and the
//! insert.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::key::MetricKey;

/// Instrument kind, one cache per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Monotonic counter.
    Counter,
    /// Long gauge.
    Gauge,
    /// Percentile timer.
    Timer,
    /// Distribution summary.
    DistributionSummary,
}

impl InstrumentKind {
    /// Lower-case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::Timer => "timer",
            InstrumentKind::DistributionSummary => "distribution_summary",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key → instrument map for a single instrument kind.
///
/// Entries are never removed; the map grows with the number of distinct
/// keys observed.
pub struct InstrumentCache<T: ?Sized> {
    kind: InstrumentKind,
    entries: DashMap<MetricKey, Arc<T>>,
    create_lock: Mutex<()>,
}

impl<T: ?Sized> InstrumentCache<T> {
    /// Create an empty cache.
    pub fn new(kind: InstrumentKind) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// The instrument kind this cache holds.
    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    /// Look up an existing instrument without creating one.
    pub fn get(&self, key: &MetricKey) -> Option<Arc<T>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the instrument for `key`, calling `creator` on first access.
    ///
    /// `creator` runs at most once per key across all threads. If it fails
    /// nothing is stored and the error is returned; a later call retries.
    /// Lookups of cached keys never wait on the creation lock, but `creator`
    /// must not call back into `get_or_create` on the same cache for a
    /// missing key.
    pub fn get_or_create<F>(&self, key: &MetricKey, creator: F) -> Result<Arc<T>>
    where
        F: FnOnce(&MetricKey) -> Result<Arc<T>>,
    {
        if let Some(existing) = self.get(key) {
            return Ok(existing);
        }

        let _guard = self.create_lock.lock();

        // Another thread may have created it while we waited.
        if let Some(existing) = self.get(key) {
            return Ok(existing);
        }

        let instrument = match creator(key) {
            Ok(instrument) => instrument,
            Err(e) => {
                debug!(kind = %self.kind, key = %key, error = %e, "Instrument creation failed");
                return Err(e);
            }
        };

        self.entries.insert(key.clone(), Arc::clone(&instrument));
        debug!(kind = %self.kind, key = %key, "Created instrument");

        Ok(instrument)
    }

    /// Number of cached instruments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no instrument has been created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> HashMap<MetricKey, Arc<T>> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl<T: ?Sized> fmt::Debug for InstrumentCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentCache")
            .field("kind", &self.kind)
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn key(name: &str) -> MetricKey {
        MetricKey::new(name, &[]).unwrap()
    }

    #[test]
    fn test_creates_once() {
        let cache: InstrumentCache<String> = InstrumentCache::new(InstrumentKind::Counter);
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_create(&key("a"), |k| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(k.to_string()))
            })
            .unwrap();
        let second = cache
            .get_or_create(&key("a"), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("other".to_string()))
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let cache: InstrumentCache<u64> = InstrumentCache::new(InstrumentKind::Gauge);

        let result = cache.get_or_create(&key("a"), |_| Err(Error::BackendUnavailable));
        assert_eq!(result.unwrap_err(), Error::BackendUnavailable);
        assert!(cache.is_empty());
        assert!(cache.get(&key("a")).is_none());

        let value = cache.get_or_create(&key("a"), |_| Ok(Arc::new(7))).unwrap();
        assert_eq!(*value, 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_snapshot_exact_keys() {
        let cache: InstrumentCache<u64> = InstrumentCache::new(InstrumentKind::Timer);
        cache.get_or_create(&key("a"), |_| Ok(Arc::new(1))).unwrap();
        cache.get_or_create(&key("b"), |_| Ok(Arc::new(2))).unwrap();
        let _ = cache.get_or_create(&key("c"), |_| Err(Error::BackendUnavailable));

        let snapshot = cache.snapshot();
        let mut names: Vec<&str> = snapshot.keys().map(|k| k.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_unsized_values() {
        let cache: InstrumentCache<dyn Fn() -> u32 + Send + Sync> =
            InstrumentCache::new(InstrumentKind::Counter);
        let f = cache
            .get_or_create(&key("f"), |_| {
                let f: Arc<dyn Fn() -> u32 + Send + Sync> = Arc::new(|| 42u32);
                Ok(f)
            })
            .unwrap();
        assert_eq!(f(), 42);
    }

    #[test]
    fn test_concurrent_first_access() {
        const THREADS: usize = 16;

        let cache: Arc<InstrumentCache<AtomicUsize>> =
            Arc::new(InstrumentCache::new(InstrumentKind::Counter));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_create(&key("shared"), |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Arc::new(AtomicUsize::new(0)))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_creator_may_use_cached_entries() {
        let cache: InstrumentCache<u64> = InstrumentCache::new(InstrumentKind::Counter);
        cache.get_or_create(&key("a"), |_| Ok(Arc::new(1))).unwrap();

        // Cached hits skip the creation lock, so this does not deadlock.
        let b = cache
            .get_or_create(&key("b"), |_| {
                let a = cache.get_or_create(&key("a"), |_| Err(Error::BackendUnavailable))?;
                Ok(Arc::new(*a + 1))
            })
            .unwrap();

        assert_eq!(*b, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(InstrumentKind::DistributionSummary.to_string(), "distribution_summary");
        assert_eq!(InstrumentKind::Counter.as_str(), "counter");
    }
}
