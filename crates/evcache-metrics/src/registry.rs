//! Backend registry seam and the instrument handles it hands out.
//!
//! The facade never owns instrument state. It asks a [`Registry`] to create
//! an instrument once per key and caches the returned `Arc`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::key::{MetricId, Tag};

/// Monotonically increasing event count.
pub trait Counter: Send + Sync {
    /// Add `amount` to the count.
    fn add(&self, amount: u64);

    /// Current count.
    fn count(&self) -> u64;

    /// Add one.
    fn increment(&self) {
        self.add(1);
    }
}

/// Duration recorder; the backend aggregates samples into percentiles.
pub trait Timer: Send + Sync {
    /// Record one duration.
    fn record(&self, duration: Duration);

    /// Number of recorded samples.
    fn count(&self) -> u64;

    /// Sum of all recorded durations.
    fn total_time(&self) -> Duration;

    /// Record the time elapsed since `start`.
    fn record_since(&self, start: Instant) {
        self.record(start.elapsed());
    }
}

/// Magnitude recorder (payload sizes, key counts).
pub trait DistributionSummary: Send + Sync {
    /// Record one sample.
    fn record(&self, amount: u64);

    /// Number of recorded samples.
    fn count(&self) -> u64;

    /// Sum of all recorded samples.
    fn total_amount(&self) -> u64;
}

/// Gauge backed by an atomic the caller mutates and the backend samples.
#[derive(Debug, Default)]
pub struct LongGauge {
    value: AtomicI64,
}

impl LongGauge {
    /// Create a gauge holding `value`.
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    /// Overwrite the current value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Add `delta` (may be negative) and return the new value.
    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::Relaxed) + delta
    }

    /// Current value.
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics backend.
///
/// Creation calls may be invoked concurrently but are not assumed cheap; the
/// facade calls each at most once per cache key. Any `Err` is treated as a
/// transient failure and retried on the next call.
///
/// The `create_*` methods run while the facade holds the creation lock for
/// that instrument kind. The lock is not reentrant: an implementation must
/// not create or record an instrument of the same kind through the facade
/// that is calling it, or the calling thread deadlocks. Already cached
/// instruments are safe to use.
pub trait Registry: Send + Sync {
    /// Build the backend identity for a name and its full tag list.
    fn create_id(&self, name: &str, tags: &[Tag]) -> MetricId {
        MetricId::new(name, tags.iter().cloned())
    }

    /// Create (or look up) the counter for `id`.
    fn create_counter(&self, id: &MetricId) -> Result<Arc<dyn Counter>>;

    /// Register `initial` as the gauge for `id` and return the handle the
    /// backend will sample.
    fn create_gauge(&self, id: &MetricId, initial: Arc<LongGauge>) -> Result<Arc<LongGauge>>;

    /// Create (or look up) the percentile timer for `id`.
    fn create_percentile_timer(&self, id: &MetricId) -> Result<Arc<dyn Timer>>;

    /// Create (or look up) the distribution summary for `id`.
    fn create_distribution_summary(&self, id: &MetricId) -> Result<Arc<dyn DistributionSummary>>;
}
