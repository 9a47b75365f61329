//! In-process registry backend.
//!
//! [`LocalRegistry`] keeps every instrument in memory, keyed by
//! [`MetricId`]. Creating the same id twice returns the same instrument, the
//! way a real backend dedupes ids. It is used when no external backend is
//! wired in, and by tests and benches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::Result;
use crate::histogram::Histogram;
use crate::key::MetricId;
use crate::registry::{Counter, DistributionSummary, LongGauge, Registry, Timer};

/// Atomic counter.
#[derive(Debug, Default)]
pub struct LocalCounter {
    count: AtomicU64,
}

impl Counter for LocalCounter {
    fn add(&self, amount: u64) {
        self.count.fetch_add(amount, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Timer recording nanoseconds into latency buckets.
#[derive(Debug)]
pub struct LocalTimer {
    histogram: Histogram,
}

impl LocalTimer {
    fn new() -> Self {
        Self {
            histogram: Histogram::latency(),
        }
    }

    /// Underlying histogram, values in nanoseconds.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Approximate percentile duration.
    pub fn percentile(&self, p: f64) -> Duration {
        Duration::from_nanos(self.histogram.percentile(p))
    }
}

impl Timer for LocalTimer {
    fn record(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.observe(nanos);
    }

    fn count(&self) -> u64 {
        self.histogram.count()
    }

    fn total_time(&self) -> Duration {
        Duration::from_nanos(self.histogram.sum())
    }
}

/// Distribution summary recording into power-of-four size buckets.
#[derive(Debug)]
pub struct LocalDistributionSummary {
    histogram: Histogram,
}

impl LocalDistributionSummary {
    fn new() -> Self {
        Self {
            histogram: Histogram::sizes(),
        }
    }

    /// Underlying histogram.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl DistributionSummary for LocalDistributionSummary {
    fn record(&self, amount: u64) {
        self.histogram.observe(amount);
    }

    fn count(&self) -> u64 {
        self.histogram.count()
    }

    fn total_amount(&self) -> u64 {
        self.histogram.sum()
    }
}

/// In-memory [`Registry`].
pub struct LocalRegistry {
    started_at: Instant,
    counters: DashMap<MetricId, Arc<LocalCounter>>,
    gauges: DashMap<MetricId, Arc<LongGauge>>,
    timers: DashMap<MetricId, Arc<LocalTimer>>,
    summaries: DashMap<MetricId, Arc<LocalDistributionSummary>>,
}

impl LocalRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            counters: DashMap::new(),
            gauges: DashMap::new(),
            timers: DashMap::new(),
            summaries: DashMap::new(),
        }
    }

    /// Seconds since the registry was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Total number of registered instruments across all kinds.
    pub fn instrument_count(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.timers.len() + self.summaries.len()
    }

    /// Registered counter for `id`, if any.
    pub fn counter(&self, id: &MetricId) -> Option<Arc<LocalCounter>> {
        self.counters.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Registered gauge for `id`, if any.
    pub fn gauge(&self, id: &MetricId) -> Option<Arc<LongGauge>> {
        self.gauges.get(id).map(|g| Arc::clone(g.value()))
    }

    /// Registered timer for `id`, if any.
    pub fn timer(&self, id: &MetricId) -> Option<Arc<LocalTimer>> {
        self.timers.get(id).map(|t| Arc::clone(t.value()))
    }

    /// Registered distribution summary for `id`, if any.
    pub fn distribution_summary(&self, id: &MetricId) -> Option<Arc<LocalDistributionSummary>> {
        self.summaries.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Current value of every counter.
    pub fn counter_values(&self) -> HashMap<MetricId, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count()))
            .collect()
    }

    /// Current value of every gauge.
    pub fn gauge_values(&self) -> HashMap<MetricId, i64> {
        self.gauges
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().value()))
            .collect()
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for LocalRegistry {
    fn create_counter(&self, id: &MetricId) -> Result<Arc<dyn Counter>> {
        let counter: Arc<dyn Counter> = self.counters.entry(id.clone()).or_default().clone();
        Ok(counter)
    }

    fn create_gauge(&self, id: &MetricId, initial: Arc<LongGauge>) -> Result<Arc<LongGauge>> {
        Ok(self.gauges.entry(id.clone()).or_insert(initial).clone())
    }

    fn create_percentile_timer(&self, id: &MetricId) -> Result<Arc<dyn Timer>> {
        let timer: Arc<dyn Timer> = self
            .timers
            .entry(id.clone())
            .or_insert_with(|| Arc::new(LocalTimer::new()))
            .clone();
        Ok(timer)
    }

    fn create_distribution_summary(&self, id: &MetricId) -> Result<Arc<dyn DistributionSummary>> {
        let summary: Arc<dyn DistributionSummary> = self
            .summaries
            .entry(id.clone())
            .or_insert_with(|| Arc::new(LocalDistributionSummary::new()))
            .clone();
        Ok(summary)
    }
}

/// Shared local registry handle.
pub type SharedLocalRegistry = Arc<LocalRegistry>;
