//! Fixed-bucket histogram backing local timers and distribution summaries.
//!
//! Values are unit-less `u64`s: timers record nanoseconds, distribution
//! summaries record whatever magnitude the caller reports (bytes, item
//! counts). All operations are lock-free.

use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-bucket histogram with approximate percentiles.
#[derive(Debug)]
pub struct Histogram {
    /// Inclusive upper bounds, ascending.
    bounds: Box<[u64]>,
    /// One count per bound, plus a trailing overflow bucket.
    counts: Box<[AtomicU64]>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Create a histogram from ascending bucket bounds.
    ///
    /// Bounds are sorted and deduplicated if the caller did not do so.
    pub fn with_buckets(bounds: impl Into<Vec<u64>>) -> Self {
        let mut bounds = bounds.into();
        bounds.sort_unstable();
        bounds.dedup();

        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds: bounds.into_boxed_slice(),
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Buckets for durations in nanoseconds: 100us up to 10s.
    pub fn latency() -> Self {
        Self::with_buckets(vec![
            100_000,        // 100us
            500_000,        // 500us
            1_000_000,      // 1ms
            5_000_000,      // 5ms
            10_000_000,     // 10ms
            50_000_000,     // 50ms
            100_000_000,    // 100ms
            500_000_000,    // 500ms
            1_000_000_000,  // 1s
            10_000_000_000, // 10s
        ])
    }

    /// Power-of-four buckets for sizes, 64 up to 16M.
    pub fn sizes() -> Self {
        Self::with_buckets((3..=12).map(|exp| 4u64.pow(exp)).collect::<Vec<_>>())
    }

    /// Record one value. The running sum saturates at `u64::MAX`.
    pub fn observe(&self, value: u64) {
        let _ = self.sum.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |sum| {
            Some(sum.saturating_add(value))
        });
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);

        let idx = self.bounds.partition_point(|&bound| bound < value);
        self.counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observed values.
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Largest observed value.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Mean of all observed values, 0 when empty.
    pub fn avg(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        self.sum() / count
    }

    /// Approximate percentile, `p` in `0.0..=1.0`.
    ///
    /// Returns the upper bound of the bucket holding the target rank. Ranks
    /// landing in the overflow bucket report the observed maximum.
    pub fn percentile(&self, p: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }

        let target = ((total as f64 * p.clamp(0.0, 1.0)).ceil() as u64).max(1);
        let mut cumulative = 0u64;
        for (i, count) in self.counts.iter().enumerate() {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return self.bounds.get(i).copied().unwrap_or_else(|| self.max());
            }
        }
        self.max()
    }

    /// Median.
    pub fn p50(&self) -> u64 {
        self.percentile(0.50)
    }

    /// 99th percentile.
    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }

    /// Per-bucket counts as `(upper_bound, count)`; the overflow bucket is
    /// reported with bound `u64::MAX`.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.bounds
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.counts.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::latency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_totals() {
        let hist = Histogram::with_buckets(vec![10, 100, 1000]);
        hist.observe(5);
        hist.observe(50);
        hist.observe(500);

        assert_eq!(hist.count(), 3);
        assert_eq!(hist.sum(), 555);
        assert_eq!(hist.max(), 500);
        assert_eq!(hist.avg(), 185);
    }

    #[test]
    fn test_bucket_bounds_inclusive() {
        let hist = Histogram::with_buckets(vec![10, 100]);
        hist.observe(10);
        hist.observe(11);
        hist.observe(100);

        assert_eq!(hist.snapshot(), vec![(10, 1), (100, 2), (u64::MAX, 0)]);
    }

    #[test]
    fn test_overflow_bucket() {
        let hist = Histogram::with_buckets(vec![10, 100]);
        hist.observe(5_000);

        assert_eq!(hist.snapshot()[2], (u64::MAX, 1));
        assert_eq!(hist.p99(), 5_000);
    }

    #[test]
    fn test_percentiles() {
        let hist = Histogram::with_buckets(vec![100, 1_000]);
        for _ in 0..100 {
            hist.observe(50);
        }
        assert_eq!(hist.p50(), 100);
        assert_eq!(hist.p99(), 100);

        for _ in 0..100 {
            hist.observe(800);
        }
        assert_eq!(hist.p50(), 100);
        assert_eq!(hist.p99(), 1_000);
    }

    #[test]
    fn test_empty() {
        let hist = Histogram::latency();
        assert_eq!(hist.count(), 0);
        assert_eq!(hist.avg(), 0);
        assert_eq!(hist.p50(), 0);
        assert_eq!(hist.max(), 0);
    }

    #[test]
    fn test_unsorted_bounds_normalized() {
        let hist = Histogram::with_buckets(vec![100, 10, 100]);
        let bounds: Vec<u64> = hist.snapshot().iter().map(|&(b, _)| b).collect();
        assert_eq!(bounds, vec![10, 100, u64::MAX]);
    }

    #[test]
    fn test_size_buckets() {
        let hist = Histogram::sizes();
        hist.observe(64);
        hist.observe(65);

        let snapshot = hist.snapshot();
        assert_eq!(snapshot[0], (64, 1));
        assert_eq!(snapshot[1], (256, 1));
    }

    #[test]
    fn test_sum_saturates() {
        let hist = Histogram::with_buckets(vec![10]);
        hist.observe(u64::MAX - 1);
        hist.observe(5);
        hist.observe(1);

        assert_eq!(hist.sum(), u64::MAX);
        assert_eq!(hist.count(), 3);
        assert_eq!(hist.max(), u64::MAX - 1);
    }
}
