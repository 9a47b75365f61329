//! Public metrics surface for the cache client.
//!
//! [`MetricsFacade`] owns one [`InstrumentCache`] per instrument kind and
//! an optional backend [`Registry`]. Getters resolve a name and tag set to
//! a canonical [`MetricKey`] and create the backend instrument on first use
//! only. Every later call, from any thread, gets the same `Arc` handle.
//!
//! # Usage
//!
//! ```
//! use evcache_metrics::{Counter, MetricsFacade, Tag};
//!
//! let metrics = MetricsFacade::with_local_registry();
//! let tags = [Tag::new("cache", "c1"), Tag::new("status", "success")];
//!
//! for _ in 0..5 {
//!     metrics.increment("evcache.client.call", &tags).unwrap();
//! }
//!
//! let counter = metrics.counter("evcache.client.call", &tags).unwrap();
//! assert_eq!(counter.count(), 5);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cache::{InstrumentCache, InstrumentKind};
use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use crate::key::{MetricId, MetricKey, Tag};
use crate::local::LocalRegistry;
use crate::registry::{Counter, DistributionSummary, LongGauge, Registry, Timer};

/// Lazily created, cached metric instruments in front of a [`Registry`].
pub struct MetricsFacade {
    config: MetricsConfig,
    registry: RwLock<Option<Arc<dyn Registry>>>,

    counters: InstrumentCache<dyn Counter>,
    gauges: InstrumentCache<LongGauge>,
    timers: InstrumentCache<dyn Timer>,
    summaries: InstrumentCache<dyn DistributionSummary>,
}

impl MetricsFacade {
    /// Create a facade backed by `registry`.
    ///
    /// Fails with [`Error::Config`] if `config` does not validate.
    pub fn new(config: MetricsConfig, registry: Arc<dyn Registry>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Some(registry)))
    }

    /// Create a facade with no backend.
    ///
    /// Every getter reports [`Error::BackendUnavailable`] until
    /// [`bind_registry`](Self::bind_registry) is called.
    pub fn detached(config: MetricsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    /// Create a facade with default config over a fresh [`LocalRegistry`].
    pub fn with_local_registry() -> Self {
        Self::build(MetricsConfig::default(), Some(Arc::new(LocalRegistry::new())))
    }

    fn build(config: MetricsConfig, registry: Option<Arc<dyn Registry>>) -> Self {
        Self {
            config,
            registry: RwLock::new(registry),
            counters: InstrumentCache::new(InstrumentKind::Counter),
            gauges: InstrumentCache::new(InstrumentKind::Gauge),
            timers: InstrumentCache::new(InstrumentKind::Timer),
            summaries: InstrumentCache::new(InstrumentKind::DistributionSummary),
        }
    }

    /// Facade configuration.
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// The bound backend, if any.
    pub fn registry(&self) -> Option<Arc<dyn Registry>> {
        self.registry.read().clone()
    }

    /// Bind (or replace) the backend.
    ///
    /// Instruments already cached keep pointing at the registry that
    /// created them.
    pub fn bind_registry(&self, registry: Arc<dyn Registry>) {
        let previous = self.registry.write().replace(registry);
        info!(replaced = previous.is_some(), "Metrics registry bound");
    }

    /// Drop the backend; later first-time creations fail until rebound.
    pub fn unbind_registry(&self) -> Option<Arc<dyn Registry>> {
        let previous = self.registry.write().take();
        if previous.is_some() {
            info!("Metrics registry unbound");
        }
        previous
    }

    fn require_registry(&self) -> Result<Arc<dyn Registry>> {
        self.registry().ok_or(Error::BackendUnavailable)
    }

    fn key(&self, name: &str, tags: &[Tag]) -> Result<MetricKey> {
        MetricKey::with_owner(name, tags, &self.config.owner_tag)
    }

    fn backend_id(&self, registry: &dyn Registry, key: &MetricKey) -> MetricId {
        registry.create_id(key.name(), &key.registry_tags(&self.config.owner_tag))
    }

    /// Backend id for `name` and `tags`, owner tag included.
    pub fn id(&self, name: &str, tags: &[Tag]) -> Result<MetricId> {
        let key = self.key(name, tags)?;
        let registry = self.require_registry()?;
        Ok(self.backend_id(registry.as_ref(), &key))
    }

    // Counters

    /// Counter for `name` and `tags`, created on first use.
    pub fn counter(&self, name: &str, tags: &[Tag]) -> Result<Arc<dyn Counter>> {
        let key = self.key(name, tags)?;
        self.counters.get_or_create(&key, |key| {
            let registry = self.require_registry()?;
            registry.create_counter(&self.backend_id(registry.as_ref(), key))
        })
    }

    /// Add one to the counter.
    pub fn increment(&self, name: &str, tags: &[Tag]) -> Result<()> {
        self.increment_by(name, tags, 1)
    }

    /// Add `amount` to the counter.
    pub fn increment_by(&self, name: &str, tags: &[Tag], amount: u64) -> Result<()> {
        skip_unavailable(name, self.counter(name, tags).map(|c| c.add(amount)))
    }

    // Gauges

    /// Long gauge for `name` and `tags`, starting at zero on first creation.
    pub fn long_gauge(&self, name: &str, tags: &[Tag]) -> Result<Arc<LongGauge>> {
        let key = self.key(name, tags)?;
        self.gauges.get_or_create(&key, |key| {
            let registry = self.require_registry()?;
            let id = self.backend_id(registry.as_ref(), key);
            registry.create_gauge(&id, Arc::new(LongGauge::new(0)))
        })
    }

    /// Set the gauge to `value`.
    pub fn set_gauge(&self, name: &str, tags: &[Tag], value: i64) -> Result<()> {
        skip_unavailable(name, self.long_gauge(name, tags).map(|g| g.set(value)))
    }

    // Timers

    /// Percentile timer for `name` and `tags`.
    pub fn percentile_timer(&self, name: &str, tags: &[Tag]) -> Result<Arc<dyn Timer>> {
        let key = self.key(name, tags)?;
        self.timers.get_or_create(&key, |key| {
            let registry = self.require_registry()?;
            registry.create_percentile_timer(&self.backend_id(registry.as_ref(), key))
        })
    }

    /// Record one duration on the percentile timer.
    pub fn record_duration(&self, name: &str, tags: &[Tag], duration: Duration) -> Result<()> {
        skip_unavailable(
            name,
            self.percentile_timer(name, tags).map(|t| t.record(duration)),
        )
    }

    // Distribution summaries

    /// Distribution summary for `name` and `tags`.
    ///
    /// Returns [`Error::BackendUnavailable`] when no backend can create it;
    /// that outcome is not cached.
    pub fn distribution_summary(
        &self,
        name: &str,
        tags: &[Tag],
    ) -> Result<Arc<dyn DistributionSummary>> {
        let key = self.key(name, tags)?;
        self.summaries.get_or_create(&key, |key| {
            let registry = self.require_registry()?;
            registry.create_distribution_summary(&self.backend_id(registry.as_ref(), key))
        })
    }

    /// Like [`distribution_summary`](Self::distribution_summary), but any
    /// failure is reported as `None`.
    pub fn distribution_summary_opt(
        &self,
        name: &str,
        tags: &[Tag],
    ) -> Option<Arc<dyn DistributionSummary>> {
        self.distribution_summary(name, tags).ok()
    }

    /// Record one sample on the distribution summary.
    pub fn record_amount(&self, name: &str, tags: &[Tag], amount: u64) -> Result<()> {
        skip_unavailable(
            name,
            self.distribution_summary(name, tags).map(|s| s.record(amount)),
        )
    }

    // Enumeration

    /// Every counter created so far.
    pub fn all_counters(&self) -> HashMap<MetricKey, Arc<dyn Counter>> {
        self.counters.snapshot()
    }

    /// Every long gauge created so far.
    pub fn all_gauges(&self) -> HashMap<MetricKey, Arc<LongGauge>> {
        self.gauges.snapshot()
    }

    /// Every percentile timer created so far.
    pub fn all_timers(&self) -> HashMap<MetricKey, Arc<dyn Timer>> {
        self.timers.snapshot()
    }

    /// Every distribution summary created so far.
    pub fn all_distribution_summaries(&self) -> HashMap<MetricKey, Arc<dyn DistributionSummary>> {
        self.summaries.snapshot()
    }
}

impl Default for MetricsFacade {
    fn default() -> Self {
        Self::with_local_registry()
    }
}

impl fmt::Debug for MetricsFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsFacade")
            .field("config", &self.config)
            .field("registry_bound", &self.registry.read().is_some())
            .field("counters", &self.counters)
            .field("gauges", &self.gauges)
            .field("timers", &self.timers)
            .field("summaries", &self.summaries)
            .finish()
    }
}

/// Treat an unavailable backend as "skip this sample".
fn skip_unavailable(name: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(Error::BackendUnavailable) => {
            debug!(metric = name, "Metrics backend unavailable, sample dropped");
            Ok(())
        }
        other => other,
    }
}

/// Shared facade handle.
pub type SharedMetricsFacade = Arc<MetricsFacade>;

/// Create a shared facade.
pub fn new_shared_facade(
    config: MetricsConfig,
    registry: Arc<dyn Registry>,
) -> Result<SharedMetricsFacade> {
    MetricsFacade::new(config, registry).map(Arc::new)
}
