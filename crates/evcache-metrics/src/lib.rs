//! EVCache Metrics - cached metric instruments for the EVCache client.
//!
//! This crate lets the cache client record telemetry without registering a
//! new instrument on every call. A [`MetricsFacade`] resolves a metric name
//! and tag set to one shared instrument handle, created lazily in the
//! backend [`Registry`] exactly once per key.
//!
//! Tag order never matters: `{cache=c1, status=success}` and
//! `{status=success, cache=c1}` are the same metric.
//!
//! Failed creations are never cached. When the backend is unavailable,
//! getters return [`Error::BackendUnavailable`] and the recording helpers
//! drop the sample; the next call tries again.

pub mod cache;
pub mod config;
pub mod error;
pub mod facade;
pub mod histogram;
pub mod key;
pub mod local;
pub mod registry;

pub use cache::{InstrumentCache, InstrumentKind};
pub use config::MetricsConfig;
pub use error::{Error, Result};
pub use facade::{new_shared_facade, MetricsFacade, SharedMetricsFacade};
pub use histogram::Histogram;
pub use key::{MetricId, MetricKey, Tag};
pub use local::{
    LocalCounter, LocalDistributionSummary, LocalRegistry, LocalTimer, SharedLocalRegistry,
};
pub use registry::{Counter, DistributionSummary, LongGauge, Registry, Timer};
