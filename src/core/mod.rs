//! Metric families, refresh coordination, and cache-first serving.

pub mod degraded;
pub mod facade;
pub mod family;
pub mod http;
pub mod logging;
pub mod refresh;
pub mod source;
pub mod warmer;

pub use degraded::{DATA_SOURCE_ERROR, DATA_SOURCE_TIMEOUT, degraded_document};
pub use facade::{CacheFacade, CacheStatus, FamilyStatus, Served};
pub use family::MetricFamily;
pub use refresh::{RefreshCoordinator, RefreshStats, TriggerOutcome};
pub use source::{HttpMetricsSource, MetricsSource};
pub use warmer::{WarmerState, run_warmer};
