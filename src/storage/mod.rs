//! Storage for configuration and metric snapshots.

pub mod config;
pub mod freshness;
pub mod paths;
pub mod snapshot;

pub use config::{
    Config, ConfigOverrides, ConfigSource, ConfigSources, ENV_CACHE_DIR, ENV_CONFIG,
    ENV_FRESH_MINUTES, ENV_LISTEN, ENV_PROJECT, ENV_REQUEST_TIMEOUT, ENV_SOURCE_TIMEOUT,
    ENV_SOURCE_URL, ENV_WARM_INTERVAL, ResolvedConfig,
};
pub use freshness::{DEFAULT_FRESH_MINUTES, FreshnessPolicy, is_fresh_within, snapshot_age};
pub use paths::AppPaths;
pub use snapshot::{CACHE_VERSION, Document, SnapshotStore, StoreMetrics, StoreMetricsSnapshot};
