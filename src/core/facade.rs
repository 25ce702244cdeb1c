//! Cache-first serving of metric families.
//!
//! [`CacheFacade`] is the one entry point the HTTP layer and CLI talk to.
//! A stored snapshot is always served immediately, whatever its age, and a
//! background refresh is kicked off behind it. Only when there is nothing
//! to serve (or the caller insists) does a request wait for the metrics
//! source.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::degraded::degraded_document;
use super::family::MetricFamily;
use super::refresh::{RefreshCoordinator, RefreshStats, TriggerOutcome, validate};
use super::source::MetricsSource;
use crate::error::ProducerError;
use crate::storage::freshness::{FreshnessPolicy, snapshot_age};
use crate::storage::snapshot::{
    Document, SERVED_AT_FIELD, SERVED_FROM_CACHE_FIELD, SnapshotStore, StoreMetricsSnapshot,
};

/// What an instant read produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Served {
    /// A stored snapshot, served without waiting on the source.
    Cached(Document),
    /// A document computed for this request and stored.
    Computed(Document),
    /// The synchronous refresh failed and there was nothing to serve.
    Failed(ProducerError),
}

impl Served {
    /// Short label for response headers and logs.
    #[must_use]
    pub const fn cache_label(&self) -> &'static str {
        match self {
            Self::Cached(_) => "hit",
            Self::Computed(_) => "miss",
            Self::Failed(_) => "degraded",
        }
    }

    /// The served document, if one was produced.
    #[must_use]
    pub const fn document(&self) -> Option<&Document> {
        match self {
            Self::Cached(document) | Self::Computed(document) => Some(document),
            Self::Failed(_) => None,
        }
    }

    /// Collapse into a document, substituting the degraded document on failure.
    #[must_use]
    pub fn into_document(self, family: MetricFamily) -> Document {
        match self {
            Self::Cached(document) | Self::Computed(document) => document,
            Self::Failed(error) => degraded_document(family, &error),
        }
    }
}

/// Read-only view of one family's cache state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyStatus {
    pub family: MetricFamily,
    pub exists: bool,
    pub fresh: bool,
    pub in_flight: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub age_seconds: Option<f64>,
    pub fresh_window_seconds: u64,
}

/// Read-only view of the whole cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub families: Vec<FamilyStatus>,
    pub refresh: RefreshStats,
    pub store: StoreMetricsSnapshot,
    pub cache_dir: PathBuf,
    pub source: String,
}

/// Stale-while-revalidate cache over a metrics source.
pub struct CacheFacade {
    store: Arc<SnapshotStore>,
    freshness: FreshnessPolicy,
    coordinator: RefreshCoordinator,
    source: Arc<dyn MetricsSource>,
}

impl std::fmt::Debug for CacheFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFacade")
            .field("store", &self.store)
            .field("freshness", &self.freshness)
            .field("coordinator", &self.coordinator)
            .field("source", &self.source.name())
            .finish()
    }
}

impl CacheFacade {
    /// Wire a facade over `store` and `source`.
    #[must_use]
    pub fn new(
        store: Arc<SnapshotStore>,
        freshness: FreshnessPolicy,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(Arc::clone(&store));
        Self {
            store,
            freshness,
            coordinator,
            source,
        }
    }

    /// The underlying snapshot store.
    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// The refresh coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// The freshness policy.
    #[must_use]
    pub const fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    /// Serve a family's metrics.
    ///
    /// With a stored snapshot and no `force_refresh`, returns at once and
    /// refreshes in the background. Otherwise waits for the source, stores
    /// the result and returns it. Never panics or errors; a failed
    /// synchronous refresh comes back as [`Served::Failed`].
    pub async fn get_instant(&self, family: MetricFamily, force_refresh: bool) -> Served {
        if !force_refresh {
            if let Some(document) = self.read_cached(family) {
                // Fire-and-forget: the handle is dropped, the task keeps running.
                let _ = self.trigger_refresh(family);
                return Served::Cached(document);
            }
            tracing::info!(%family, "No snapshot yet, computing synchronously");
        }

        self.compute(family).await
    }

    /// Serve a family without scheduling any background work.
    ///
    /// Same as [`get_instant`](Self::get_instant) except that a cache hit
    /// never triggers a refresh. For short-lived callers that would exit
    /// before a background refresh could finish.
    pub async fn get_cached_or_compute(
        &self,
        family: MetricFamily,
        force_refresh: bool,
    ) -> Served {
        if !force_refresh {
            if let Some(document) = self.read_cached(family) {
                return Served::Cached(document);
            }
            tracing::info!(%family, "No snapshot yet, computing synchronously");
        }

        self.compute(family).await
    }

    /// The stored snapshot with serving markers added, if there is one.
    ///
    /// Touches only the store; the metrics source is never called.
    #[must_use]
    pub fn read_cached(&self, family: MetricFamily) -> Option<Document> {
        let mut document = self.store.read(family)?;
        document.insert(SERVED_FROM_CACHE_FIELD.to_string(), Value::Bool(true));
        document.insert(
            SERVED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        tracing::debug!(%family, "Served metrics from snapshot");
        Some(document)
    }

    async fn compute(&self, family: MetricFamily) -> Served {
        match self.refresh_now(family).await {
            Ok(document) => Served::Computed(document),
            Err(error) => Served::Failed(error),
        }
    }

    /// Start a background refresh with the real source, unless one is running.
    pub fn trigger_refresh(&self, family: MetricFamily) -> TriggerOutcome {
        let source = Arc::clone(&self.source);
        self.coordinator
            .trigger_background(family, move || async move { source.produce(family).await })
    }

    /// Recompute and store a family's snapshot, waiting for the result.
    ///
    /// Produce and store run together in a task of their own, so a caller
    /// that stops waiting does not lose the refresh.
    ///
    /// # Errors
    ///
    /// Returns the producer's error; nothing is stored in that case.
    pub async fn refresh_now(&self, family: MetricFamily) -> Result<Document, ProducerError> {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);

        self.coordinator
            .run_synchronous(family, move || async move {
                let document = validate(source.produce(family).await)?;
                let (stored, document) = tokio::task::spawn_blocking(move || {
                    let mut document = document;
                    let stored = store.write(family, &mut document);
                    (stored, document)
                })
                .await
                .map_err(|e| ProducerError::Panicked(e.to_string()))?;

                if !stored {
                    tracing::warn!(%family, "Serving computed metrics that could not be stored");
                }
                Ok(document)
            })
            .await
    }

    /// Start a background refresh only if the snapshot is missing or stale.
    ///
    /// Returns `None` when the snapshot is fresh and nothing was attempted.
    pub fn warm(&self, family: MetricFamily) -> Option<TriggerOutcome> {
        if self.freshness.is_fresh(&self.store, family) {
            tracing::trace!(%family, "Snapshot fresh, skipping warm-up");
            return None;
        }
        Some(self.trigger_refresh(family))
    }

    /// Cache state for one family.
    #[must_use]
    pub fn status(&self, family: MetricFamily) -> FamilyStatus {
        let last_modified = self.store.last_modified(family);
        FamilyStatus {
            family,
            exists: self.store.exists(family),
            fresh: self.freshness.is_fresh(&self.store, family),
            in_flight: self.coordinator.is_in_flight(family),
            last_modified: last_modified.map(to_utc),
            age_seconds: snapshot_age(&self.store, family).map(|age| age.as_secs_f64()),
            fresh_window_seconds: self.freshness.window(family).as_secs(),
        }
    }

    /// Cache state for every family plus activity counters.
    #[must_use]
    pub fn status_all(&self) -> CacheStatus {
        CacheStatus {
            families: MetricFamily::ALL.iter().map(|f| self.status(*f)).collect(),
            refresh: self.coordinator.stats(),
            store: self.store.metrics().snapshot(),
            cache_dir: self.store.dir().to_path_buf(),
            source: self.source.name().to_string(),
        }
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
