//! Single-flight background refresh per metric family.
//!
//! Each family has one in-flight flag. A background refresh claims it with a
//! compare-and-swap; a claim that loses is dropped, not queued. The flag is
//! released by a guard that lives inside the spawned task, so it returns to
//! idle after the snapshot write even when the producer fails or panics.
//!
//! Synchronous refreshes bypass the flag entirely: the caller is already
//! waiting, and concurrent writes to a family resolve as last-write-wins.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::core::family::MetricFamily;
use crate::error::ProducerError;
use crate::storage::snapshot::{Document, SnapshotStore};

/// Result of asking for a background refresh.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A refresh task was spawned. Awaiting the handle is optional.
    Started(JoinHandle<()>),
    /// A refresh for the family was already running; nothing was spawned.
    AlreadyInFlight,
}

impl TriggerOutcome {
    /// Whether this call started a new refresh.
    #[must_use]
    pub const fn started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// Wait for the spawned refresh, if any, to settle.
    pub async fn settle(self) {
        if let Self::Started(handle) = self {
            // Panics are already accounted for inside the task.
            let _ = handle.await;
        }
    }
}

/// Counters describing background refresh activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    /// Background refreshes spawned.
    pub started: u64,
    /// Background refreshes that stored a new snapshot.
    pub completed: u64,
    /// Background refreshes whose producer failed or whose write failed.
    pub failed: u64,
    /// Trigger calls dropped because a refresh was already in flight.
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct FlightTable {
    in_flight: [AtomicBool; MetricFamily::COUNT],
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl FlightTable {
    fn try_claim(&self, family: MetricFamily) -> bool {
        self.in_flight[family.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self, family: MetricFamily) {
        self.in_flight[family.index()].store(false, Ordering::Release);
    }
}

/// Releases a family's in-flight flag when dropped.
///
/// A guard dropped without [`FlightGuard::finish`] means the task unwound,
/// which is counted as a failed refresh.
struct FlightGuard {
    table: Arc<FlightTable>,
    family: MetricFamily,
    finished: bool,
}

impl FlightGuard {
    fn finish(mut self, stored: bool) {
        let counter = if stored {
            &self.table.completed
        } else {
            &self.table.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.finished = true;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.table.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(family = %self.family, "Background metrics update aborted");
        }
        self.table.release(self.family);
        tracing::trace!(family = %self.family, "Refresh slot released");
    }
}

/// Coordinates recomputation of metric snapshots.
#[derive(Debug)]
pub struct RefreshCoordinator {
    store: Arc<SnapshotStore>,
    flights: Arc<FlightTable>,
}

impl RefreshCoordinator {
    /// Create a coordinator writing into `store`. Every family starts idle.
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            store,
            flights: Arc::new(FlightTable::default()),
        }
    }

    /// Whether a background refresh for the family is running.
    #[must_use]
    pub fn is_in_flight(&self, family: MetricFamily) -> bool {
        self.flights.in_flight[family.index()].load(Ordering::Acquire)
    }

    /// Snapshot of the refresh counters.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            started: self.flights.started.load(Ordering::Relaxed),
            completed: self.flights.completed.load(Ordering::Relaxed),
            failed: self.flights.failed.load(Ordering::Relaxed),
            skipped: self.flights.skipped.load(Ordering::Relaxed),
        }
    }

    /// Start a background refresh unless one is already running.
    ///
    /// Never waits for the producer. On success the new document replaces
    /// the family's snapshot; on failure the old snapshot stays
    /// authoritative. Must be called from within a tokio runtime.
    pub fn trigger_background<F, Fut>(&self, family: MetricFamily, producer: F) -> TriggerOutcome
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Document, ProducerError>> + Send + 'static,
    {
        if !self.flights.try_claim(family) {
            self.flights.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::info!(%family, "Background update already in progress");
            return TriggerOutcome::AlreadyInFlight;
        }

        let guard = FlightGuard {
            table: Arc::clone(&self.flights),
            family,
            finished: false,
        };
        let store = Arc::clone(&self.store);
        self.flights.started.fetch_add(1, Ordering::Relaxed);

        let span = tracing::info_span!("refresh", %family, mode = "background");
        let handle = tokio::spawn(
            async move {
                let start = Instant::now();
                tracing::info!(%family, "Starting background metrics update");

                let stored = match validate(producer().await) {
                    Ok(document) => store_on_blocking_pool(store, family, document).await,
                    Err(e) => {
                        tracing::warn!(%family, error = %e, "Background metrics update failed");
                        false
                    }
                };

                if stored {
                    tracing::info!(
                        %family,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Background metrics update completed"
                    );
                }
                guard.finish(stored);
            }
            .instrument(span),
        );

        TriggerOutcome::Started(handle)
    }

    /// Run a producer to completion and hand its result to the caller.
    ///
    /// The in-flight flag is neither consulted nor changed. The producer
    /// runs in its own task, so dropping the returned future (a caller-side
    /// timeout, a closed connection) does not cancel the work.
    pub async fn run_synchronous<F, Fut, T>(
        &self,
        family: MetricFamily,
        producer: F,
    ) -> Result<T, ProducerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProducerError>> + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        tracing::info!(%family, "Running synchronous metrics update");

        let span = tracing::info_span!("refresh", %family, mode = "sync");
        let result = match tokio::spawn(async move { producer().await }.instrument(span)).await {
            Ok(result) => result,
            Err(e) => Err(ProducerError::Panicked(e.to_string())),
        };

        match &result {
            Ok(_) => tracing::info!(
                %family,
                duration_ms = start.elapsed().as_millis() as u64,
                "Synchronous metrics update completed"
            ),
            Err(e) => tracing::warn!(%family, error = %e, "Synchronous metrics update failed"),
        }
        result
    }
}

/// Reject documents that carry no metrics.
pub(crate) fn validate(result: Result<Document, ProducerError>) -> Result<Document, ProducerError> {
    match result {
        Ok(document) if document.is_empty() => Err(ProducerError::Empty),
        other => other,
    }
}

async fn store_on_blocking_pool(
    store: Arc<SnapshotStore>,
    family: MetricFamily,
    mut document: Document,
) -> bool {
    tokio::task::spawn_blocking(move || store.write(family, &mut document))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    fn document(velocity: i64) -> Document {
        let mut document = Document::new();
        document.insert("velocity".to_string(), json!(velocity));
        document
    }

    fn coordinator() -> (TempDir, Arc<SnapshotStore>, RefreshCoordinator) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SnapshotStore::new(tmp.path()));
        let coordinator = RefreshCoordinator::new(Arc::clone(&store));
        (tmp, store, coordinator)
    }

    #[tokio::test]
    async fn background_refresh_writes_snapshot_and_returns_to_idle() {
        let (_tmp, store, coordinator) = coordinator();

        let outcome =
            coordinator.trigger_background(MetricFamily::Agile, || async { Ok(document(7)) });
        assert!(outcome.started());
        outcome.settle().await;

        let stored = store.read(MetricFamily::Agile).unwrap();
        assert_eq!(stored["velocity"], json!(7));
        assert_eq!(stored["cache_version"], json!(1));
        assert!(!coordinator.is_in_flight(MetricFamily::Agile));
        assert_eq!(coordinator.stats().completed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_triggers_run_producer_once() {
        let (_tmp, _store, coordinator) = coordinator();
        let coordinator = Arc::new(coordinator);
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            let release = Arc::clone(&release);
            tasks.push(tokio::spawn(async move {
                coordinator.trigger_background(MetricFamily::Agile, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Ok(document(1))
                })
            }));
        }

        let mut started = Vec::new();
        for task in tasks {
            let outcome = task.await.unwrap();
            if outcome.started() {
                started.push(outcome);
            }
        }
        assert_eq!(started.len(), 1);
        assert!(coordinator.is_in_flight(MetricFamily::Agile));

        release.notify_one();
        for outcome in started {
            outcome.settle().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.stats().skipped, 15);
        assert!(!coordinator.is_in_flight(MetricFamily::Agile));
    }

    #[tokio::test]
    async fn producer_failure_releases_slot() {
        let (_tmp, store, coordinator) = coordinator();

        coordinator
            .trigger_background(MetricFamily::Executive, || async {
                Err(ProducerError::Network("connection refused".to_string()))
            })
            .settle()
            .await;

        assert!(!coordinator.is_in_flight(MetricFamily::Executive));
        assert!(store.read(MetricFamily::Executive).is_none());
        assert_eq!(coordinator.stats().failed, 1);

        let retry = coordinator
            .trigger_background(MetricFamily::Executive, || async { Ok(document(2)) });
        assert!(retry.started());
        retry.settle().await;
        assert_eq!(store.read(MetricFamily::Executive).unwrap()["velocity"], json!(2));
    }

    #[tokio::test]
    async fn producer_panic_releases_slot() {
        let (_tmp, _store, coordinator) = coordinator();

        coordinator
            .trigger_background(MetricFamily::Agile, || async {
                if true {
                    panic!("producer exploded");
                }
                Ok(document(0))
            })
            .settle()
            .await;

        assert!(!coordinator.is_in_flight(MetricFamily::Agile));
        assert_eq!(coordinator.stats().failed, 1);
        assert!(
            coordinator
                .trigger_background(MetricFamily::Agile, || async { Ok(document(1)) })
                .started()
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let (_tmp, store, coordinator) = coordinator();
        store.write(MetricFamily::Agile, &mut document(40));

        coordinator
            .trigger_background(MetricFamily::Agile, || async { Ok(Document::new()) })
            .settle()
            .await;

        assert_eq!(store.read(MetricFamily::Agile).unwrap()["velocity"], json!(40));
        assert_eq!(coordinator.stats().failed, 1);
    }

    #[tokio::test]
    async fn families_refresh_independently() {
        let (_tmp, _store, coordinator) = coordinator();
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        let agile = coordinator.trigger_background(MetricFamily::Agile, move || async move {
            gate.notified().await;
            Ok(document(1))
        });
        let executive =
            coordinator.trigger_background(MetricFamily::Executive, || async { Ok(document(2)) });

        assert!(agile.started());
        assert!(executive.started());
        executive.settle().await;
        assert!(coordinator.is_in_flight(MetricFamily::Agile));
        assert!(!coordinator.is_in_flight(MetricFamily::Executive));

        release.notify_one();
        agile.settle().await;
        assert!(!coordinator.is_in_flight(MetricFamily::Agile));
    }

    #[traced_test]
    #[tokio::test]
    async fn skipped_trigger_is_logged() {
        let (_tmp, _store, coordinator) = coordinator();
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        let first = coordinator.trigger_background(MetricFamily::Agile, move || async move {
            gate.notified().await;
            Ok(document(1))
        });
        let second =
            coordinator.trigger_background(MetricFamily::Agile, || async { Ok(document(2)) });

        assert!(matches!(second, TriggerOutcome::AlreadyInFlight));
        assert!(logs_contain("already in progress"));

        release.notify_one();
        first.settle().await;
    }

    #[tokio::test]
    async fn synchronous_run_ignores_in_flight_flag() {
        let (_tmp, _store, coordinator) = coordinator();
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        let background = coordinator.trigger_background(MetricFamily::Agile, move || async move {
            gate.notified().await;
            Ok(document(1))
        });

        let result = coordinator
            .run_synchronous(MetricFamily::Agile, || async { Ok(document(9)) })
            .await
            .unwrap();
        assert_eq!(result["velocity"], json!(9));
        assert!(coordinator.is_in_flight(MetricFamily::Agile));

        release.notify_one();
        background.settle().await;
    }

    #[tokio::test]
    async fn synchronous_run_reports_panics_as_errors() {
        let (_tmp, _store, coordinator) = coordinator();

        let result: Result<Document, _> = coordinator
            .run_synchronous(MetricFamily::Agile, || async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                if true {
                    panic!("bridge crashed");
                }
                Ok(document(0))
            })
            .await;

        assert!(matches!(result, Err(ProducerError::Panicked(_))));
    }
}
