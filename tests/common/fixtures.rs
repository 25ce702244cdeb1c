//! Facade wiring and polling helpers for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agdash::core::facade::CacheFacade;
use agdash::core::family::MetricFamily;
use agdash::core::source::MetricsSource;
use agdash::storage::freshness::FreshnessPolicy;
use agdash::test_utils::{ScriptedSource, TestDir};

/// A facade over a scripted source, rooted in its own temp directory.
pub struct Harness {
    pub dir: TestDir,
    pub source: Arc<ScriptedSource>,
    pub facade: Arc<CacheFacade>,
}

impl Harness {
    /// Default freshness (two minutes for every family).
    pub fn new(source: ScriptedSource) -> Self {
        Self::with_freshness(source, FreshnessPolicy::default())
    }

    pub fn with_freshness(source: ScriptedSource, freshness: FreshnessPolicy) -> Self {
        let dir = TestDir::new();
        let source = Arc::new(source);
        let shared: Arc<dyn MetricsSource> = source.clone();
        let facade = CacheFacade::new(Arc::new(dir.store()), freshness, shared);
        Self {
            dir,
            source,
            facade: Arc::new(facade),
        }
    }

    /// Wait until no background refresh is running for `family`.
    pub async fn settle(&self, family: MetricFamily) {
        let facade = Arc::clone(&self.facade);
        wait_until(Duration::from_secs(5), move || {
            let facade = Arc::clone(&facade);
            async move { !facade.coordinator().is_in_flight(family) }
        })
        .await;
    }
}

/// Poll `condition` every 10ms until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within `limit`.
pub async fn wait_until<F, Fut>(limit: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {limit:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
