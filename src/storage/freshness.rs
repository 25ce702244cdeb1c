//! Snapshot freshness checks.
//!
//! Freshness is judged from the snapshot file's modification time, not from
//! the `cached_at` field inside it. The instant-serve path never consults
//! this; it serves whatever snapshot exists. Freshness only answers "would a
//! refresh be worth starting right now".

use std::time::{Duration, SystemTime};

use crate::core::family::MetricFamily;
use crate::storage::snapshot::SnapshotStore;

/// Default freshness window in minutes.
pub const DEFAULT_FRESH_MINUTES: u64 = 2;

/// Default freshness window.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(DEFAULT_FRESH_MINUTES * 60);

/// Per-family freshness windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    windows: [Duration; MetricFamily::COUNT],
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::uniform(DEFAULT_MAX_AGE)
    }
}

impl FreshnessPolicy {
    /// Same window for every family.
    #[must_use]
    pub const fn uniform(max_age: Duration) -> Self {
        Self {
            windows: [max_age; MetricFamily::COUNT],
        }
    }

    /// Override the window for one family.
    #[must_use]
    pub const fn with_window(mut self, family: MetricFamily, max_age: Duration) -> Self {
        self.windows[family.index()] = max_age;
        self
    }

    /// Configured window for a family.
    #[must_use]
    pub const fn window(&self, family: MetricFamily) -> Duration {
        self.windows[family.index()]
    }

    /// Whether the family's snapshot is younger than its configured window.
    #[must_use]
    pub fn is_fresh(&self, store: &SnapshotStore, family: MetricFamily) -> bool {
        is_fresh_within(store, family, self.window(family))
    }
}

/// Age of the family's snapshot, if it exists.
#[must_use]
pub fn snapshot_age(store: &SnapshotStore, family: MetricFamily) -> Option<Duration> {
    store.last_modified(family).map(age_since)
}

/// Whether a snapshot exists and `now - last_modified < max_age`.
///
/// Any metadata error reads as stale.
#[must_use]
pub fn is_fresh_within(store: &SnapshotStore, family: MetricFamily, max_age: Duration) -> bool {
    store
        .last_modified(family)
        .is_some_and(|modified| age_since(modified) < max_age)
}

/// Elapsed time since `modified`; a timestamp in the future counts as zero.
fn age_since(modified: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO)
}
