//! Test utilities for agdash.
//!
//! Provides a scriptable metrics source, document factories, isolated
//! directories, and assertion macros shared by unit and integration tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use agdash::test_utils::*;
//!
//! let dir = TestDir::new();
//! let source = ScriptedSource::new().with_delay(Duration::from_millis(200));
//! let doc = make_test_agile_document(42);
//! ```

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::core::family::MetricFamily;
use crate::core::source::MetricsSource;
use crate::error::ProducerError;
use crate::storage::snapshot::{Document, SnapshotStore};

// =============================================================================
// Document Factories
// =============================================================================

/// Create an agile metrics document with the given velocity.
///
/// # Panics
///
/// Never in practice; the literal is always an object.
#[must_use]
pub fn make_test_agile_document(velocity: i64) -> Document {
    object(json!({
        "velocity": velocity,
        "bugs_prod": 3,
        "bugs_qa": 5,
        "unplanned": 2,
        "committed_vs_delivered": {"committed": 40, "delivered": 34},
        "quality_percentage": 87.5,
        "team_health": 8,
        "lead_time": 4.2,
        "total_issues": 57,
        "cycle_time_evolution": [
            {"month": "2026-08", "days": 5.1},
            {"month": "2026-09", "days": 4.4},
        ],
        "data_source": "mcp_api",
    }))
}

/// Create an executive metrics document with the given evolution percentage.
#[must_use]
pub fn make_test_executive_document(evolution_percentage: i64) -> Document {
    object(json!({
        "evolution_percentage": evolution_percentage,
        "total_items": 24,
        "completed_items": 15,
        "in_progress_items": 6,
        "not_planned_items": 1,
        "impediments": 2,
        "dependencies": 4,
        "not_started": 2,
        "monthly_data": [{"month": "2026-09", "completed": 7}],
        "items_summary": [],
        "observations": "On track",
        "data_source": "mcp_api",
    }))
}

/// Create a document for `family` tagged with a sequence number.
///
/// The number lands in `velocity` (agile) or `evolution_percentage`
/// (executive), so tests can tell successive refreshes apart.
#[must_use]
pub fn make_test_document(family: MetricFamily, seq: i64) -> Document {
    match family {
        MetricFamily::Agile => make_test_agile_document(seq),
        MetricFamily::Executive => make_test_executive_document(seq),
    }
}

/// Read back the sequence number written by [`make_test_document`].
#[must_use]
pub fn document_seq(family: MetricFamily, document: &Document) -> Option<i64> {
    let key = match family {
        MetricFamily::Agile => "velocity",
        MetricFamily::Executive => "evolution_percentage",
    };
    document.get(key).and_then(Value::as_i64)
}

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

// =============================================================================
// Scripted Metrics Source
// =============================================================================

/// A [`MetricsSource`] whose behavior tests control.
///
/// Each call bumps a counter and returns [`make_test_document`] tagged with
/// the call number for that family (starting at 1). Optional knobs:
/// - a fixed delay before answering
/// - a gate: every call waits for a permit added with [`ScriptedSource::release`]
/// - a scripted failure returned instead of a document
/// - a panic, for exercising task unwinding
#[derive(Debug, Default)]
pub struct ScriptedSource {
    calls: [AtomicUsize; MetricFamily::COUNT],
    delay: Duration,
    gate: Option<Semaphore>,
    failure: Mutex<Option<ProducerError>>,
    panics: bool,
    empty: bool,
}

impl ScriptedSource {
    /// A source that answers immediately with a fresh document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold every call until a permit is released.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Fail every call with `error` until [`ScriptedSource::set_failure`] clears it.
    #[must_use]
    pub fn failing(self, error: ProducerError) -> Self {
        self.set_failure(Some(error));
        self
    }

    /// Panic inside `produce`.
    #[must_use]
    pub const fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Answer with an empty document.
    #[must_use]
    pub const fn empty(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Change the scripted failure.
    pub fn set_failure(&self, error: Option<ProducerError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Let `n` gated calls proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Total calls across all families.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Calls for one family.
    #[must_use]
    pub fn calls_for(&self, family: MetricFamily) -> usize {
        self.calls[family.index()].load(Ordering::SeqCst)
    }
}

impl MetricsSource for ScriptedSource {
    fn produce(&self, family: MetricFamily) -> BoxFuture<'_, Result<Document, ProducerError>> {
        Box::pin(async move {
            let seq = self.calls[family.index()].fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            assert!(!self.panics, "scripted source panic");

            let failure = self.failure.lock().ok().and_then(|f| f.clone());
            if let Some(error) = failure {
                return Err(error);
            }
            if self.empty {
                return Ok(Document::new());
            }
            Ok(make_test_document(family, i64::try_from(seq).unwrap_or(i64::MAX)))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// =============================================================================
// Snapshot Helpers
// =============================================================================

/// Write a snapshot and push its modification time `age` into the past.
///
/// # Panics
///
/// Panics if the snapshot cannot be written or backdated.
pub fn write_aged_snapshot(
    store: &SnapshotStore,
    family: MetricFamily,
    mut document: Document,
    age: Duration,
) {
    assert!(store.write(family, &mut document), "snapshot write failed");
    backdate(&store.path(family), age);
}

/// Push a file's modification time `age` into the past.
///
/// # Panics
///
/// Panics if the file cannot be opened or its mtime cannot be set.
pub fn backdate(path: &Path, age: Duration) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open file for backdating");
    let mtime = SystemTime::now()
        .checked_sub(age)
        .expect("Backdate age out of range");
    file.set_modified(mtime).expect("Failed to set mtime");
}

// =============================================================================
// Temporary Directory Helpers
// =============================================================================

/// A temporary directory that is automatically cleaned up when dropped.
///
/// # Examples
///
/// ```rust,ignore
/// use agdash::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.create_file("config.toml", "[cache]\nfresh_minutes = 5");
/// assert!(dir.path().join("config.toml").exists());
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with the given content, including parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    /// Full path to a file in the temporary directory.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }

    /// A snapshot store rooted in a `snapshots/` subdirectory.
    #[must_use]
    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.file_path("snapshots"))
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample config TOML content for testing.
#[must_use]
pub fn make_test_config_toml() -> String {
    r#"[general]
log_level = "info"

[server]
listen_addr = "127.0.0.1:0"
request_timeout_seconds = 30

[cache]
fresh_minutes = 2
warm_interval_seconds = 0

[cache.families.executive]
fresh_minutes = 10

[source]
base_url = "http://127.0.0.1:9"
project_key = "CB"
timeout_seconds = 5
"#
    .to_string()
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string parses as JSON and return the value.
#[macro_export]
macro_rules! assert_json_valid {
    ($json:expr) => {{
        let json = $json;
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(value) => value,
            Err(e) => panic!(
                "Expected valid JSON, but parsing failed: {}\n\nJSON string:\n{}",
                e, json
            ),
        }
    }};
}
