//! Durable snapshot storage for metric families.
//!
//! One JSON document per family lives under the cache directory. Serving
//! reads are on the request path, so they stay synchronous and cheap.
//!
//! # Features
//! - Atomic writes using a unique temp file + rename (readers never see a
//!   partial document, concurrent writers never share a temp file)
//! - Metadata stamping (`cached_at`, `cache_version`) at write time only
//! - Graceful degradation: missing or corrupt files read as absent, failed
//!   writes return `false`

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::family::MetricFamily;
use crate::error::Result;

/// A metrics document: a JSON object.
pub type Document = Map<String, Value>;

/// Schema marker stamped into every stored snapshot.
pub const CACHE_VERSION: u64 = 1;

/// Field holding the write timestamp.
pub const CACHED_AT_FIELD: &str = "cached_at";
/// Field holding the schema marker.
pub const CACHE_VERSION_FIELD: &str = "cache_version";
/// Transient marker added to documents served from the store.
pub const SERVED_FROM_CACHE_FIELD: &str = "_served_from_cache";
/// Transient timestamp of when a cached document was served.
pub const SERVED_AT_FIELD: &str = "_served_at";

/// Fields that only exist on the way out and are never persisted.
const TRANSIENT_FIELDS: &[&str] = &[SERVED_FROM_CACHE_FIELD, SERVED_AT_FIELD];

/// Distinguishes temp files of concurrent writers inside one process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Performance counters for snapshot store operations.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Number of successful reads.
    pub reads: AtomicU64,
    /// Number of successful writes.
    pub writes: AtomicU64,
    /// Number of writes that failed.
    pub failed_writes: AtomicU64,
    /// Total read time in microseconds.
    pub read_time_us: AtomicU64,
    /// Total write time in microseconds.
    pub write_time_us: AtomicU64,
}

/// Point-in-time copy of [`StoreMetrics`] for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub failed_writes: u64,
    pub avg_read_time_us: u64,
    pub avg_write_time_us: u64,
}

impl StoreMetrics {
    /// Create new metrics tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            read_time_us: AtomicU64::new(0),
            write_time_us: AtomicU64::new(0),
        }
    }

    /// Record a read operation.
    pub fn record_read(&self, duration: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.read_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a write operation.
    pub fn record_write(&self, duration: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.write_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a failed write.
    pub fn record_failed_write(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average read time in microseconds.
    #[must_use]
    pub fn avg_read_time_us(&self) -> u64 {
        let reads = self.reads.load(Ordering::Relaxed);
        if reads == 0 {
            return 0;
        }
        self.read_time_us.load(Ordering::Relaxed) / reads
    }

    /// Get average write time in microseconds.
    #[must_use]
    pub fn avg_write_time_us(&self) -> u64 {
        let writes = self.writes.load(Ordering::Relaxed);
        if writes == 0 {
            return 0;
        }
        self.write_time_us.load(Ordering::Relaxed) / writes
    }

    /// Copy the counters out.
    #[must_use]
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            avg_read_time_us: self.avg_read_time_us(),
            avg_write_time_us: self.avg_write_time_us(),
        }
    }
}

/// File-backed store holding the latest snapshot of each metric family.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    metrics: StoreMetrics,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to create snapshot dir");
        }
        Self {
            dir,
            metrics: StoreMetrics::new(),
        }
    }

    /// Directory holding the snapshot files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable path of a family's snapshot file.
    #[must_use]
    pub fn path(&self, family: MetricFamily) -> PathBuf {
        self.dir.join(family.snapshot_file_name())
    }

    /// Store performance counters.
    #[must_use]
    pub const fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// Read the snapshot for a family.
    ///
    /// Missing files, unreadable files, malformed JSON, and JSON that is not
    /// an object all read as `None`.
    #[must_use]
    pub fn read(&self, family: MetricFamily) -> Option<Document> {
        let start = Instant::now();
        let path = self.path(family);

        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(%family, path = %path.display(), error = %e, "Failed to read snapshot");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(document)) => {
                self.metrics.record_read(start.elapsed());
                Some(document)
            }
            Ok(_) => {
                tracing::warn!(%family, path = %path.display(), "Snapshot is not a JSON object");
                None
            }
            Err(e) => {
                tracing::warn!(%family, path = %path.display(), error = %e, "Malformed snapshot");
                None
            }
        }
    }

    /// Replace the snapshot for a family.
    ///
    /// The stored copy carries `cached_at` and `cache_version` and none of
    /// the transient serving markers. On success `document` is replaced by
    /// exactly what was stored. Returns `false` on I/O failure and leaves
    /// `document` untouched, so it never claims a write that did not happen.
    pub fn write(&self, family: MetricFamily, document: &mut Document) -> bool {
        let start = Instant::now();
        let mut stamped = document.clone();
        stamp(&mut stamped);

        match self.write_document(family, &stamped) {
            Ok(()) => {
                *document = stamped;
                self.metrics.record_write(start.elapsed());
                tracing::debug!(%family, "Snapshot updated");
                true
            }
            Err(e) => {
                self.metrics.record_failed_write();
                tracing::warn!(%family, error = %e, "Failed to write snapshot");
                false
            }
        }
    }

    fn write_document(&self, family: MetricFamily, document: &Document) -> Result<()> {
        let path = self.path(family);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_vec_pretty(document)?;
        write_atomic(&path, &content)?;
        Ok(())
    }

    /// Modification time of a family's snapshot file.
    #[must_use]
    pub fn last_modified(&self, family: MetricFamily) -> Option<SystemTime> {
        self.path(family)
            .metadata()
            .and_then(|m| m.modified())
            .ok()
    }

    /// Whether a snapshot file exists for the family.
    #[must_use]
    pub fn exists(&self, family: MetricFamily) -> bool {
        self.path(family).is_file()
    }

    /// Remove a family's snapshot, if present.
    pub fn clear(&self, family: MetricFamily) -> Result<()> {
        match std::fs::remove_file(self.path(family)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Add write-time metadata and strip transient serving markers.
fn stamp(document: &mut Document) {
    for field in TRANSIENT_FIELDS {
        document.remove(*field);
    }
    document.insert(
        CACHED_AT_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    document.insert(CACHE_VERSION_FIELD.to_string(), Value::from(CACHE_VERSION));
}

/// Write bytes atomically using temp file + rename.
///
/// The temp file lives in the target directory (rename must not cross
/// filesystems) and carries the pid plus a per-process sequence number.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot"),
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    {
        let mut file = std::fs::File::create(temp_path)?;
        file.write_all(content)?;
        file.sync_all()?; // Ensure data is flushed to disk
    }
    std::fs::rename(temp_path, path)
}
