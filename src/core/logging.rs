//! Log output for the server and the one-shot commands.
//!
//! Events go to stderr, or to `AGDASH_LOG_FILE`, as text lines or as one
//! JSON object per line. Request handling and refreshes run inside
//! `request` and `refresh` spans, so every event emitted while serving
//! carries the route or the family it belongs to.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "AGDASH_LOG";
pub const LOG_FORMAT_ENV: &str = "AGDASH_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "AGDASH_LOG_FILE";

/// Verbosity, ordered quietest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse a level name. `critical` has no tracing counterpart and maps to
    /// `error`; `verbose` maps to `debug`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" | "critical" | "crit" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" | "verbose" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    /// Level from `AGDASH_LOG`, if set to something recognizable.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        env_value(LOG_LEVEL_ENV).and_then(|value| Self::parse(&value))
    }

    /// Raise to at least `debug` when `verbose` is set.
    #[must_use]
    pub fn with_verbose(self, verbose: bool) -> Self {
        if verbose { self.max(Self::Debug) } else { self }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Shape of each log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// `2026-10-16T09:12:03Z  INFO request{method=GET path=/api/agile-metrics}: ...`
    #[default]
    Text,
    /// One flat JSON object per event, with the enclosing span's fields.
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "human" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Format from `AGDASH_LOG_FORMAT`, if set to something recognizable.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        env_value(LOG_FORMAT_ENV).and_then(|value| Self::parse(&value))
    }
}

/// Log file path from `AGDASH_LOG_FILE`.
#[must_use]
pub fn log_file_from_env() -> Option<PathBuf> {
    env_value(LOG_FILE_ENV).map(PathBuf::from)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Directives used when `RUST_LOG` is unset: this crate at `level`,
/// dependencies (hyper, reqwest) only when they warn.
#[must_use]
pub fn default_directives(level: LogLevel) -> String {
    format!("warn,agdash={}", level.as_str())
}

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the default directives when set. A log file that
/// cannot be opened falls back to stderr with a warning. Returns `false`
/// if a subscriber was already installed.
pub fn init(level: LogLevel, format: LogFormat, file: Option<&Path>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (opened, open_error) = match file.map(open_append) {
        Some(Ok(handle)) => (Some(handle), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let ansi = opened.is_none();
    let writer = match opened {
        Some(handle) => BoxMakeWriter::new(handle),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .try_init()
            .is_ok(),
    };

    if let (true, Some(path), Some(e)) = (installed, file, open_error) {
        tracing::warn!(path = %path.display(), error = %e, "Cannot open log file, logging to stderr");
    }
    installed
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
