//! Test logging infrastructure for structured test output.
#![allow(dead_code)]
//!
//! `TestLogger` writes one line per event to stderr, tagged with the test
//! name, the current phase, and elapsed time. Output is shown by
//! `cargo test -- --nocapture`.
//!
//! # Environment Variables
//!
//! - `TEST_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `TEST_LOG_JSON` - "1" or "true" for JSON lines

use std::env;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use serde::Serialize;

use super::log_capture::TestLogCapture;

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

struct Settings {
    level: LogLevel,
    json: bool,
}

fn settings() -> &'static Settings {
    static SETTINGS: OnceLock<Settings> = OnceLock::new();
    SETTINGS.get_or_init(|| Settings {
        level: env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(LogLevel::Info),
        json: env::var("TEST_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
    })
}

#[derive(Serialize)]
struct LogLine<'a> {
    test: &'a str,
    phase: &'a str,
    level: LogLevel,
    elapsed_ms: u64,
    message: &'a str,
}

/// Per-test structured logger.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
    current_phase: Mutex<String>,
}

impl TestLogger {
    /// Create a logger for `test_name` and log the start.
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
            current_phase: Mutex::new("init".to_string()),
        };
        logger.log(LogLevel::Info, "Test starting");
        logger
    }

    /// Create a logger plus a capture of tracing events for assertions.
    pub fn with_capture(test_name: &str) -> (Self, TestLogCapture) {
        let capture = TestLogCapture::start();
        (Self::new(test_name), capture)
    }

    /// Set the current phase ("setup", "execute", "verify").
    pub fn phase(&self, phase: &str) {
        if let Ok(mut current) = self.current_phase.lock() {
            *current = phase.to_string();
        }
        self.log(LogLevel::Debug, &format!("Phase: {phase}"));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Log an HTTP request (for HTTP tests).
    pub fn http_request(&self, method: &str, url: &str) {
        self.debug(&format!("HTTP {method} {url}"));
    }

    /// Mark the test as passed.
    pub fn finish_ok(&self) {
        let msg = format!("Test passed (duration: {}ms)", self.elapsed_ms());
        self.log(LogLevel::Info, &msg);
    }

    /// Milliseconds since the logger was created.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn log(&self, level: LogLevel, message: &str) {
        let settings = settings();
        if level < settings.level {
            return;
        }
        let phase = self
            .current_phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();

        if settings.json {
            let line = LogLine {
                test: &self.test_name,
                phase: &phase,
                level,
                elapsed_ms: self.elapsed_ms(),
                message,
            };
            if let Ok(json) = serde_json::to_string(&line) {
                eprintln!("{json}");
            }
        } else {
            eprintln!(
                "[{:>6}ms] {:<5?} {} ({}): {}",
                self.elapsed_ms(),
                level,
                self.test_name,
                phase,
                message
            );
        }
    }
}
