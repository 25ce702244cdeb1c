//! Common test utilities and fixtures for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: Facade wiring and polling helpers
//! - `log_capture`: Thread-local capture of tracing events
//! - `logger`: Structured test logging infrastructure

pub mod fixtures;
pub mod log_capture;
pub mod logger;
