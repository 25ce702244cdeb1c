//! Utility functions.

pub mod time;

pub use time::{format_age, format_span};
