//! HTTP client utilities.
//!
//! Provides the shared client used to reach the upstream metrics bridge.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Url};
use serde_json::Value;

use crate::error::{AgdashError, ProducerError};
use crate::storage::snapshot::Document;

/// Default timeout for upstream requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client, AgdashError> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("agdash/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AgdashError::Config(format!("failed to build HTTP client: {e}")))
}

/// Fetch a JSON object from a URL.
///
/// # Errors
///
/// Maps transport failures, non-success statuses, and bodies that are not
/// JSON objects onto [`ProducerError`].
pub async fn fetch_document(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    timeout: Duration,
) -> Result<Document, ProducerError> {
    let url = Url::parse_with_params(url, query)
        .map_err(|e| ProducerError::Other(format!("invalid upstream URL {url}: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ProducerError::timeout(timeout)
        } else {
            ProducerError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProducerError::Http {
            status: status.as_u16(),
        });
    }

    let value: Value = response.json().await.map_err(|e| {
        if e.is_timeout() {
            ProducerError::timeout(timeout)
        } else {
            ProducerError::InvalidDocument(e.to_string())
        }
    })?;

    match value {
        Value::Object(document) => Ok(document),
        other => Err(ProducerError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
