//! Metrics sources.
//!
//! The cache never computes metrics itself. It asks a [`MetricsSource`] for
//! a fresh document whenever a snapshot has to be (re)built.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;

use super::family::MetricFamily;
use super::http::{build_client, fetch_document};
use crate::error::{ProducerError, Result};
use crate::storage::snapshot::Document;

/// Something that can produce a metrics document for a family.
///
/// Calls may take tens of seconds and must be safe to repeat.
pub trait MetricsSource: Send + Sync {
    /// Produce a fresh document for `family`.
    fn produce(&self, family: MetricFamily) -> BoxFuture<'_, std::result::Result<Document, ProducerError>>;

    /// Short label for logs and status output.
    fn name(&self) -> &str {
        "metrics-source"
    }
}

/// Fetches ready-made metrics documents from an upstream HTTP bridge.
///
/// The bridge exposes one endpoint per family
/// (`<base>/agile-metrics`, `<base>/executive-metrics`) and takes the
/// issue-tracker project key as a query parameter.
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    client: Client,
    base_url: String,
    project_key: String,
    timeout: Duration,
}

impl HttpMetricsSource {
    /// Create a source pointed at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: &str, project_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_key: project_key.to_string(),
            timeout,
        })
    }

    /// Upstream URL for a family.
    #[must_use]
    pub fn url_for(&self, family: MetricFamily) -> String {
        format!("{}/{}", self.base_url, family.endpoint())
    }
}

impl MetricsSource for HttpMetricsSource {
    fn produce(&self, family: MetricFamily) -> BoxFuture<'_, std::result::Result<Document, ProducerError>> {
        Box::pin(async move {
            let url = self.url_for(family);
            tracing::debug!(%family, %url, "Fetching metrics from upstream");
            fetch_document(
                &self.client,
                &url,
                &[("project_key", self.project_key.as_str())],
                self.timeout,
            )
            .await
        })
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}
