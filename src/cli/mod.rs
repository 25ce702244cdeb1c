//! CLI argument parsing and command dispatch.

pub mod args;
pub mod refresh;
pub mod serve;
pub mod show;
pub mod status;

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

pub use args::{Cli, Commands, OutputFormat};

use crate::core::facade::CacheFacade;
use crate::core::source::HttpMetricsSource;
use crate::error::Result;
use crate::storage::config::ResolvedConfig;
use crate::storage::snapshot::SnapshotStore;

/// Wire a facade over the configured snapshot directory and upstream bridge.
///
/// # Errors
///
/// Returns an error if the snapshot directory cannot be created or the
/// HTTP client cannot be built.
pub fn build_facade(config: &ResolvedConfig) -> Result<CacheFacade> {
    // Fail up front; a store that cannot write would only warn per refresh.
    std::fs::create_dir_all(&config.cache_dir).with_context(|| {
        format!(
            "cannot create snapshot directory {}",
            config.cache_dir.display()
        )
    })?;

    let store = Arc::new(SnapshotStore::new(config.cache_dir.clone()));
    let source = HttpMetricsSource::new(
        &config.source_url,
        &config.project_key,
        config.source_timeout,
    )?;
    tracing::debug!(
        cache_dir = %config.cache_dir.display(),
        source = %config.source_url,
        "Cache facade ready"
    );
    Ok(CacheFacade::new(
        store,
        config.freshness,
        Arc::new(source),
    ))
}

/// Render a value as JSON.
pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}
