//! The `serve` command: HTTP API plus optional snapshot warmer.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use crate::cli::build_facade;
use crate::core::warmer::run_warmer;
use crate::error::Result;
use crate::server::{Server, ServerOptions};
use crate::storage::config::ResolvedConfig;

/// Run the server until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the facade cannot be built or the address cannot be bound.
pub async fn execute(config: &ResolvedConfig) -> Result<()> {
    let facade = Arc::new(build_facade(config)?);
    let options = ServerOptions {
        request_timeout: config.request_timeout,
    };
    let server = Server::bind(config.listen_addr, Arc::clone(&facade), options).await?;

    tracing::info!(
        addr = %server.local_addr()?,
        cache_dir = %config.cache_dir.display(),
        source = %config.source_url,
        project = %config.project_key,
        "Starting agdash"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ctrl+C handler for clean shutdown.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        let _ = shutdown_tx.send(true);
    });

    let warmer = config.warm_interval.map(|every| {
        tokio::spawn(run_warmer(
            Arc::clone(&facade),
            every,
            shutdown_rx.clone(),
        ))
    });

    server.run(shutdown_rx).await?;

    if let Some(handle) = warmer {
        let state = handle.await.context("snapshot warmer task failed")?;
        tracing::debug!(sweeps = state.sweeps, "Warmer joined");
    }

    Ok(())
}
