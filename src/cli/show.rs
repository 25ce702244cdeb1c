//! The `show` command: print one family's metrics document.

use crate::cli::args::ShowArgs;
use crate::cli::{build_facade, render_json};
use crate::core::facade::Served;
use crate::core::family::MetricFamily;
use crate::error::{AgdashError, Result};
use crate::storage::config::ResolvedConfig;

/// Serve a family cache-first and print the document as JSON.
///
/// A stored snapshot is printed as-is, however old. No background refresh
/// is started: the process exits right after printing and would only
/// abandon it. `--refresh` (or `agdash refresh`) recomputes instead.
///
/// # Errors
///
/// Prints the degraded document and returns [`AgdashError::Producer`] when
/// nothing could be served.
pub async fn execute(args: &ShowArgs, config: &ResolvedConfig, pretty: bool) -> Result<()> {
    let family = MetricFamily::from_cli_name(&args.family)?;
    let facade = build_facade(config)?;

    let served = facade.get_cached_or_compute(family, args.refresh).await;
    tracing::debug!(%family, cache = served.cache_label(), "Metrics served");

    let failure = match &served {
        Served::Failed(error) => Some(error.clone()),
        Served::Cached(_) | Served::Computed(_) => None,
    };
    println!("{}", render_json(&served.into_document(family), pretty)?);

    match failure {
        Some(source) => Err(AgdashError::Producer {
            family: family.to_string(),
            source,
        }),
        None => Ok(()),
    }
}
