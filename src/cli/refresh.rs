//! The `refresh` command: recompute snapshots synchronously.

use std::time::Instant;

use serde::Serialize;

use crate::cli::args::{OutputFormat, RefreshArgs};
use crate::cli::{build_facade, render_json};
use crate::core::family::MetricFamily;
use crate::error::{AgdashError, ProducerError, Result};
use crate::storage::config::ResolvedConfig;

/// Outcome of refreshing one family.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub family: MetricFamily,
    pub ok: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    failure: Option<ProducerError>,
}

/// Refresh the selected families one after another.
///
/// # Errors
///
/// Returns the first family's failure after every family has been tried.
pub async fn execute(
    args: &RefreshArgs,
    config: &ResolvedConfig,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let families = MetricFamily::parse_selection(&args.family)?;
    let facade = build_facade(config)?;

    let mut reports = Vec::with_capacity(families.len());
    for family in families {
        let start = Instant::now();
        let result = facade.refresh_now(family).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        reports.push(match result {
            Ok(_) => RefreshReport {
                family,
                ok: true,
                duration_ms,
                error: None,
                failure: None,
            },
            Err(e) => RefreshReport {
                family,
                ok: false,
                duration_ms,
                error: Some(e.to_string()),
                failure: Some(e),
            },
        });
    }

    match format {
        OutputFormat::Json => println!("{}", render_json(&reports, pretty)?),
        OutputFormat::Human => {
            for report in &reports {
                match &report.error {
                    None => println!("{}: refreshed in {} ms", report.family, report.duration_ms),
                    Some(e) => println!("{}: failed ({e})", report.family),
                }
            }
        }
    }

    match reports.into_iter().find_map(|r| r.failure.map(|f| (r.family, f))) {
        Some((family, source)) => Err(AgdashError::Producer {
            family: family.to_string(),
            source,
        }),
        None => Ok(()),
    }
}
