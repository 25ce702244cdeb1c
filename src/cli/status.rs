//! The `status` command.

use std::fmt::Write as _;
use std::time::Duration;

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::{build_facade, render_json};
use crate::core::facade::{CacheStatus, FamilyStatus};
use crate::core::family::MetricFamily;
use crate::error::Result;
use crate::storage::config::ResolvedConfig;
use crate::util::time::{format_age, format_span};

/// Print cache state for one or all families.
///
/// # Errors
///
/// Returns an error for an unknown family or if output cannot be rendered.
pub fn execute(
    args: &StatusArgs,
    config: &ResolvedConfig,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let facade = build_facade(config)?;

    let output = match &args.family {
        Some(name) => {
            let status = facade.status(MetricFamily::from_cli_name(name)?);
            match format {
                OutputFormat::Json => render_json(&status, pretty)?,
                OutputFormat::Human => render_family_line(&status),
            }
        }
        None => {
            let status = facade.status_all();
            match format {
                OutputFormat::Json => render_json(&status, pretty)?,
                OutputFormat::Human => render_human(&status),
            }
        }
    };

    println!("{output}");
    Ok(())
}

/// Render the whole cache as a short table.
#[must_use]
pub fn render_human(status: &CacheStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Snapshots: {}", status.cache_dir.display());
    let _ = writeln!(out, "Source:    {}", status.source);
    for family in &status.families {
        let _ = writeln!(out, "  {}", render_family_line(family));
    }
    let _ = write!(
        out,
        "Refreshes: {} started, {} completed, {} failed, {} skipped",
        status.refresh.started, status.refresh.completed, status.refresh.failed, status.refresh.skipped
    );
    out
}

fn render_family_line(status: &FamilyStatus) -> String {
    let state = if !status.exists {
        "missing"
    } else if status.fresh {
        "fresh"
    } else {
        "stale"
    };
    let age = status
        .age_seconds
        .map(|secs| format!("updated {}", format_age(Duration::from_secs_f64(secs))))
        .unwrap_or_default();
    let window = format_span(Duration::from_secs(status.fresh_window_seconds));
    let refresh = if status.in_flight { "refreshing" } else { "idle" };

    format!(
        "{:<10} {:<8} {:<20} window {:<6} {refresh}",
        status.family.cli_name(),
        state,
        age,
        window
    )
}
