//! Degraded documents.
//!
//! When no real metrics can be produced and there is no snapshot to fall
//! back on, the dashboard still gets a well-formed document: every metric
//! zeroed or empty, labelled with an honest `data_source`. Nothing here is
//! ever persisted.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use super::family::MetricFamily;
use crate::error::ProducerError;
use crate::storage::snapshot::Document;

/// `data_source` label for a failed refresh.
pub const DATA_SOURCE_ERROR: &str = "mcp_api_error";
/// `data_source` label when the caller gave up waiting.
pub const DATA_SOURCE_TIMEOUT: &str = "timeout";

/// Build the degraded document for a failed refresh.
#[must_use]
pub fn degraded_document(family: MetricFamily, error: &ProducerError) -> Document {
    let data_source = match error {
        ProducerError::Timeout { .. } => DATA_SOURCE_TIMEOUT,
        _ => DATA_SOURCE_ERROR,
    };
    let mut document = empty_metrics(family);
    document.insert("data_source".to_string(), json!(data_source));
    document.insert("error".to_string(), json!(error.to_string()));
    document.insert("error_kind".to_string(), json!(error.kind()));
    document.insert("fetched_at".to_string(), json!(now_rfc3339()));
    document
}

/// All-zero metrics shaped like the family's real documents.
fn empty_metrics(family: MetricFamily) -> Document {
    let value = match family {
        MetricFamily::Agile => json!({
            "velocity": 0,
            "bugs_prod": 0,
            "bugs_qa": 0,
            "unplanned": 0,
            "committed_vs_delivered": {"committed": 0, "delivered": 0},
            "quality_percentage": 0.0,
            "team_health": 0,
            "lead_time": 0.0,
            "total_issues": 0,
            "cycle_time_evolution": [],
        }),
        MetricFamily::Executive => json!({
            "evolution_percentage": 0,
            "total_items": 0,
            "completed_items": 0,
            "in_progress_items": 0,
            "not_planned_items": 0,
            "impediments": 0,
            "dependencies": 0,
            "not_started": 0,
            "monthly_data": [],
            "items_summary": [],
            "observations": "",
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
