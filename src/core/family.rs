//! Metric families.
//!
//! A family is a named category of dashboard metrics with its own snapshot
//! and its own refresh state. The set is fixed at compile time.

use serde::{Deserialize, Serialize};

use crate::error::{AgdashError, Result};

/// Supported metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFamily {
    /// Team-level agile metrics (velocity, cycle time, effort burn-down).
    Agile,
    /// Executive KPIs (evolution percentage, delivery summary).
    Executive,
}

impl MetricFamily {
    /// All families in display order.
    pub const ALL: &'static [Self] = &[Self::Agile, Self::Executive];

    /// Number of families; sizes per-family state tables.
    pub const COUNT: usize = Self::ALL.len();

    /// CLI and wire name for this family.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::Agile => "agile",
            Self::Executive => "executive",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Agile => "Agile metrics",
            Self::Executive => "Executive metrics",
        }
    }

    /// Dense index into per-family tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Agile => 0,
            Self::Executive => 1,
        }
    }

    /// File name of this family's snapshot inside the cache directory.
    #[must_use]
    pub const fn snapshot_file_name(self) -> &'static str {
        match self {
            Self::Agile => "agile_metrics.json",
            Self::Executive => "executive_metrics.json",
        }
    }

    /// Path segment used by the HTTP API and the upstream metrics bridge.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Agile => "agile-metrics",
            Self::Executive => "executive-metrics",
        }
    }

    /// Parse from CLI argument (case-insensitive).
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|f| f.cli_name() == lower)
            .copied()
            .ok_or_else(|| AgdashError::InvalidFamily(name.to_string()))
    }

    /// Parse a selection argument: a family name or "all".
    pub fn parse_selection(arg: &str) -> Result<Vec<Self>> {
        if arg.trim().eq_ignore_ascii_case("all") {
            Ok(Self::ALL.to_vec())
        } else {
            Ok(vec![Self::from_cli_name(arg)?])
        }
    }
}

impl std::fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl std::str::FromStr for MetricFamily {
    type Err = AgdashError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cli_name(s)
    }
}
