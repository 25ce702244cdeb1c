//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::storage::config::ConfigOverrides;

/// Cache-first API for agile and executive dashboard metrics.
#[derive(Parser, Debug)]
#[command(name = "agdash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot directory
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    /// Config overrides carried by the global flags and the subcommand.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let listen_addr = match &self.command {
            Commands::Serve(args) => args.listen.clone(),
            _ => None,
        };
        ConfigOverrides {
            config_path: self.config.clone(),
            cache_dir: self.cache_dir.clone(),
            listen_addr,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dashboard metrics API
    Serve(ServeArgs),

    /// Show snapshot age, freshness, and refresh state
    Status(StatusArgs),

    /// Print a family's metrics, served cache-first
    Show(ShowArgs),

    /// Recompute snapshots now, waiting for the source
    Refresh(RefreshArgs),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on (e.g., 0.0.0.0:8000)
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Only show one family
    #[arg(long, value_name = "FAMILY")]
    pub family: Option<String>,
}

/// Arguments for the `show` command.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Family to show (agile, executive)
    #[arg(long, value_name = "FAMILY")]
    pub family: String,

    /// Bypass the snapshot and wait for fresh metrics
    #[arg(long)]
    pub refresh: bool,
}

/// Arguments for the `refresh` command.
#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// Family to refresh, or "all"
    #[arg(long, value_name = "FAMILY", default_value = "all")]
    pub family: String,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}
