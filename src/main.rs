//! agdash - dashboard metrics API
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use agdash::cli::{Cli, Commands};
use agdash::core::logging;
use agdash::error::AgdashError;
use agdash::storage::config::ResolvedConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is resolved first so its log level can take part in logging setup.
    let resolved = ResolvedConfig::resolve(&cli.overrides());
    let file_level = resolved
        .as_ref()
        .ok()
        .and_then(|config| config.log_level.as_deref())
        .and_then(logging::LogLevel::parse);

    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::parse)
        .or_else(logging::LogLevel::from_env)
        .or(file_level)
        .unwrap_or_default()
        .with_verbose(cli.verbose);
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::LogFormat::from_env().unwrap_or_default()
    };
    let log_file = logging::log_file_from_env();
    logging::init(log_level, log_format, log_file.as_deref());

    let result = match resolved {
        Ok(config) => run(&cli, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

async fn run(cli: &Cli, config: &ResolvedConfig) -> agdash::Result<()> {
    let format = cli.effective_format();
    let pretty = cli.pretty;

    match &cli.command {
        Commands::Serve(_) => agdash::cli::serve::execute(config).await,
        Commands::Status(args) => agdash::cli::status::execute(args, config, format, pretty),
        Commands::Show(args) => agdash::cli::show::execute(args, config, pretty).await,
        Commands::Refresh(args) => {
            agdash::cli::refresh::execute(args, config, format, pretty).await
        }
    }
}

fn report(error: &AgdashError) -> ExitCode {
    tracing::debug!(category = ?error.category(), "Command failed");
    eprintln!("Error: {error}");
    ExitCode::from(error.exit_code() as u8)
}
