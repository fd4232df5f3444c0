//! score-pipeline entry point

use clap::Parser;
use colored::*;
use score_pipeline::cli::{cmd_inspect, cmd_schema, cmd_train, Cli, Commands};
use score_pipeline::error::PipelineError;
use score_pipeline::telemetry;
use std::process::ExitCode;

/// Exit status when training finished but no model met the threshold
const EXIT_REJECTED: u8 = 2;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _log = telemetry::init(cli.log.as_deref());

    match cli.command {
        Commands::Train { train, test, config, artifacts_dir, threshold, seed } => {
            match cmd_train(&train, &test, config.as_deref(), artifacts_dir.as_deref(), threshold, seed) {
                Ok(_) => {}
                Err(err) if is_rejection(&err) => {
                    eprintln!("  {} {}", "rejected:".yellow().bold(), err);
                    return Ok(ExitCode::from(EXIT_REJECTED));
                }
                Err(err) => return Err(err),
            }
        }
        Commands::Inspect { artifact } => cmd_inspect(&artifact)?,
        Commands::Schema { config } => cmd_schema(config.as_deref())?,
    }

    Ok(ExitCode::SUCCESS)
}

fn is_rejection(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PipelineError>()
        .is_some_and(PipelineError::is_rejection)
}
