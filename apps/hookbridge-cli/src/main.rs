//! hookbridge CLI
//!
//! Reconciles the webhooks a Git hosting server uses to notify a CI
//! orchestrator.

mod cli;
mod commands;
mod output;
mod telemetry;

use anyhow::{Context as _, Result};
use clap::Parser;
use colored::Colorize;
use hookbridge_core::AppConfig;
use std::process::ExitCode;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::commands::Context;
use crate::output::OutputFormat;
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if cli.verbose {
                for source in e.chain().skip(1) {
                    eprintln!("{}: {}", "Caused by".yellow(), source);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    init_telemetry(cli)?;

    let config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    debug!(?config, "Loaded configuration");

    let format: OutputFormat = cli.format.parse().map_err(anyhow::Error::msg)?;
    let ctx = Context::new(config, format);

    match &cli.command {
        Commands::Reconcile(args) => commands::reconcile::run(&ctx, args).await,
        Commands::List(args) => commands::list::run(&ctx, args).await,
        Commands::Capabilities => commands::capabilities::run(&ctx).await,
    }
}
