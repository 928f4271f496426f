//! Command-line argument parsing

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hookbridge",
    about = "Keep Git hosting webhooks in line with your CI orchestrator",
    version,
    long_about = "Creates, updates and removes the webhooks a Git hosting server uses \
                  to notify a CI orchestrator about pushes, pull requests and mirror \
                  synchronisation."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "HOOKBRIDGE_CONFIG",
        default_value = "hookbridge.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        global = true
    )]
    pub log_level: String,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS", global = true)]
    pub json_logs: bool,

    /// Output format (text, json, yaml)
    #[arg(
        short,
        long,
        default_value = "text",
        value_parser = ["text", "json", "yaml"],
        global = true
    )]
    pub format: String,

    /// Print the error chain on failure
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Reconcile the webhooks of a repository
    Reconcile(ReconcileArgs),

    /// List the webhooks hookbridge manages on a repository
    List(RepositoryArgs),

    /// Show which webhook events the server supports
    Capabilities,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RepositoryArgs {
    /// Project key
    #[arg(short, long)]
    pub project: String,

    /// Repository slug
    #[arg(short, long)]
    pub repo: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub repository: RepositoryArgs,

    /// The repository is a mirror; subscribe to mirror synchronisation
    #[arg(long, conflicts_with_all = ["ref_change", "pull_request"])]
    pub mirror: bool,

    /// Trigger on branch and tag updates
    #[arg(long)]
    pub ref_change: bool,

    /// Trigger on pull request changes
    #[arg(long)]
    pub pull_request: bool,

    /// Webhook name, overriding the configured one
    #[arg(short, long)]
    pub name: Option<String>,

    /// Show the calls that would be made without changing anything
    #[arg(long)]
    pub dry_run: bool,
}
