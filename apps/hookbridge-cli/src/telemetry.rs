//! Logging initialization

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn init_telemetry(cli: &Cli) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Failed to create environment filter")?;

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(get_log_level(&cli.log_level) >= Level::DEBUG)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    Ok(())
}

/// Map a level name to a [`Level`], defaulting to `INFO`
pub fn get_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_level() {
        assert_eq!(get_log_level("trace"), Level::TRACE);
        assert_eq!(get_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(get_log_level("info"), Level::INFO);
        assert_eq!(get_log_level("warn"), Level::WARN);
        assert_eq!(get_log_level("error"), Level::ERROR);
        assert_eq!(get_log_level("loud"), Level::INFO);
    }
}
