//! CLI command implementations

pub mod capabilities;
pub mod list;
pub mod reconcile;

use anyhow::{Context as _, Result};
use hookbridge_core::{AppConfig, RepositoryRef};
use hookbridge_webhook::RestWebhookGateway;

use crate::cli::RepositoryArgs;
use crate::output::OutputFormat;

/// State shared by every command
pub struct Context {
    pub config: AppConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config: AppConfig, format: OutputFormat) -> Self {
        Self { config, format }
    }

    /// REST gateway for the configured server
    pub fn gateway(&self) -> Result<RestWebhookGateway> {
        RestWebhookGateway::from_config(&self.config.server).with_context(|| {
            format!(
                "Failed to create client for {}",
                self.config.server.base_url
            )
        })
    }
}

impl RepositoryArgs {
    pub fn repository(&self) -> Result<RepositoryRef> {
        RepositoryRef::new(self.project.as_str(), self.repo.as_str())
            .context("Invalid repository")
    }
}
