//! Webhook reconciliation for hookbridge
//!
//! This crate keeps the webhooks on a Git hosting server in line with what
//! the CI orchestrator wants to hear about:
//! - Event catalog for mirror-sync, ref-change and pull-request events
//! - Validated webhook requests with a derived callback URL
//! - Gateway and capability probe traits for the remote webhook API
//! - A reconciler that creates, updates and deletes webhooks with minimal churn
//!
//! # Features
//!
//! - **REST Gateway**: Paged webhook listing and capability discovery over HTTP
//! - **In-Memory Gateway**: Call-recording gateway for tests and dry runs
//!
//! # Example
//!
//! ```rust,ignore
//! use hookbridge_core::RepositoryRef;
//! use hookbridge_webhook::{RestWebhookGateway, WebhookReconciler, WebhookRequest};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(RestWebhookGateway::builder("https://git.example.com").build()?);
//! let reconciler = WebhookReconciler::new(gateway.clone(), gateway);
//!
//! let request = WebhookRequest::builder(RepositoryRef::new("PROJ", "service")?, "ci-main")
//!     .orchestrator_url("https://ci.example.com")
//!     .trigger_on_ref_change(true)
//!     .trigger_on_pull_request(true)
//!     .build()?;
//!
//! if let Some(webhook) = reconciler.reconcile(&request).await? {
//!     println!("webhook {} listens to {:?}", webhook.id, webhook.events);
//! }
//! ```

pub mod events;
pub mod request;
pub mod gateway;
pub mod reconcile;
pub mod memory;
pub mod rest;

pub use events::*;
pub use request::*;
pub use gateway::*;
pub use reconcile::*;
pub use memory::*;
pub use rest::*;

use thiserror::Error;

/// Webhook errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid webhook request: {0}")]
    InvalidRequest(String),

    /// The server cannot report which webhook events it supports
    #[error("Capability not reported by server: {0}")]
    MissingCapability(String),

    #[error("Webhook not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server answered with a body that cannot be used as is
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl WebhookError {
    /// Whether this is the distinguished "capability missing" signal
    pub fn is_missing_capability(&self) -> bool {
        matches!(self, WebhookError::MissingCapability(_))
    }
}

pub type Result<T> = std::result::Result<T, WebhookError>;
