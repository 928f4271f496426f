//! Remote webhook API seams
//!
//! The reconciler never talks HTTP itself. It goes through a
//! [`WebhookGateway`] for webhook CRUD and a [`CapabilityProbe`] to learn
//! which events the server supports.

use crate::{
    events::{to_wire, EventId, EventSet},
    request::WebhookRequest,
    Result,
};
use async_trait::async_trait;
use hookbridge_core::RepositoryRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A webhook as stored on the remote server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWebhook {
    pub id: i64,
    pub name: String,
    /// Raw event identifiers, including ones this crate does not manage
    #[serde(default)]
    pub events: BTreeSet<String>,
    pub url: String,
    #[serde(default)]
    pub active: bool,
}

impl RemoteWebhook {
    /// Whether the webhook listens to `event`
    pub fn subscribes_to(&self, event: EventId) -> bool {
        self.events.contains(event.as_str())
    }

    /// Whether the webhook listens to at least one event matching `predicate`
    pub fn subscribes_to_any(&self, predicate: impl Fn(&EventId) -> bool) -> bool {
        EventId::ALL
            .iter()
            .filter(|&event| predicate(event))
            .any(|event| self.subscribes_to(*event))
    }

    /// Whether the webhook listens to every event in `events`
    pub fn subscribes_to_all(&self, events: &EventSet) -> bool {
        events.iter().all(|event| self.subscribes_to(*event))
    }

    /// Whether the webhook listens to exactly `events` and nothing else
    pub fn subscribes_exactly(&self, events: &EventSet) -> bool {
        self.events == to_wire(events)
    }

    /// Ownership heuristic: the name or the callback URL identifies us
    pub fn is_owned_by(&self, request: &WebhookRequest) -> bool {
        self.name == request.name() || self.url == request.callback_url()
    }

    /// Whether the webhook already has the exact target shape and is active
    pub fn matches(&self, name: &str, url: &str, events: &EventSet) -> bool {
        self.name == name && self.url == url && self.active && self.subscribes_exactly(events)
    }
}

/// Webhook operations against the hosting server
#[async_trait]
pub trait WebhookGateway: Send + Sync {
    /// List webhooks on a repository that subscribe to any of `events`
    async fn list(&self, repository: &RepositoryRef, events: &[EventId]) -> Result<Vec<RemoteWebhook>>;

    /// Create an active webhook
    async fn create(
        &self,
        repository: &RepositoryRef,
        name: &str,
        events: &EventSet,
        url: &str,
    ) -> Result<RemoteWebhook>;

    /// Replace name, events and url of an existing webhook and activate it
    async fn update(
        &self,
        repository: &RepositoryRef,
        id: i64,
        name: &str,
        events: &EventSet,
        url: &str,
    ) -> Result<RemoteWebhook>;

    /// Delete a webhook
    async fn delete(&self, repository: &RepositoryRef, id: i64) -> Result<()>;
}

/// Reports which webhook events the server supports
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// Supported events.
    ///
    /// Returns [`WebhookError::MissingCapability`](crate::WebhookError::MissingCapability)
    /// when the server is too old to report webhook capabilities at all.
    async fn supported_events(&self) -> Result<EventSet>;
}
