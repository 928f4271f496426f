//! In-memory webhook gateway
//!
//! Stores webhooks per repository and records every call made against it.
//! Used by the test-suite and by dry runs, where a snapshot of the remote
//! state is reconciled without touching the server.

use crate::{
    events::{to_wire, EventId, EventSet},
    gateway::{CapabilityProbe, RemoteWebhook, WebhookGateway},
    Result, WebhookError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use hookbridge_core::RepositoryRef;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

/// A call received by [`InMemoryWebhookGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    SupportedEvents,
    List {
        repository: RepositoryRef,
    },
    Create {
        repository: RepositoryRef,
        name: String,
        events: EventSet,
        url: String,
    },
    Update {
        repository: RepositoryRef,
        id: i64,
        name: String,
        events: EventSet,
        url: String,
    },
    Delete {
        repository: RepositoryRef,
        id: i64,
    },
}

impl GatewayCall {
    /// Whether the call changes remote state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GatewayCall::Create { .. } | GatewayCall::Update { .. } | GatewayCall::Delete { .. }
        )
    }
}

impl std::fmt::Display for GatewayCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |events: &EventSet| {
            events
                .iter()
                .map(EventId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };

        match self {
            GatewayCall::SupportedEvents => write!(f, "probe supported events"),
            GatewayCall::List { repository } => write!(f, "list webhooks on {}", repository),
            GatewayCall::Create {
                repository,
                name,
                events,
                url,
            } => write!(
                f,
                "create webhook '{}' on {} -> {} [{}]",
                name,
                repository,
                url,
                join(events)
            ),
            GatewayCall::Update {
                repository,
                id,
                name,
                events,
                url,
            } => write!(
                f,
                "update webhook {} '{}' on {} -> {} [{}]",
                id,
                name,
                repository,
                url,
                join(events)
            ),
            GatewayCall::Delete { repository, id } => {
                write!(f, "delete webhook {} on {}", id, repository)
            }
        }
    }
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    SupportedEvents,
    List,
    Create,
    Update,
    Delete,
}

/// What the gateway answers when probed for capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
enum Capabilities {
    Supported(EventSet),
    Missing,
}

/// Call-recording gateway backed by a DashMap
pub struct InMemoryWebhookGateway {
    webhooks: DashMap<RepositoryRef, Vec<RemoteWebhook>>,
    next_id: AtomicI64,
    capabilities: RwLock<Capabilities>,
    failing: RwLock<HashSet<GatewayOperation>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl InMemoryWebhookGateway {
    /// Gateway that supports every managed event
    pub fn new() -> Self {
        Self {
            webhooks: DashMap::new(),
            next_id: AtomicI64::new(1),
            capabilities: RwLock::new(Capabilities::Supported(EventId::ALL.into_iter().collect())),
            failing: RwLock::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_supported_events(&self, events: EventSet) {
        *self.capabilities.write() = Capabilities::Supported(events);
    }

    /// Make the probe answer like a server that cannot report capabilities
    pub fn set_capability_missing(&self) {
        *self.capabilities.write() = Capabilities::Missing;
    }

    /// Make every later call of `operation` fail with a server error
    pub fn fail_on(&self, operation: GatewayOperation) {
        self.failing.write().insert(operation);
    }

    /// Add a webhook with a fresh id, bypassing the call journal
    pub fn insert(
        &self,
        repository: &RepositoryRef,
        name: &str,
        events: &[&str],
        url: &str,
        active: bool,
    ) -> RemoteWebhook {
        let webhook = RemoteWebhook {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            url: url.to_string(),
            active,
        };
        self.webhooks
            .entry(repository.clone())
            .or_default()
            .push(webhook.clone());
        webhook
    }

    /// Seed an existing webhook, keeping its id
    pub fn insert_webhook(&self, repository: &RepositoryRef, webhook: RemoteWebhook) {
        self.next_id.fetch_max(webhook.id + 1, Ordering::SeqCst);
        self.webhooks
            .entry(repository.clone())
            .or_default()
            .push(webhook);
    }

    /// Current webhooks of a repository, in insertion order
    pub fn webhooks(&self, repository: &RepositoryRef) -> Vec<RemoteWebhook> {
        self.webhooks
            .get(repository)
            .map(|hooks| hooks.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, operation: GatewayOperation, call: GatewayCall) -> Result<()> {
        self.calls.lock().push(call);
        if self.failing.read().contains(&operation) {
            return Err(WebhookError::Api {
                status: 500,
                message: format!("{:?} failed", operation),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryWebhookGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookGateway for InMemoryWebhookGateway {
    async fn list(&self, repository: &RepositoryRef, events: &[EventId]) -> Result<Vec<RemoteWebhook>> {
        self.record(
            GatewayOperation::List,
            GatewayCall::List {
                repository: repository.clone(),
            },
        )?;

        Ok(self
            .webhooks(repository)
            .into_iter()
            .filter(|hook| events.iter().any(|event| hook.subscribes_to(*event)))
            .collect())
    }

    async fn create(
        &self,
        repository: &RepositoryRef,
        name: &str,
        events: &EventSet,
        url: &str,
    ) -> Result<RemoteWebhook> {
        self.record(
            GatewayOperation::Create,
            GatewayCall::Create {
                repository: repository.clone(),
                name: name.to_string(),
                events: events.clone(),
                url: url.to_string(),
            },
        )?;

        let webhook = RemoteWebhook {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            events: to_wire(events),
            url: url.to_string(),
            active: true,
        };
        self.webhooks
            .entry(repository.clone())
            .or_default()
            .push(webhook.clone());
        Ok(webhook)
    }

    async fn update(
        &self,
        repository: &RepositoryRef,
        id: i64,
        name: &str,
        events: &EventSet,
        url: &str,
    ) -> Result<RemoteWebhook> {
        self.record(
            GatewayOperation::Update,
            GatewayCall::Update {
                repository: repository.clone(),
                id,
                name: name.to_string(),
                events: events.clone(),
                url: url.to_string(),
            },
        )?;

        let mut hooks = self
            .webhooks
            .get_mut(repository)
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))?;
        let hook = hooks
            .iter_mut()
            .find(|hook| hook.id == id)
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))?;

        hook.name = name.to_string();
        hook.events = to_wire(events);
        hook.url = url.to_string();
        hook.active = true;
        Ok(hook.clone())
    }

    async fn delete(&self, repository: &RepositoryRef, id: i64) -> Result<()> {
        self.record(
            GatewayOperation::Delete,
            GatewayCall::Delete {
                repository: repository.clone(),
                id,
            },
        )?;

        let mut hooks = self
            .webhooks
            .get_mut(repository)
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))?;
        let before = hooks.len();
        hooks.retain(|hook| hook.id != id);
        if hooks.len() == before {
            return Err(WebhookError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CapabilityProbe for InMemoryWebhookGateway {
    async fn supported_events(&self) -> Result<EventSet> {
        self.record(GatewayOperation::SupportedEvents, GatewayCall::SupportedEvents)?;

        match &*self.capabilities.read() {
            Capabilities::Supported(events) => Ok(events.clone()),
            Capabilities::Missing => Err(WebhookError::MissingCapability(
                "webhooks".to_string(),
            )),
        }
    }
}
