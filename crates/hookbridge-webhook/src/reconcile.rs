//! Webhook reconciliation
//!
//! Drives the webhooks on a repository towards the state described by a
//! [`WebhookRequest`]. Every call starts from a fresh listing; nothing is
//! cached between calls. Two callers racing on the same repository may both
//! create a webhook; the next call removes the duplicate.

use crate::{
    events::{
        mirror_sync_events, pull_request_events, ref_and_pull_request_events, ref_change_events,
        EventId, EventSet,
    },
    gateway::{CapabilityProbe, RemoteWebhook, WebhookGateway},
    request::WebhookRequest,
    Result,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Owned webhooks grouped by the shape of their event subscriptions.
///
/// A webhook can sit in more than one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    /// Subscribes to the mirror-sync event
    pub mirror_sync: Vec<RemoteWebhook>,
    /// Subscribes to exactly the ref-change event
    pub ref_only: Vec<RemoteWebhook>,
    /// Subscribes to exactly the four pull request events
    pub pr_only: Vec<RemoteWebhook>,
    /// Subscribes to any ref-change or pull request event
    pub ref_or_pr: Vec<RemoteWebhook>,
}

impl Buckets {
    pub fn classify(owned: &[RemoteWebhook]) -> Self {
        let ref_only_events = ref_change_events();
        let pr_only_events = pull_request_events();
        let mut buckets = Buckets::default();

        for hook in owned {
            if hook.subscribes_to(EventId::MirrorSynchronized) {
                buckets.mirror_sync.push(hook.clone());
            }
            if hook.subscribes_exactly(&ref_only_events) {
                buckets.ref_only.push(hook.clone());
            }
            if hook.subscribes_exactly(&pr_only_events) {
                buckets.pr_only.push(hook.clone());
            }
            if hook.subscribes_to_any(EventId::is_ref_or_pull_request) {
                buckets.ref_or_pr.push(hook.clone());
            }
        }

        buckets
    }
}

/// Which kinds of events the resolved event set asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Wanted {
    mirror: bool,
    ref_change: bool,
    pull_request: bool,
}

impl Wanted {
    fn from_events(events: &EventSet) -> Self {
        Self {
            mirror: events.iter().any(EventId::is_mirror_sync),
            ref_change: events.iter().any(EventId::is_ref_change),
            pull_request: events.iter().any(EventId::is_pull_request),
        }
    }

    fn ref_or_pull_request(&self) -> bool {
        self.ref_change || self.pull_request
    }
}

/// How an existing ref-change / pull request subscription is reconciled.
///
/// | wanted         | narrow webhook present | plan              | target        |
/// |----------------|------------------------|-------------------|---------------|
/// | ref + pr       | any                    | `Combined`        | ref + pr      |
/// | ref            | ref-only               | `RefOnly`         | ref           |
/// | pr             | pr-only                | `PullRequestOnly` | pr            |
/// | anything else  |                        | `Broaden`         | ref + pr      |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefPrPlan {
    Combined,
    RefOnly,
    PullRequestOnly,
    Broaden,
}

impl RefPrPlan {
    pub fn decide(ref_change: bool, pull_request: bool, buckets: &Buckets) -> Self {
        let has_ref_only = !buckets.ref_only.is_empty();
        let has_pr_only = !buckets.pr_only.is_empty();

        match (ref_change, pull_request, has_ref_only, has_pr_only) {
            (true, true, _, _) => RefPrPlan::Combined,
            (true, false, true, _) => RefPrPlan::RefOnly,
            (false, true, _, true) => RefPrPlan::PullRequestOnly,
            _ => RefPrPlan::Broaden,
        }
    }

    pub fn target_events(&self) -> EventSet {
        match self {
            RefPrPlan::RefOnly => ref_change_events(),
            RefPrPlan::PullRequestOnly => pull_request_events(),
            RefPrPlan::Combined | RefPrPlan::Broaden => ref_and_pull_request_events(),
        }
    }

    pub fn bucket<'a>(&self, buckets: &'a Buckets) -> &'a [RemoteWebhook] {
        match self {
            RefPrPlan::RefOnly => &buckets.ref_only,
            RefPrPlan::PullRequestOnly => &buckets.pr_only,
            RefPrPlan::Combined | RefPrPlan::Broaden => &buckets.ref_or_pr,
        }
    }
}

/// Result of one reconciliation branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch was not requested
    Skipped,
    /// The branch ran but had nothing to reconcile
    Empty,
    Webhook(RemoteWebhook),
}

impl BranchOutcome {
    fn from_option(webhook: Option<RemoteWebhook>) -> Self {
        webhook.map_or(BranchOutcome::Empty, BranchOutcome::Webhook)
    }

    pub fn into_webhook(self) -> Option<RemoteWebhook> {
        match self {
            BranchOutcome::Webhook(hook) => Some(hook),
            BranchOutcome::Skipped | BranchOutcome::Empty => None,
        }
    }
}

/// Pick the webhook to report back to the caller.
///
/// The mirror webhook wins when it covers every desired event. Otherwise the
/// ref/pr outcome is used, unless that branch never ran, in which case the
/// mirror outcome is all there is.
pub fn combine_outcomes(
    mirror: BranchOutcome,
    ref_pr: BranchOutcome,
    desired: &EventSet,
) -> Option<RemoteWebhook> {
    match (mirror, ref_pr) {
        (BranchOutcome::Webhook(hook), _) if hook.subscribes_to_all(desired) => Some(hook),
        (mirror, BranchOutcome::Skipped) => {
            if let BranchOutcome::Webhook(ref hook) = mirror {
                warn!(
                    webhook_id = hook.id,
                    "Mirror webhook does not cover every desired event"
                );
            }
            mirror.into_webhook()
        }
        (_, ref_pr) => ref_pr.into_webhook(),
    }
}

/// Reconciles remote webhooks against a [`WebhookRequest`]
pub struct WebhookReconciler {
    gateway: Arc<dyn WebhookGateway>,
    probe: Arc<dyn CapabilityProbe>,
}

impl WebhookReconciler {
    pub fn new(gateway: Arc<dyn WebhookGateway>, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self { gateway, probe }
    }

    /// Bring the repository's webhooks in line with `request`.
    ///
    /// Returns `None` when the request resolves to no events at all; no
    /// gateway call is made in that case. Gateway errors are returned as is
    /// and mutations already made are kept.
    #[instrument(skip(self, request), fields(repository = %request.repository(), name = request.name()))]
    pub async fn reconcile(&self, request: &WebhookRequest) -> Result<Option<RemoteWebhook>> {
        let events = self.resolve_events(request).await?;
        if events.is_empty() {
            debug!("No webhook events wanted");
            return Ok(None);
        }

        self.apply(request, &events).await
    }

    /// Work out which events the request should subscribe to
    pub async fn resolve_events(&self, request: &WebhookRequest) -> Result<EventSet> {
        if request.is_mirror() {
            return self.resolve_mirror_events().await;
        }

        let mut events = EventSet::new();
        if request.trigger_on_ref_change() {
            events.extend(ref_change_events());
        }
        if request.trigger_on_pull_request() {
            events.extend(pull_request_events());
        }
        Ok(events)
    }

    async fn resolve_mirror_events(&self) -> Result<EventSet> {
        match self.probe.supported_events().await {
            Ok(supported) if supported.contains(&EventId::MirrorSynchronized) => {
                Ok(mirror_sync_events())
            }
            Ok(supported) if supported.contains(&EventId::RepoRefsChanged) => {
                debug!("Server does not support mirror sync events, using ref change");
                Ok(ref_change_events())
            }
            Ok(_) => Ok(EventSet::new()),
            Err(e) if e.is_missing_capability() => {
                warn!(error = %e, "Server cannot report webhook capabilities, assuming ref change support");
                Ok(ref_change_events())
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(
        &self,
        request: &WebhookRequest,
        events: &EventSet,
    ) -> Result<Option<RemoteWebhook>> {
        let repository = request.repository();
        let owned: Vec<RemoteWebhook> = self
            .gateway
            .list(repository, &EventId::ALL)
            .await?
            .into_iter()
            .filter(|hook| hook.is_owned_by(request))
            .collect();

        let buckets = Buckets::classify(&owned);
        let wanted = Wanted::from_events(events);

        debug!(
            owned = owned.len(),
            mirror_sync = buckets.mirror_sync.len(),
            ref_only = buckets.ref_only.len(),
            pr_only = buckets.pr_only.len(),
            ref_or_pr = buckets.ref_or_pr.len(),
            "Classified existing webhooks"
        );

        let must_create = owned.is_empty()
            || (wanted.mirror && buckets.mirror_sync.is_empty())
            || (wanted.ref_or_pull_request() && buckets.ref_or_pr.is_empty());

        if must_create {
            let created = self
                .gateway
                .create(repository, request.name(), events, request.callback_url())
                .await?;
            info!(
                webhook_id = created.id,
                events = ?created.events,
                "Created webhook"
            );
            return Ok(Some(created));
        }

        let mirror = if wanted.mirror {
            let hook = self
                .update_bucket(request, &buckets.mirror_sync, &mirror_sync_events())
                .await?;
            BranchOutcome::from_option(hook)
        } else {
            BranchOutcome::Skipped
        };

        let ref_pr = if wanted.ref_or_pull_request() {
            let plan = RefPrPlan::decide(wanted.ref_change, wanted.pull_request, &buckets);
            debug!(?plan, "Reconciling ref change and pull request webhooks");
            let hook = self
                .update_bucket(request, plan.bucket(&buckets), &plan.target_events())
                .await?;
            BranchOutcome::from_option(hook)
        } else {
            BranchOutcome::Skipped
        };

        Ok(combine_outcomes(mirror, ref_pr, events))
    }

    /// Keep one webhook of the bucket with `target` events and delete the rest
    async fn update_bucket(
        &self,
        request: &WebhookRequest,
        bucket: &[RemoteWebhook],
        target: &EventSet,
    ) -> Result<Option<RemoteWebhook>> {
        let Some(first) = bucket.first() else {
            return Ok(None);
        };
        let repository = request.repository();

        let (anchor_id, anchor) = match bucket
            .iter()
            .find(|hook| hook.matches(request.name(), request.callback_url(), target))
        {
            Some(existing) => {
                debug!(webhook_id = existing.id, "Webhook already up to date");
                (existing.id, existing.clone())
            }
            None => {
                let updated = self
                    .gateway
                    .update(
                        repository,
                        first.id,
                        request.name(),
                        target,
                        request.callback_url(),
                    )
                    .await?;
                info!(
                    webhook_id = first.id,
                    events = ?updated.events,
                    "Updated webhook"
                );
                (first.id, updated)
            }
        };

        for duplicate in bucket.iter().filter(|hook| hook.id != anchor_id) {
            self.gateway.delete(repository, duplicate.id).await?;
            info!(
                webhook_id = duplicate.id,
                name = %duplicate.name,
                url = %duplicate.url,
                "Deleted duplicate webhook"
            );
        }

        Ok(Some(anchor))
    }
}
