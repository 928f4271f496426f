//! Reconcile command

use anyhow::{Context as _, Result};
use hookbridge_webhook::{
    CapabilityProbe, EventId, InMemoryWebhookGateway, RemoteWebhook, WebhookGateway,
    WebhookReconciler, WebhookRequest,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::Context;
use crate::cli::ReconcileArgs;
use crate::output::{self, format_structured};

/// Shown when the request resolves to no events, either because none were
/// asked for or because the server supports none of the mirror candidates
const NO_EVENTS: &str =
    "No webhook events to subscribe to (none requested, or none supported by the server); nothing to do";

/// What a reconcile run did, or would do on a dry run
#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub repository: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_calls: Vec<String>,
    pub webhook: Option<RemoteWebhook>,
}

pub async fn run(ctx: &Context, args: &ReconcileArgs) -> Result<()> {
    let request = build_request(ctx, args)?;
    let gateway = Arc::new(ctx.gateway()?);

    let report = if args.dry_run {
        plan(gateway.as_ref(), &request).await?
    } else {
        let reconciler = WebhookReconciler::new(gateway.clone(), gateway);
        let webhook = reconciler
            .reconcile(&request)
            .await
            .with_context(|| format!("Failed to reconcile webhooks on {}", request.repository()))?;

        ReconcileReport {
            repository: request.repository().to_string(),
            dry_run: false,
            planned_calls: Vec::new(),
            webhook,
        }
    };

    print_report(ctx, &report)
}

fn build_request(ctx: &Context, args: &ReconcileArgs) -> Result<WebhookRequest> {
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| ctx.config.webhook.name.clone());

    WebhookRequest::builder(args.repository.repository()?, name)
        .orchestrator_url(ctx.config.orchestrator.base_url.clone())
        .mirror(args.mirror)
        .trigger_on_ref_change(args.ref_change)
        .trigger_on_pull_request(args.pull_request)
        .build()
        .context("Invalid webhook request")
}

/// Reconcile against a snapshot of `remote` and report the calls that
/// would be made. Only reads are sent to `remote`.
pub async fn plan<R>(remote: &R, request: &WebhookRequest) -> Result<ReconcileReport>
where
    R: WebhookGateway + CapabilityProbe,
{
    let repository = request.repository();
    let snapshot = Arc::new(InMemoryWebhookGateway::new());

    let existing = remote
        .list(repository, &EventId::ALL)
        .await
        .with_context(|| format!("Failed to list webhooks on {}", repository))?;
    for webhook in existing {
        snapshot.insert_webhook(repository, webhook);
    }

    if request.is_mirror() {
        match remote.supported_events().await {
            Ok(events) => snapshot.set_supported_events(events),
            Err(e) if e.is_missing_capability() => snapshot.set_capability_missing(),
            Err(e) => return Err(e).context("Failed to read server capabilities"),
        }
    }

    let reconciler = WebhookReconciler::new(snapshot.clone(), snapshot.clone());
    let webhook = reconciler.reconcile(request).await?;

    let planned_calls: Vec<String> = snapshot
        .calls()
        .iter()
        .filter(|call| call.is_mutation())
        .map(ToString::to_string)
        .collect();

    info!(
        repository = %repository,
        planned = planned_calls.len(),
        "Dry run complete"
    );

    Ok(ReconcileReport {
        repository: repository.to_string(),
        dry_run: true,
        planned_calls,
        webhook,
    })
}

fn print_report(ctx: &Context, report: &ReconcileReport) -> Result<()> {
    if let Some(structured) = format_structured(report, ctx.format)? {
        println!("{}", structured);
        return Ok(());
    }

    if report.dry_run {
        output::section(&format!("Planned changes for {}", report.repository));
        if report.planned_calls.is_empty() {
            output::dimmed("  No changes needed");
        }
        for (index, call) in report.planned_calls.iter().enumerate() {
            output::list_item(index + 1, call);
        }
        println!();
    }

    match &report.webhook {
        Some(webhook) if report.dry_run => {
            output::key_value("Resulting webhook", &output::webhook_line(webhook))
        }
        Some(webhook) => {
            output::success(&format!("Webhooks reconciled on {}", report.repository));
            println!("  {}", output::webhook_line(webhook));
        }
        None => output::warning(NO_EVENTS),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbridge_core::RepositoryRef;
    use hookbridge_webhook::GatewayCall;

    const CALLBACK: &str = "https://ci.example.com/bitbucket-server-webhook/trigger";

    fn repo() -> RepositoryRef {
        RepositoryRef::new("PROJ", "service").unwrap()
    }

    fn request(mirror: bool, ref_change: bool, pull_request: bool) -> WebhookRequest {
        WebhookRequest::builder(repo(), "ci-main")
            .orchestrator_url("https://ci.example.com/")
            .mirror(mirror)
            .trigger_on_ref_change(ref_change)
            .trigger_on_pull_request(pull_request)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_plan_does_not_mutate_remote() {
        let remote = InMemoryWebhookGateway::new();
        let existing = remote.insert(&repo(), "ci-main", &["repo:refs_changed"], CALLBACK, true);
        remote.insert(&repo(), "ci-main", &["pr:opened"], CALLBACK, true);

        let report = plan(&remote, &request(false, true, true)).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.planned_calls.len(), 2);
        assert!(report.planned_calls[0].starts_with(&format!("update webhook {}", existing.id)));
        assert!(report.planned_calls[1].starts_with("delete webhook"));
        assert_eq!(report.webhook.unwrap().id, existing.id);

        assert!(remote.calls().iter().all(|call| !call.is_mutation()));
        assert_eq!(remote.webhooks(&repo()).len(), 2);
    }

    #[tokio::test]
    async fn test_plan_without_changes() {
        let remote = InMemoryWebhookGateway::new();
        remote.insert(&repo(), "ci-main", &["repo:refs_changed"], CALLBACK, true);

        let report = plan(&remote, &request(false, true, false)).await.unwrap();

        assert!(report.planned_calls.is_empty());
        assert!(report.webhook.is_some());
    }

    #[tokio::test]
    async fn test_plan_mirror_uses_remote_capabilities() {
        let remote = InMemoryWebhookGateway::new();
        remote.set_capability_missing();

        let report = plan(&remote, &request(true, false, false)).await.unwrap();

        assert_eq!(report.planned_calls.len(), 1);
        assert!(report.planned_calls[0].starts_with("create webhook 'ci-main'"));
        assert!(report.planned_calls[0].ends_with("[repo:refs_changed]"));
        assert_eq!(
            remote.calls(),
            vec![
                GatewayCall::List { repository: repo() },
                GatewayCall::SupportedEvents,
            ]
        );
    }

    #[tokio::test]
    async fn test_plan_with_nothing_requested() {
        let remote = InMemoryWebhookGateway::new();

        let report = plan(&remote, &request(false, false, false)).await.unwrap();

        assert!(report.planned_calls.is_empty());
        assert!(report.webhook.is_none());
    }

    #[tokio::test]
    async fn test_plan_mirror_on_server_without_supported_events() {
        let remote = InMemoryWebhookGateway::new();
        remote.set_supported_events(hookbridge_webhook::EventSet::new());

        let report = plan(&remote, &request(true, false, false)).await.unwrap();

        assert!(report.planned_calls.is_empty());
        assert!(report.webhook.is_none());
        assert!(NO_EVENTS.contains("none requested"));
        assert!(NO_EVENTS.contains("none supported by the server"));
    }

    #[test]
    fn test_report_serialization_skips_empty_plan() {
        let report = ReconcileReport {
            repository: "PROJ/service".to_string(),
            dry_run: false,
            planned_calls: Vec::new(),
            webhook: None,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["repository"], "PROJ/service");
        assert!(json.get("planned_calls").is_none());
        assert!(json["webhook"].is_null());
    }
}
