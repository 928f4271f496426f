//! Capabilities command

use anyhow::Result;
use hookbridge_webhook::{CapabilityProbe, EventId};
use serde::Serialize;

use super::Context;
use crate::output::{self, format_structured};

#[derive(Debug, Serialize)]
pub struct CapabilityReport {
    /// False when the server cannot report webhook capabilities
    pub reported: bool,
    pub events: Vec<&'static str>,
}

pub async fn run(ctx: &Context) -> Result<()> {
    let report = probe(&ctx.gateway()?).await?;

    if let Some(structured) = format_structured(&report, ctx.format)? {
        println!("{}", structured);
        return Ok(());
    }

    output::key_value("Server", &ctx.config.server.base_url);
    if !report.reported {
        output::warning("Server does not report webhook capabilities");
        return Ok(());
    }

    output::section("Supported webhook events");
    if report.events.is_empty() {
        output::dimmed("  None of the managed events are supported");
    }
    for (index, event) in report.events.iter().enumerate() {
        output::list_item(index + 1, event);
    }

    Ok(())
}

pub async fn probe<P: CapabilityProbe + ?Sized>(probe: &P) -> Result<CapabilityReport> {
    match probe.supported_events().await {
        Ok(events) => Ok(CapabilityReport {
            reported: true,
            events: events.iter().map(EventId::as_str).collect(),
        }),
        Err(e) if e.is_missing_capability() => Ok(CapabilityReport {
            reported: false,
            events: Vec::new(),
        }),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to read server capabilities")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbridge_webhook::{EventSet, GatewayOperation, InMemoryWebhookGateway};

    #[tokio::test]
    async fn test_probe_reports_supported_events() {
        let gateway = InMemoryWebhookGateway::new();
        gateway.set_supported_events(EventSet::from([EventId::RepoRefsChanged]));

        let report = probe(&gateway).await.unwrap();
        assert!(report.reported);
        assert_eq!(report.events, vec!["repo:refs_changed"]);
    }

    #[tokio::test]
    async fn test_probe_missing_capability() {
        let gateway = InMemoryWebhookGateway::new();
        gateway.set_capability_missing();

        let report = probe(&gateway).await.unwrap();
        assert!(!report.reported);
        assert!(report.events.is_empty());
    }

    #[tokio::test]
    async fn test_probe_propagates_server_errors() {
        let gateway = InMemoryWebhookGateway::new();
        gateway.fail_on(GatewayOperation::SupportedEvents);

        assert!(probe(&gateway).await.is_err());
    }
}
