//! List command

use anyhow::{Context as _, Result};
use hookbridge_webhook::{EventId, RemoteWebhook, WebhookGateway, WebhookRequest};

use super::Context;
use crate::cli::RepositoryArgs;
use crate::output::{self, format_structured};

pub async fn run(ctx: &Context, args: &RepositoryArgs) -> Result<()> {
    let repository = args.repository()?;
    let owner = WebhookRequest::builder(repository.clone(), ctx.config.webhook.name.clone())
        .orchestrator_url(ctx.config.orchestrator.base_url.clone())
        .build()
        .context("Invalid webhook configuration")?;

    let webhooks = owned_webhooks(&ctx.gateway()?, &owner)
        .await
        .with_context(|| format!("Failed to list webhooks on {}", repository))?;

    if let Some(structured) = format_structured(&webhooks, ctx.format)? {
        println!("{}", structured);
        return Ok(());
    }

    output::section(&format!("Webhooks on {}", repository));
    if webhooks.is_empty() {
        output::dimmed("  No managed webhooks found");
    }
    for (index, webhook) in webhooks.iter().enumerate() {
        output::list_item(index + 1, &output::webhook_line(webhook));
    }

    Ok(())
}

/// Webhooks on the request's repository that `owner` would manage
pub async fn owned_webhooks<G: WebhookGateway + ?Sized>(
    gateway: &G,
    owner: &WebhookRequest,
) -> hookbridge_webhook::Result<Vec<RemoteWebhook>> {
    Ok(gateway
        .list(owner.repository(), &EventId::ALL)
        .await?
        .into_iter()
        .filter(|webhook| webhook.is_owned_by(owner))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbridge_core::RepositoryRef;
    use hookbridge_webhook::InMemoryWebhookGateway;

    #[tokio::test]
    async fn test_owned_webhooks_match_name_or_url() {
        let repo = RepositoryRef::new("PROJ", "service").unwrap();
        let gateway = InMemoryWebhookGateway::new();
        let callback = "https://ci.example.com/bitbucket-server-webhook/trigger";
        gateway.insert(&repo, "hookbridge", &["repo:refs_changed"], "https://old/hook", true);
        gateway.insert(&repo, "renamed", &["pr:opened"], callback, false);
        gateway.insert(&repo, "someone-else", &["repo:refs_changed"], "https://other/hook", true);

        let owner = WebhookRequest::builder(repo, "hookbridge")
            .orchestrator_url("https://ci.example.com")
            .build()
            .unwrap();

        let owned = owned_webhooks(&gateway, &owner).await.unwrap();
        let names: Vec<&str> = owned.iter().map(|hook| hook.name.as_str()).collect();
        assert_eq!(names, vec!["hookbridge", "renamed"]);
    }
}
