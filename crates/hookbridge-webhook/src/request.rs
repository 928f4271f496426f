//! Desired webhook subscription
//!
//! A [`WebhookRequest`] captures what the orchestrator wants for one
//! repository. It is validated when built, never during reconciliation.

use crate::{Result, WebhookError};
use hookbridge_core::RepositoryRef;
use serde::Serialize;

/// Longest webhook name the server accepts
pub const MAX_WEBHOOK_NAME_LENGTH: usize = 255;

/// Path the orchestrator serves webhook callbacks on, relative to its base URL
pub const CALLBACK_PATH: &str = "bitbucket-server-webhook/trigger";

/// Join the orchestrator base URL and [`CALLBACK_PATH`] with exactly one `/`
pub fn callback_url(orchestrator_url: &str) -> String {
    format!("{}/{}", orchestrator_url.trim_end_matches('/'), CALLBACK_PATH)
}

/// Immutable description of the webhook state wanted for a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookRequest {
    repository: RepositoryRef,
    name: String,
    callback_url: String,
    mirror: bool,
    trigger_on_ref_change: bool,
    trigger_on_pull_request: bool,
}

impl WebhookRequest {
    pub fn builder(repository: RepositoryRef, name: impl Into<String>) -> WebhookRequestBuilder {
        WebhookRequestBuilder::new(repository, name)
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    /// Name used to recognise webhooks this engine owns
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Whether the repository is a mirror; ref-change and pull request flags are then ignored
    pub fn is_mirror(&self) -> bool {
        self.mirror
    }

    pub fn trigger_on_ref_change(&self) -> bool {
        self.trigger_on_ref_change
    }

    pub fn trigger_on_pull_request(&self) -> bool {
        self.trigger_on_pull_request
    }
}

/// Builder for [`WebhookRequest`]
#[derive(Debug, Clone)]
pub struct WebhookRequestBuilder {
    repository: RepositoryRef,
    name: String,
    orchestrator_url: Option<String>,
    mirror: bool,
    trigger_on_ref_change: bool,
    trigger_on_pull_request: bool,
}

impl WebhookRequestBuilder {
    fn new(repository: RepositoryRef, name: impl Into<String>) -> Self {
        Self {
            repository,
            name: name.into(),
            orchestrator_url: None,
            mirror: false,
            trigger_on_ref_change: false,
            trigger_on_pull_request: false,
        }
    }

    /// Base URL of the orchestrator receiving callbacks
    pub fn orchestrator_url(mut self, url: impl Into<String>) -> Self {
        self.orchestrator_url = Some(url.into());
        self
    }

    /// Mark the repository as a mirror. A mirror request subscribes to mirror
    /// synchronisation only; the trigger flags are ignored.
    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn trigger_on_ref_change(mut self, enabled: bool) -> Self {
        self.trigger_on_ref_change = enabled;
        self
    }

    pub fn trigger_on_pull_request(mut self, enabled: bool) -> Self {
        self.trigger_on_pull_request = enabled;
        self
    }

    pub fn build(self) -> Result<WebhookRequest> {
        if self.name.trim().is_empty() {
            return Err(WebhookError::InvalidRequest(
                "webhook name must not be empty".to_string(),
            ));
        }

        let length = self.name.chars().count();
        if length > MAX_WEBHOOK_NAME_LENGTH {
            return Err(WebhookError::InvalidRequest(format!(
                "webhook name is {} characters, the limit is {}",
                length, MAX_WEBHOOK_NAME_LENGTH
            )));
        }

        let orchestrator_url = self
            .orchestrator_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                WebhookError::InvalidRequest("orchestrator URL must be set".to_string())
            })?;

        Ok(WebhookRequest {
            repository: self.repository,
            name: self.name,
            callback_url: callback_url(orchestrator_url.trim()),
            mirror: self.mirror,
            trigger_on_ref_change: self.trigger_on_ref_change,
            trigger_on_pull_request: self.trigger_on_pull_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepositoryRef {
        RepositoryRef::new("PROJ", "service").unwrap()
    }

    #[test]
    fn test_callback_url_single_slash() {
        assert_eq!(
            callback_url("https://ci.example.com"),
            "https://ci.example.com/bitbucket-server-webhook/trigger"
        );
        assert_eq!(
            callback_url("https://ci.example.com/"),
            "https://ci.example.com/bitbucket-server-webhook/trigger"
        );
        assert_eq!(
            callback_url("https://ci.example.com/jenkins/"),
            "https://ci.example.com/jenkins/bitbucket-server-webhook/trigger"
        );
    }

    #[test]
    fn test_build_request() {
        let request = WebhookRequest::builder(repo(), "ci-main")
            .orchestrator_url("https://ci.example.com/")
            .trigger_on_ref_change(true)
            .build()
            .unwrap();

        assert_eq!(request.name(), "ci-main");
        assert_eq!(request.repository().to_string(), "PROJ/service");
        assert_eq!(
            request.callback_url(),
            "https://ci.example.com/bitbucket-server-webhook/trigger"
        );
        assert!(request.trigger_on_ref_change());
        assert!(!request.trigger_on_pull_request());
        assert!(!request.is_mirror());
    }

    #[test]
    fn test_name_at_limit_is_accepted() {
        let name = "a".repeat(MAX_WEBHOOK_NAME_LENGTH);
        let request = WebhookRequest::builder(repo(), name)
            .orchestrator_url("https://ci.example.com")
            .build();

        assert!(request.is_ok());
    }

    #[test]
    fn test_name_too_long_is_rejected() {
        let name = "a".repeat(MAX_WEBHOOK_NAME_LENGTH + 1);
        let err = WebhookRequest::builder(repo(), name)
            .orchestrator_url("https://ci.example.com")
            .build()
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = WebhookRequest::builder(repo(), "  ")
            .orchestrator_url("https://ci.example.com")
            .build()
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidRequest(_)));
    }

    #[test]
    fn test_missing_orchestrator_url_is_rejected() {
        let err = WebhookRequest::builder(repo(), "ci-main").build().unwrap_err();
        assert!(matches!(err, WebhookError::InvalidRequest(_)));
    }
}
