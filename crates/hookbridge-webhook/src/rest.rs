//! REST gateway for the hosting server's webhook API

use crate::{
    events::{EventId, EventSet},
    gateway::{CapabilityProbe, RemoteWebhook, WebhookGateway},
    Result, WebhookError,
};
use async_trait::async_trait;
use hookbridge_core::{RepositoryRef, ServerConfig};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Key of the webhook entry in the server capability document
const WEBHOOK_CAPABILITY: &str = "webhooks";

/// One page of a paged collection
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    #[serde(default)]
    next_page_start: Option<u32>,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ServerCapabilities {
    #[serde(default)]
    capabilities: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct WebhookCapabilities {
    #[serde(rename = "application-webhooks", default)]
    application_webhooks: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    name: &'a str,
    events: Vec<&'static str>,
    url: &'a str,
    active: bool,
}

impl<'a> WebhookBody<'a> {
    fn new(name: &'a str, events: &EventSet, url: &'a str) -> Self {
        Self {
            name,
            events: events.iter().map(EventId::as_str).collect(),
            url,
            active: true,
        }
    }
}

/// Gateway and capability probe speaking to the server over HTTP
#[derive(Clone)]
pub struct RestWebhookGateway {
    http: Client,
    base_url: Url,
    token: Option<Secret<String>>,
}

impl std::fmt::Debug for RestWebhookGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestWebhookGateway")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Builder for [`RestWebhookGateway`]
#[derive(Default)]
pub struct RestWebhookGatewayBuilder {
    base_url: String,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl RestWebhookGatewayBuilder {
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RestWebhookGateway> {
        let base_url = Url::parse(&self.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(WebhookError::InvalidRequest(format!(
                "server URL cannot be used as a base: {}",
                base_url
            )));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .user_agent(concat!("hookbridge/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(RestWebhookGateway {
            http,
            base_url,
            token: self.token.filter(|t| !t.is_empty()).map(Secret::new),
        })
    }
}

impl RestWebhookGateway {
    pub fn builder(base_url: impl Into<String>) -> RestWebhookGatewayBuilder {
        RestWebhookGatewayBuilder {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Build a gateway from the `server` section of the application config
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::builder(config.base_url.clone())
            .token(config.token.clone())
            .timeout(config.timeout())
            .build()
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                WebhookError::InvalidRequest(format!(
                    "server URL cannot be used as a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Resolve a link from a server document against the base URL, keeping
    /// the context path for relative links
    fn resolve(&self, link: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        base.path_segments_mut()
            .map_err(|_| {
                WebhookError::InvalidRequest(format!(
                    "server URL cannot be used as a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("");
        Ok(base.join(link)?)
    }

    fn webhooks_url(&self, repository: &RepositoryRef) -> Result<Url> {
        self.url(&[
            "rest",
            "api",
            "1.0",
            "projects",
            repository.project_key(),
            "repos",
            repository.repository_slug(),
            "webhooks",
        ])
    }

    fn webhook_url(&self, repository: &RepositoryRef, id: i64) -> Result<Url> {
        let mut url = self.webhooks_url(repository)?;
        url.path_segments_mut()
            .map_err(|_| WebhookError::InvalidRequest("invalid webhook URL".to_string()))?
            .push(&id.to_string());
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Turn non-success responses into errors
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(WebhookError::NotFound(message)),
            _ => Err(WebhookError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    /// Check the status, then decode the JSON body
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl WebhookGateway for RestWebhookGateway {
    #[instrument(skip(self, repository, events), fields(repository = %repository))]
    async fn list(&self, repository: &RepositoryRef, events: &[EventId]) -> Result<Vec<RemoteWebhook>> {
        let url = self.webhooks_url(repository)?;
        let mut webhooks = Vec::new();
        let mut start = 0u32;

        loop {
            let mut query: Vec<(&str, String)> = events
                .iter()
                .map(|event| ("event", event.as_str().to_string()))
                .collect();
            query.push(("start", start.to_string()));

            let response = self
                .request(Method::GET, url.clone())
                .query(&query)
                .send()
                .await?;
            let page: Page<RemoteWebhook> = Self::decode(response).await?;

            debug!(start, count = page.values.len(), "Fetched webhook page");
            webhooks.extend(page.values);

            if page.is_last_page {
                break;
            }
            match page.next_page_start {
                Some(next) if next > start => start = next,
                next => {
                    return Err(WebhookError::InvalidResponse(format!(
                        "webhook page at {} is not the last page but nextPageStart is {:?}",
                        start, next
                    )))
                }
            }
        }

        Ok(webhooks)
    }

    async fn create(
        &self,
        repository: &RepositoryRef,
        name: &str,
        events: &EventSet,
        url: &str,
    ) -> Result<RemoteWebhook> {
        let response = self
            .request(Method::POST, self.webhooks_url(repository)?)
            .json(&WebhookBody::new(name, events, url))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn update(
        &self,
        repository: &RepositoryRef,
        id: i64,
        name: &str,
        events: &EventSet,
        url: &str,
    ) -> Result<RemoteWebhook> {
        let response = self
            .request(Method::PUT, self.webhook_url(repository, id)?)
            .json(&WebhookBody::new(name, events, url))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, repository: &RepositoryRef, id: i64) -> Result<()> {
        let response = self
            .request(Method::DELETE, self.webhook_url(repository, id)?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CapabilityProbe for RestWebhookGateway {
    async fn supported_events(&self) -> Result<EventSet> {
        let response = self
            .request(Method::GET, self.url(&["rest", "capabilities"])?)
            .send()
            .await?;

        let capabilities: ServerCapabilities = match Self::check(response).await {
            Ok(response) => serde_json::from_slice(&response.bytes().await?)?,
            Err(WebhookError::NotFound(_)) => {
                return Err(WebhookError::MissingCapability(
                    "server does not publish capabilities".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        let link = capabilities
            .capabilities
            .get(WEBHOOK_CAPABILITY)
            .ok_or_else(|| WebhookError::MissingCapability(WEBHOOK_CAPABILITY.to_string()))?;

        let response = self
            .request(Method::GET, self.resolve(link)?)
            .send()
            .await?;
        let webhooks: WebhookCapabilities = Self::decode(response).await?;

        let supported: EventSet = webhooks
            .application_webhooks
            .iter()
            .filter_map(|event| EventId::from_wire(event))
            .collect();

        debug!(supported = ?supported, "Fetched webhook capabilities");
        Ok(supported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ref_and_pull_request_events;

    #[test]
    fn test_webhooks_url_is_encoded() {
        let gateway = RestWebhookGateway::builder("https://git.example.com/bitbucket/")
            .build()
            .unwrap();
        let repo = RepositoryRef::new("PROJ", "my repo").unwrap();

        assert_eq!(
            gateway.webhooks_url(&repo).unwrap().as_str(),
            "https://git.example.com/bitbucket/rest/api/1.0/projects/PROJ/repos/my%20repo/webhooks"
        );
        assert_eq!(
            gateway.webhook_url(&repo, 7).unwrap().as_str(),
            "https://git.example.com/bitbucket/rest/api/1.0/projects/PROJ/repos/my%20repo/webhooks/7"
        );
    }

    #[test]
    fn test_base_without_trailing_slash() {
        let gateway = RestWebhookGateway::builder("https://git.example.com")
            .build()
            .unwrap();

        assert_eq!(
            gateway.url(&["rest", "capabilities"]).unwrap().as_str(),
            "https://git.example.com/rest/capabilities"
        );
    }

    #[test]
    fn test_relative_link_keeps_context_path() {
        for base in ["https://git.example.com/bitbucket", "https://git.example.com/bitbucket/"] {
            let gateway = RestWebhookGateway::builder(base).build().unwrap();

            assert_eq!(
                gateway.resolve("rest/webhooks/latest/capabilities").unwrap().as_str(),
                "https://git.example.com/bitbucket/rest/webhooks/latest/capabilities"
            );
            assert_eq!(
                gateway.resolve("https://other.example.com/caps").unwrap().as_str(),
                "https://other.example.com/caps"
            );
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RestWebhookGateway::builder("not a url").build().unwrap_err();
        assert!(matches!(err, WebhookError::InvalidUrl(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let gateway = RestWebhookGateway::builder("https://git.example.com")
            .token(Some("secret-token".to_string()))
            .build()
            .unwrap();

        let debug = format!("{:?}", gateway);
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_body_serialization() {
        let body = WebhookBody::new("ci", &ref_and_pull_request_events(), "https://ci/hook");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["name"], "ci");
        assert_eq!(json["active"], true);
        assert_eq!(json["events"].as_array().unwrap().len(), 5);
        assert_eq!(json["events"][0], "repo:refs_changed");
    }
}
