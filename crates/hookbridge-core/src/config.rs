use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment prefix used when no explicit prefix is given
pub const ENV_PREFIX: &str = "HOOKBRIDGE";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Load configuration from environment with custom prefix
    pub fn load_from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::builder(None, prefix)?.build()?.try_deserialize()
    }

    /// Load configuration from file with environment overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::builder(Some(path), ENV_PREFIX)?
            .build()?
            .try_deserialize()
    }

    fn builder(
        path: Option<&Path>,
        prefix: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.base_url", default_server_url())?
            .set_default("server.timeout_seconds", default_timeout_seconds() as i64)?
            .set_default("orchestrator.base_url", default_orchestrator_url())?
            .set_default("webhook.name", default_webhook_name())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        Ok(builder.add_source(
            Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        ))
    }
}

/// Hosting server connection settings
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ServerConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

fn default_server_url() -> String {
    "http://localhost:7990".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// CI orchestrator settings; the base URL is where webhook callbacks land
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub base_url: String,
}

fn default_orchestrator_url() -> String {
    "http://localhost:8080".to_string()
}

/// Webhook naming
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_name")]
    pub name: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            name: default_webhook_name(),
        }
    }
}

fn default_webhook_name() -> String {
    "hookbridge".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_config_creation() {
        let config = ServerConfig::new("https://git.example.com".to_string())
            .with_token("secret".to_string())
            .with_timeout(5);

        assert_eq!(config.base_url, "https://git.example.com");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_server_config_debug_redacts_token() {
        let config = ServerConfig::new("https://git.example.com".to_string())
            .with_token("super-secret".to_string());

        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_from_env("HOOKBRIDGE_TEST_DEFAULTS").unwrap();

        assert_eq!(config.server.base_url, "http://localhost:7990");
        assert_eq!(config.server.timeout_seconds, 30);
        assert!(config.server.token.is_none());
        assert_eq!(config.orchestrator.base_url, "http://localhost:8080");
        assert_eq!(config.webhook.name, "hookbridge");
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var(
            "HOOKBRIDGE_TEST_ENV__ORCHESTRATOR__BASE_URL",
            "https://ci.example.com/",
        );
        std::env::set_var("HOOKBRIDGE_TEST_ENV__SERVER__TIMEOUT_SECONDS", "12");

        let config = AppConfig::load_from_env("HOOKBRIDGE_TEST_ENV").unwrap();

        assert_eq!(config.orchestrator.base_url, "https://ci.example.com/");
        assert_eq!(config.server.timeout_seconds, 12);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nbase_url = \"https://git.example.com\"\ntoken = \"abc\"\n\n[webhook]\nname = \"ci-main\""
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.server.base_url, "https://git.example.com");
        assert_eq!(config.server.token.as_deref(), Some("abc"));
        assert_eq!(config.webhook.name, "ci-main");
        assert_eq!(config.orchestrator.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file(Path::new("/nonexistent/hookbridge.toml")).unwrap();
        assert_eq!(config.webhook.name, "hookbridge");
    }
}
