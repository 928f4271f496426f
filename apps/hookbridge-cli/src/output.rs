//! Output formatting utilities

use colored::Colorize;
use hookbridge_webhook::RemoteWebhook;
use serde::Serialize;

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Serialize `value` for the structured formats.
///
/// Returns `None` for [`OutputFormat::Text`]; each command renders its own
/// text output.
pub fn format_structured<T: Serialize>(
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<Option<String>> {
    match format {
        OutputFormat::Text => Ok(None),
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
        OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
    }
}

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("{}: {}", key.bold(), value);
}

/// Print a dimmed message
pub fn dimmed(message: &str) {
    println!("{}", message.dimmed());
}

/// Print a list item
pub fn list_item(index: usize, message: &str) {
    println!("  {}. {}", index, message);
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.bold().underline());
}

/// One-line summary of a webhook
pub fn webhook_line(webhook: &RemoteWebhook) -> String {
    let state = if webhook.active {
        "active".green()
    } else {
        "inactive".red()
    };
    let events: Vec<&str> = webhook.events.iter().map(String::as_str).collect();

    format!(
        "#{} {} [{}] -> {} ({})",
        webhook.id,
        webhook.name.bold(),
        state,
        webhook.url,
        events.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("YML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("markdown".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Yaml.to_string(), "yaml");
    }

    #[test]
    fn test_format_structured() {
        let value = serde_json::json!({ "id": 3 });

        assert!(format_structured(&value, OutputFormat::Text).unwrap().is_none());
        let json = format_structured(&value, OutputFormat::Json).unwrap().unwrap();
        assert!(json.contains("\"id\": 3"));
        let yaml = format_structured(&value, OutputFormat::Yaml).unwrap().unwrap();
        assert!(yaml.contains("id: 3"));
    }

    #[test]
    fn test_webhook_line() {
        colored::control::set_override(false);
        let webhook = RemoteWebhook {
            id: 4,
            name: "ci".to_string(),
            events: BTreeSet::from(["repo:refs_changed".to_string()]),
            url: "https://ci/hook".to_string(),
            active: true,
        };

        assert_eq!(
            webhook_line(&webhook),
            "#4 ci [active] -> https://ci/hook (repo:refs_changed)"
        );
    }
}
