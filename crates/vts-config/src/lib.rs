//! Vault Transform Sync Configuration
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vault: VaultConfig,
    pub transform: TransformConfig,
    pub notification: NotificationConfig,
}

/// Vault connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault address, e.g. https://vault.example.com:8200
    pub addr: String,
    /// Token sent as X-Vault-Token
    pub token: String,
    /// Enterprise namespace (empty = root)
    pub namespace: String,
    /// HTTP request timeout in milliseconds
    pub timeout_ms: u64,
    /// Attempts per request, including the first
    pub retry_attempts: u32,
    /// Initial backoff between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:8200".to_string(),
            token: String::new(),
            namespace: String::new(),
            timeout_ms: 30000,
            retry_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Transform secrets engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Mount path of the transform engine
    pub backend: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            backend: "transform".to_string(),
        }
    }
}

/// Where advisories about unapplied reciprocal edits are delivered
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Also write advisories to the log
    pub log_enabled: bool,
    /// Post advisories to a chat webhook
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log_enabled: true,
            webhook_enabled: false,
            webhook_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault.addr.trim().is_empty() {
            return Err(ConfigError::ValidationError("vault.addr must not be empty".into()));
        }
        if self.transform.backend.trim_matches('/').is_empty() {
            return Err(ConfigError::ValidationError("transform.backend must not be empty".into()));
        }
        if self.vault.retry_attempts == 0 {
            return Err(ConfigError::ValidationError("vault.retry_attempts must be at least 1".into()));
        }
        if self.notification.webhook_enabled
            && self.notification.webhook_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::ValidationError(
                "notification.webhook_url is required when webhook_enabled = true".into(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Vault Transform Sync Configuration
# Environment variables override these settings

[vault]
addr = "http://127.0.0.1:8200"   # VAULT_ADDR
token = ""                        # VAULT_TOKEN
namespace = ""                    # VAULT_NAMESPACE
timeout_ms = 30000
retry_attempts = 3
retry_delay_ms = 100

[transform]
backend = "transform"

[notification]
log_enabled = true
webhook_enabled = false
# webhook_url = "https://example.webhook.office.com/..."
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transform.backend, "transform");
        assert_eq!(config.vault.retry_attempts, 3);
    }

    #[test]
    fn test_example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.vault.addr, "http://127.0.0.1:8200");
        assert!(config.notification.log_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str("[transform]\nbackend = \"tx\"\n").unwrap();
        assert_eq!(config.transform.backend, "tx");
        assert_eq!(config.vault.timeout_ms, 30000);
    }

    #[test]
    fn test_validate_rejects_webhook_without_url() {
        let mut config = AppConfig::default();
        config.notification.webhook_enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.notification.webhook_url = Some("https://example.com/hook".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.vault.retry_attempts = 0;
        assert!(config.validate().is_err());
    }
}
