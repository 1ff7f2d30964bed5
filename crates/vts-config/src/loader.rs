//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "vts.toml",
    "config.toml",
    "./config/vts.toml",
    "/etc/vts/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) but reads variables through `lookup`.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup)? {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, &lookup);
        config.validate()?;

        Ok(config)
    }

    fn find_config_file<F>(&self, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // An explicit path that does not exist is an error, not a silent fallback
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "config file {} not found",
                path.display()
            )));
        }

        if let Some(path) = lookup("VTS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    // Vault: the standard client variables first, VTS_* wins
    for key in ["VAULT_ADDR", "VTS_VAULT_ADDR"] {
        if let Some(val) = lookup(key) {
            config.vault.addr = val;
        }
    }
    for key in ["VAULT_TOKEN", "VTS_VAULT_TOKEN"] {
        if let Some(val) = lookup(key) {
            config.vault.token = val;
        }
    }
    for key in ["VAULT_NAMESPACE", "VTS_VAULT_NAMESPACE"] {
        if let Some(val) = lookup(key) {
            config.vault.namespace = val;
        }
    }
    if let Some(val) = lookup("VTS_VAULT_TIMEOUT_MS") {
        if let Ok(timeout) = val.parse() {
            config.vault.timeout_ms = timeout;
        }
    }
    if let Some(val) = lookup("VTS_VAULT_RETRY_ATTEMPTS") {
        if let Ok(attempts) = val.parse() {
            config.vault.retry_attempts = attempts;
        }
    }
    if let Some(val) = lookup("VTS_VAULT_RETRY_DELAY_MS") {
        if let Ok(delay) = val.parse() {
            config.vault.retry_delay_ms = delay;
        }
    }

    // Transform
    if let Some(val) = lookup("VTS_TRANSFORM_BACKEND") {
        config.transform.backend = val;
    }

    // Notification
    if let Some(val) = lookup("VTS_NOTIFICATION_LOG_ENABLED") {
        config.notification.log_enabled = val.parse().unwrap_or(true);
    }
    if let Some(val) = lookup("VTS_NOTIFICATION_WEBHOOK_ENABLED") {
        config.notification.webhook_enabled = val.parse().unwrap_or(false);
    }
    if let Some(val) = lookup("VTS_NOTIFICATION_WEBHOOK_URL") {
        config.notification.webhook_url = Some(val);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
