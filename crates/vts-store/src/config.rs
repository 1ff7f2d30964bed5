//! Vault client configuration

use std::time::Duration;

/// Connection settings for [`VaultRecordStore`](crate::VaultRecordStore)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Vault address, without the `/v1` suffix
    pub addr: String,

    /// Sent as `X-Vault-Token` when present
    pub token: Option<String>,

    /// Sent as `X-Vault-Namespace` when present
    pub namespace: Option<String>,

    /// Request timeout
    pub timeout: Duration,

    /// Attempts per request, including the first
    pub retry_attempts: u32,

    /// Initial retry delay, doubled on every further attempt
    pub retry_delay: Duration,

    pub user_agent: String,
}

impl StoreConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into().trim_end_matches('/').to_string(),
            token: None,
            namespace: None,
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            user_agent: format!("vts/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Full URL for an API path such as `transform/role/payments`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path.trim_start_matches('/'))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8200")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_normalizes_slashes() {
        let config = StoreConfig::new("http://vault:8200/");
        assert_eq!(config.api_url("/transform/role/a"), "http://vault:8200/v1/transform/role/a");
    }

    #[test]
    fn test_empty_token_and_namespace_are_unset() {
        let config = StoreConfig::default().with_token("").with_namespace("");
        assert!(config.token.is_none());
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_retry_attempts_never_zero() {
        let config = StoreConfig::default().with_retry(0, Duration::from_millis(1));
        assert_eq!(config.retry_attempts, 1);
    }
}
