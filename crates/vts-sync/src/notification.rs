//! Advisory delivery
//!
//! Provides:
//! - A `NotificationSink` trait with a single sticky (non auto-dismissing) channel
//! - Log, collecting, webhook and fan-out sinks
//! - A factory driven by `NotificationConfig`

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use vts_config::NotificationConfig;

use crate::advisory::Advisory;

/// Where advisories end up
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show a persistent informational advisory
    async fn sticky_info(&self, advisory: &Advisory);

    fn is_enabled(&self) -> bool;
}

/// Drops every advisory
pub struct NoOpNotificationSink;

#[async_trait]
impl NotificationSink for NoOpNotificationSink {
    async fn sticky_info(&self, _advisory: &Advisory) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Writes advisories to the log at WARN level
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn sticky_info(&self, advisory: &Advisory) {
        let failed: Vec<String> = advisory
            .failed
            .iter()
            .map(|r| format!("{} {} ({:?})", r.action, r.id, r.outcome.status()))
            .collect();

        warn!(
            kind = ?advisory.kind,
            source = %advisory.source,
            failed = ?failed,
            "{}",
            advisory.message
        );
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Keeps advisories in memory until taken
#[derive(Default)]
pub struct CollectingNotificationSink {
    advisories: Mutex<Vec<Advisory>>,
}

impl CollectingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advisories(&self) -> Vec<Advisory> {
        self.advisories.lock().clone()
    }

    pub fn take(&self) -> Vec<Advisory> {
        std::mem::take(&mut *self.advisories.lock())
    }

    pub fn len(&self) -> usize {
        self.advisories.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisories.lock().is_empty()
    }
}

#[async_trait]
impl NotificationSink for CollectingNotificationSink {
    async fn sticky_info(&self, advisory: &Advisory) {
        self.advisories.lock().push(advisory.clone());
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Posts advisories as Adaptive Cards to a chat webhook
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotificationSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), webhook_url)
    }

    pub fn with_client(client: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    fn build_card(advisory: &Advisory) -> serde_json::Value {
        let facts: Vec<serde_json::Value> = advisory
            .failed
            .iter()
            .map(|r| {
                let status = r
                    .outcome
                    .status()
                    .map_or_else(|| "no response".to_string(), |s| s.to_string());
                json!({ "title": format!("{} {}", r.action, r.id), "value": status })
            })
            .collect();

        json!({
            "attachments": [{
                "contentType": "application/vnd.microsoft.card.adaptive",
                "content": {
                    "type": "AdaptiveCard",
                    "version": "1.4",
                    "body": [
                        {
                            "type": "TextBlock",
                            "text": format!("Transform sync: {}", advisory.source),
                            "weight": "Bolder",
                            "size": "Medium"
                        },
                        {
                            "type": "TextBlock",
                            "text": &advisory.message,
                            "wrap": true
                        },
                        {
                            "type": "FactSet",
                            "facts": facts
                        }
                    ]
                }
            }]
        })
    }

    async fn send(&self, payload: serde_json::Value) -> Result<(), reqwest::Error> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Advisory webhook returned error");
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn sticky_info(&self, advisory: &Advisory) {
        let payload = Self::build_card(advisory);
        if let Err(e) = self.send(payload).await {
            error!(error = %e, kind = ?advisory.kind, "Failed to post advisory to webhook");
        } else {
            info!(kind = ?advisory.kind, source = %advisory.source, "Advisory posted to webhook");
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Forwards every advisory to all delegates in order
pub struct FanoutNotificationSink {
    delegates: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutNotificationSink {
    pub fn new(delegates: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { delegates }
    }
}

#[async_trait]
impl NotificationSink for FanoutNotificationSink {
    async fn sticky_info(&self, advisory: &Advisory) {
        for delegate in &self.delegates {
            delegate.sticky_info(advisory).await;
        }
    }

    fn is_enabled(&self) -> bool {
        self.delegates.iter().any(|d| d.is_enabled())
    }
}

/// Create the sink described by `config`
pub fn create_notification_sink(config: &NotificationConfig) -> Arc<dyn NotificationSink> {
    let mut delegates: Vec<Arc<dyn NotificationSink>> = Vec::new();

    if config.log_enabled {
        delegates.push(Arc::new(LogNotificationSink));
    }

    if config.webhook_enabled {
        match config.webhook_url.as_deref() {
            Some(url) if !url.is_empty() => {
                delegates.push(Arc::new(WebhookNotificationSink::new(url)));
                info!("Advisory webhook enabled");
            }
            _ => warn!("Advisory webhook enabled but URL not configured - skipping"),
        }
    }

    match delegates.len() {
        0 => Arc::new(NoOpNotificationSink),
        1 => delegates.remove(0),
        _ => Arc::new(FanoutNotificationSink::new(delegates)),
    }
}
