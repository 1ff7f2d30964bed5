//! Vault HTTP record store
//!
//! Roles live at `{backend}/role/{name}` and transformations at
//! `{backend}/transformation/{name}`. Reads return a `{"data": {...}}` envelope;
//! writes are full-record `POST`s, so create and update share an endpoint.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use vts_common::{Role, Transformation, TransformationKind};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::RecordStore;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct RoleData {
    #[serde(default)]
    transformations: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct TransformationData {
    #[serde(rename = "type", default)]
    kind: Option<TransformationKind>,
    #[serde(default)]
    templates: Option<Vec<String>>,
    #[serde(default)]
    tweak_source: Option<String>,
    #[serde(default)]
    masking_character: Option<Value>,
    #[serde(default)]
    deletion_allowed: bool,
    #[serde(default)]
    allowed_roles: Option<Vec<String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Record store backed by the Vault HTTP API
#[derive(Debug, Clone)]
pub struct VaultRecordStore {
    config: Arc<StoreConfig>,
    http_client: reqwest::Client,
}

impl VaultRecordStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self::with_client(config, http_client))
    }

    pub fn with_client(config: StoreConfig, http_client: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
        }
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    fn role_path(backend: &str, id: &str) -> String {
        format!("{}/role/{}", backend.trim_matches('/'), urlencoding::encode(id))
    }

    fn transformation_path(backend: &str, id: &str) -> String {
        format!(
            "{}/transformation/{}",
            backend.trim_matches('/'),
            urlencoding::encode(id)
        )
    }

    async fn read<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self
            .execute(Method::GET, path, None)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let envelope: Envelope<T> = serde_json::from_value(body)?;
        Ok(envelope.data)
    }

    async fn write(&self, path: &str, body: &Value) -> Result<()> {
        self.execute(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// Execute a request, retrying rate limits and server errors with exponential backoff
    async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let url = self.config.api_url(path);
        let mut last_error = None;

        for attempt in 0..self.config.retry_attempts {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(self.config.retry_delay, attempt)).await;
            }

            let mut request = self.http_client.request(method.clone(), &url);
            if let Some(token) = &self.config.token {
                request = request.header("X-Vault-Token", token);
            }
            if let Some(namespace) = &self.config.namespace {
                request = request.header("X-Vault-Namespace", namespace);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        if status == reqwest::StatusCode::NO_CONTENT {
                            return Ok(None);
                        }
                        let text = response.text().await?;
                        if text.trim().is_empty() {
                            return Ok(None);
                        }
                        return Ok(Some(serde_json::from_str(&text)?));
                    }

                    let text = response.text().await.unwrap_or_default();
                    let error = StoreError::from_status(status.as_u16(), error_message(&text));

                    if !error.is_retryable() {
                        debug!(%method, path, status = status.as_u16(), "Vault request rejected");
                        return Err(error);
                    }

                    warn!(%method, path, status = status.as_u16(), attempt, "Vault request failed, retrying");
                    last_error = Some(error);
                }
                Err(e) => {
                    warn!(%method, path, error = %e, attempt, "Vault request transport error");
                    last_error = Some(StoreError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::Other("Request failed".into())))
    }
}

/// Exponential backoff before retry `attempt` (1-based), capped at [`MAX_BACKOFF`]
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    attempt
        .checked_sub(1)
        .and_then(|exp| 1u32.checked_shl(exp))
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ => body.trim().to_string(),
    }
}

fn masking_character(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => n
            .as_u64()
            .and_then(|code| u32::try_from(code).ok())
            .and_then(char::from_u32)
            .filter(|c| *c != '\0')
            .map(String::from),
        _ => None,
    }
}

/// Write body: attributes read back from Vault, overlaid with the modelled fields
fn transformation_body(transformation: &Transformation) -> Value {
    let mut body = transformation.extra.clone();
    if let Some(kind) = transformation.kind {
        body.insert("type".into(), json!(kind));
    }
    if let Some(template) = transformation.templates.first() {
        body.insert("template".into(), json!(template));
    }
    if let Some(tweak_source) = &transformation.tweak_source {
        body.insert("tweak_source".into(), json!(tweak_source));
    }
    if let Some(masking_character) = &transformation.masking_character {
        body.insert("masking_character".into(), json!(masking_character));
    }
    body.insert("deletion_allowed".into(), json!(transformation.deletion_allowed));
    body.insert("allowed_roles".into(), json!(transformation.allowed_role_ids()));
    Value::Object(body)
}

#[async_trait]
impl RecordStore for VaultRecordStore {
    async fn find_role(&self, backend: &str, id: &str) -> Result<Role> {
        let data: RoleData = self.read(&Self::role_path(backend, id)).await?;
        Ok(Role::new(backend, id).with_transformations(data.transformations.unwrap_or_default()))
    }

    async fn find_transformation(&self, backend: &str, id: &str) -> Result<Transformation> {
        let data: TransformationData = self.read(&Self::transformation_path(backend, id)).await?;

        let mut transformation = Transformation::new(backend, id)
            .with_allowed_roles(data.allowed_roles.unwrap_or_default());
        transformation.kind = data.kind;
        transformation.templates = data.templates.unwrap_or_default();
        transformation.tweak_source = data.tweak_source.filter(|s| !s.is_empty());
        transformation.masking_character = masking_character(data.masking_character);
        transformation.deletion_allowed = data.deletion_allowed;
        transformation.extra = data.extra;
        Ok(transformation)
    }

    async fn create_role(&self, role: &Role) -> Result<()> {
        self.save_role(role).await
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        let body = json!({ "transformations": role.transformation_ids() });
        self.write(&Self::role_path(&role.backend, &role.id), &body).await
    }

    async fn create_transformation(&self, transformation: &Transformation) -> Result<()> {
        self.save_transformation(transformation).await
    }

    async fn save_transformation(&self, transformation: &Transformation) -> Result<()> {
        let body = transformation_body(transformation);
        self.write(
            &Self::transformation_path(&transformation.backend, &transformation.id),
            &body,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_encode_identifiers() {
        assert_eq!(VaultRecordStore::role_path("/transform/", "a b"), "transform/role/a%20b");
        assert_eq!(
            VaultRecordStore::transformation_path("transform", "ccn"),
            "transform/transformation/ccn"
        );
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 12), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 33), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::MAX, 2), MAX_BACKOFF);
    }

    #[test]
    fn test_error_message_prefers_vault_errors() {
        assert_eq!(error_message(r#"{"errors":["permission denied"]}"#), "permission denied");
        assert_eq!(error_message(r#"{"errors":["a","b"]}"#), "a; b");
        assert_eq!(error_message("plain text\n"), "plain text");
    }

    #[test]
    fn test_masking_character_accepts_string_or_code_point() {
        assert_eq!(masking_character(Some(json!("#"))), Some("#".into()));
        assert_eq!(masking_character(Some(json!(42))), Some("*".into()));
        assert_eq!(masking_character(Some(json!(0))), None);
        assert_eq!(masking_character(Some(json!(""))), None);
        assert_eq!(masking_character(None), None);
    }

    #[test]
    fn test_transformation_body_keeps_required_attributes() {
        let t = Transformation::new("transform", "ccn")
            .with_kind(TransformationKind::Fpe)
            .with_template("builtin/creditcardnumber")
            .with_allowed_roles(["payments", "*"]);

        let body = transformation_body(&t);
        assert_eq!(body["type"], "fpe");
        assert_eq!(body["template"], "builtin/creditcardnumber");
        assert_eq!(body["allowed_roles"], json!(["payments", "*"]));
        assert!(body.get("tweak_source").is_none());
    }

    #[test]
    fn test_transformation_body_overlays_extra_attributes() {
        let mut t = Transformation::new("transform", "tok")
            .with_kind(TransformationKind::Tokenization)
            .with_allowed_roles(["a"]);
        t.extra.insert("stores".into(), json!(["pg-store"]));
        t.extra.insert("allowed_roles".into(), json!(["stale"]));

        let body = transformation_body(&t);
        assert_eq!(body["stores"], json!(["pg-store"]));
        assert_eq!(body["allowed_roles"], json!(["a"]));
    }
}
