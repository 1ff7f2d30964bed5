use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub mod logging;

/// Any membership entry containing this character is a glob, not a concrete identifier.
pub const WILDCARD: char = '*';

/// Returns true for membership entries that name a pattern rather than one record.
///
/// Wildcards are never expanded into concrete members; they are skipped when diffing.
pub fn is_wildcard(entry: &str) -> bool {
    entry.contains(WILDCARD)
}

// ============================================================================
// Records
// ============================================================================

/// Which kind of record a store operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Role,
    Transformation,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Role => write!(f, "role"),
            RecordKind::Transformation => write!(f, "transformation"),
        }
    }
}

/// A transform role: the set of transformations it may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,

    /// Mount path of the transform secrets engine
    #[serde(default)]
    pub backend: String,

    #[serde(default)]
    pub transformations: IndexSet<String>,
}

impl Role {
    pub fn new(backend: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: backend.into(),
            transformations: IndexSet::new(),
        }
    }

    pub fn with_transformations(
        mut self,
        transformations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for t in transformations {
            self.transformations.insert(t.into());
        }
        self
    }

    /// Returns false when the transformation was already attached.
    pub fn attach_transformation(&mut self, transformation_id: &str) -> bool {
        self.transformations.insert(transformation_id.to_string())
    }

    /// Returns false when the transformation was not attached.
    pub fn detach_transformation(&mut self, transformation_id: &str) -> bool {
        self.transformations.shift_remove(transformation_id)
    }

    pub fn transformation_ids(&self) -> Vec<String> {
        self.transformations.iter().cloned().collect()
    }
}

/// Transformation algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationKind {
    Fpe,
    Masking,
    Tokenization,
}

/// A transformation and the roles allowed to use it.
///
/// Everything besides `allowed_roles` is carried so that rewriting the record
/// does not drop attributes the engine requires on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub id: String,

    #[serde(default)]
    pub backend: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransformationKind>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweak_source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking_character: Option<String>,

    #[serde(default)]
    pub deletion_allowed: bool,

    /// May contain wildcard entries such as `*` or `app-*`
    #[serde(default)]
    pub allowed_roles: IndexSet<String>,

    /// Type-specific attributes (`stores`, `mapping_mode`, `convergent`, ...)
    /// written back unchanged
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl Transformation {
    pub fn new(backend: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: backend.into(),
            kind: None,
            templates: Vec::new(),
            tweak_source: None,
            masking_character: None,
            deletion_allowed: false,
            allowed_roles: IndexSet::new(),
            extra: Map::new(),
        }
    }

    pub fn with_kind(mut self, kind: TransformationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.templates.push(template.into());
        self
    }

    pub fn with_allowed_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for r in roles {
            self.allowed_roles.insert(r.into());
        }
        self
    }

    /// Returns false when the role was already allowed.
    pub fn allow_role(&mut self, role_id: &str) -> bool {
        self.allowed_roles.insert(role_id.to_string())
    }

    /// Returns false when the role was not allowed.
    pub fn disallow_role(&mut self, role_id: &str) -> bool {
        self.allowed_roles.shift_remove(role_id)
    }

    pub fn allowed_role_ids(&self) -> Vec<String> {
        self.allowed_roles.iter().cloned().collect()
    }

    pub fn allows_all_roles(&self) -> bool {
        self.allowed_roles.iter().any(|r| r == "*")
    }
}

// ============================================================================
// Edit Intents & Results
// ============================================================================

/// Reciprocal change requested on a peer record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditAction {
    Add,
    Remove,
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditAction::Add => write!(f, "ADD"),
            EditAction::Remove => write!(f, "REMOVE"),
        }
    }
}

/// One required reciprocal change: `action` this entity on peer `id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditIntent {
    pub id: String,
    pub action: EditAction,
}

impl EditIntent {
    pub fn add(id: impl Into<String>) -> Self {
        Self { id: id.into(), action: EditAction::Add }
    }

    pub fn remove(id: impl Into<String>) -> Self {
        Self { id: id.into(), action: EditAction::Remove }
    }
}

/// The action a result is reported under.
///
/// `Create` only appears when a missing peer role had to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReciprocalAction {
    Add,
    Remove,
    Create,
}

impl From<EditAction> for ReciprocalAction {
    fn from(action: EditAction) -> Self {
        match action {
            EditAction::Add => ReciprocalAction::Add,
            EditAction::Remove => ReciprocalAction::Remove,
        }
    }
}

impl fmt::Display for ReciprocalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReciprocalAction::Add => write!(f, "ADD"),
            ReciprocalAction::Remove => write!(f, "REMOVE"),
            ReciprocalAction::Create => write!(f, "CREATE"),
        }
    }
}

/// How a single reciprocal update settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    /// HTTP 403
    PermissionDenied,
    /// Any other failure; `None` when no HTTP status was received
    Failed(Option<u16>),
}

impl Outcome {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(403) => Outcome::PermissionDenied,
            other => Outcome::Failed(other),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Outcome::Success)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success => None,
            Outcome::PermissionDenied => Some(403),
            Outcome::Failed(status) => *status,
        }
    }
}

/// Tagged result of one reciprocal update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReciprocalResult {
    pub id: String,
    pub action: ReciprocalAction,
    pub outcome: Outcome,
}

impl ReciprocalResult {
    pub fn success(intent: &EditIntent) -> Self {
        Self {
            id: intent.id.clone(),
            action: intent.action.into(),
            outcome: Outcome::Success,
        }
    }

    pub fn failure(intent: &EditIntent, status: Option<u16>) -> Self {
        Self {
            id: intent.id.clone(),
            action: intent.action.into(),
            outcome: Outcome::from_status(status),
        }
    }

    pub fn created(intent: &EditIntent) -> Self {
        Self {
            id: intent.id.clone(),
            action: ReciprocalAction::Create,
            outcome: Outcome::Success,
        }
    }

    pub fn create_failed(intent: &EditIntent, status: Option<u16>) -> Self {
        Self {
            id: intent.id.clone(),
            action: ReciprocalAction::Create,
            outcome: Outcome::from_status(status),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }

    pub fn is_permission_denied(&self) -> bool {
        self.outcome == Outcome::PermissionDenied
    }
}

/// Whether the primary record is being created or updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Create,
    #[default]
    Update,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Identifier must not be empty")]
    EmptyIdentifier,

    #[error("Identifier {0:?} contains a wildcard")]
    WildcardIdentifier(String),

    #[error("Identifier {0:?} is not a valid path segment")]
    ReservedIdentifier(String),
}

/// Validate an identifier used as a record name.
pub fn validate_identifier(id: &str) -> Result<(), RecordError> {
    if id.trim().is_empty() {
        return Err(RecordError::EmptyIdentifier);
    }
    if is_wildcard(id) {
        return Err(RecordError::WildcardIdentifier(id.to_string()));
    }
    // URL normalisation would resolve these to another endpoint
    if id == "." || id == ".." {
        return Err(RecordError::ReservedIdentifier(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_membership_is_idempotent() {
        let mut role = Role::new("transform", "payments").with_transformations(["ccn"]);

        assert!(!role.attach_transformation("ccn"));
        assert_eq!(role.transformation_ids(), vec!["ccn"]);

        assert!(role.attach_transformation("ssn"));
        assert_eq!(role.transformation_ids(), vec!["ccn", "ssn"]);

        assert!(role.detach_transformation("ccn"));
        assert!(!role.detach_transformation("ccn"));
        assert_eq!(role.transformation_ids(), vec!["ssn"]);
    }

    #[test]
    fn test_transformation_membership_keeps_order() {
        let mut t = Transformation::new("transform", "ccn").with_allowed_roles(["a", "b", "c"]);
        t.disallow_role("b");
        t.allow_role("d");
        t.allow_role("a");
        assert_eq!(t.allowed_role_ids(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(is_wildcard("*"));
        assert!(is_wildcard("app-*"));
        assert!(!is_wildcard("app"));

        let t = Transformation::new("transform", "ccn").with_allowed_roles(["*"]);
        assert!(t.allows_all_roles());
    }

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(Outcome::from_status(Some(403)), Outcome::PermissionDenied);
        assert_eq!(Outcome::from_status(Some(500)), Outcome::Failed(Some(500)));
        assert_eq!(Outcome::from_status(None), Outcome::Failed(None));
        assert_eq!(Outcome::PermissionDenied.status(), Some(403));
        assert!(!Outcome::Success.is_failure());
    }

    #[test]
    fn test_create_results_are_tagged_create() {
        let intent = EditIntent::add("missing-role");
        let result = ReciprocalResult::create_failed(&intent, Some(400));
        assert_eq!(result.action, ReciprocalAction::Create);
        assert_eq!(result.outcome, Outcome::Failed(Some(400)));
        assert_eq!(result.action.to_string(), "CREATE");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("payments").is_ok());
        assert!(matches!(validate_identifier("  "), Err(RecordError::EmptyIdentifier)));
        assert!(matches!(
            validate_identifier("app-*"),
            Err(RecordError::WildcardIdentifier(_))
        ));
        assert!(matches!(validate_identifier(""), Err(RecordError::EmptyIdentifier)));
        assert!(matches!(validate_identifier("."), Err(RecordError::ReservedIdentifier(_))));
        assert!(matches!(validate_identifier(".."), Err(RecordError::ReservedIdentifier(_))));
        assert!(validate_identifier("v1.2").is_ok());
    }

    #[test]
    fn test_transformation_serde_uses_type_key() {
        let t = Transformation::new("transform", "ccn")
            .with_kind(TransformationKind::Fpe)
            .with_template("builtin/creditcardnumber")
            .with_allowed_roles(["payments"]);

        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "fpe");
        assert_eq!(json["allowed_roles"], serde_json::json!(["payments"]));

        let back: Transformation = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_transformation_keeps_unmodelled_attributes() {
        let json = serde_json::json!({
            "id": "tok",
            "type": "tokenization",
            "stores": ["pg-store"],
            "convergent": true,
            "allowed_roles": ["a"]
        });

        let mut t: Transformation = serde_json::from_value(json).unwrap();
        assert_eq!(t.kind, Some(TransformationKind::Tokenization));
        assert_eq!(t.extra["stores"], serde_json::json!(["pg-store"]));
        assert!(!t.extra.contains_key("allowed_roles"));

        t.allow_role("b");
        let out = serde_json::to_value(&t).unwrap();
        assert_eq!(out["convergent"], true);
        assert_eq!(out["allowed_roles"], serde_json::json!(["a", "b"]));
    }
}
