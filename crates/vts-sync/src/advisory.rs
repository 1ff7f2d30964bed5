//! Advisory selection
//!
//! Maps the settled results of a reciprocal batch to at most one fixed message.
//! Reciprocal failures never fail the primary save; they only produce an advisory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vts_common::{ReciprocalAction, ReciprocalResult, SaveMode};

/// Fixed advisory variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisoryKind {
    /// Role was created with transformations, but they were not updated
    RoleCreateNotPropagated,
    /// 403 on both an ADD and a REMOVE
    RoleAddAndRemoveDenied,
    /// 403 on an ADD
    RoleAddDenied,
    /// 403 on a REMOVE
    RoleRemoveDenied,
    /// Failures that fit none of the above
    RoleEditNotPropagated,
    /// Every failure was a 403
    TransformationEditDenied,
    /// At least one failure was not a 403
    TransformationEditsIncomplete,
}

impl AdvisoryKind {
    pub fn message(&self) -> &'static str {
        match self {
            AdvisoryKind::RoleCreateNotPropagated => {
                "Transformations have been attached to this role, but the role was not added to those transformations’ allowed_roles due to a lack of permissions."
            }
            AdvisoryKind::RoleAddAndRemoveDenied => {
                "This role was edited to both add and remove transformations; however, this role was not added or removed from those transformations’ allowed_roles due to a lack of permissions."
            }
            AdvisoryKind::RoleAddDenied => {
                "This role was edited to include new transformations, but this role was not added to those transformations’ allowed_roles due to a lack of permissions."
            }
            AdvisoryKind::RoleRemoveDenied => {
                "This role was edited to remove transformations, but this role was not removed from those transformations’ allowed_roles due to a lack of permissions."
            }
            AdvisoryKind::RoleEditNotPropagated => {
                "The edits to this role were successful, but allowed_roles for its transformations was not edited due to a lack of permissions."
            }
            AdvisoryKind::TransformationEditDenied => {
                "The edits to this transformation were successful, but transformations for its roles was not edited due to a lack of permissions."
            }
            AdvisoryKind::TransformationEditsIncomplete => {
                "You've edited the allowed_roles for this transformation. However, the corresponding edits to some roles' transformations were not made"
            }
        }
    }
}

/// A persistent, informational notice about reciprocal edits that did not apply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    pub kind: AdvisoryKind,
    pub message: String,
    /// The edited record, e.g. `role/payments`
    pub source: String,
    /// Peers whose reciprocal edit failed
    pub failed: Vec<ReciprocalResult>,
    pub created_at: DateTime<Utc>,
}

impl Advisory {
    pub fn new(kind: AdvisoryKind, source: impl Into<String>, results: &[ReciprocalResult]) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            message: kind.message().to_string(),
            source: source.into(),
            failed: results.iter().filter(|r| r.is_failure()).cloned().collect(),
            created_at: Utc::now(),
        }
    }
}

/// Pick the advisory for a role save, `None` when every reciprocal edit applied.
pub fn classify_role_results(mode: SaveMode, results: &[ReciprocalResult]) -> Option<AdvisoryKind> {
    if !results.iter().any(ReciprocalResult::is_failure) {
        return None;
    }

    if mode == SaveMode::Create {
        return Some(AdvisoryKind::RoleCreateNotPropagated);
    }

    let denied = |action: ReciprocalAction| {
        results
            .iter()
            .any(|r| r.is_permission_denied() && r.action == action)
    };

    Some(match (denied(ReciprocalAction::Add), denied(ReciprocalAction::Remove)) {
        (true, true) => AdvisoryKind::RoleAddAndRemoveDenied,
        (true, false) => AdvisoryKind::RoleAddDenied,
        (false, true) => AdvisoryKind::RoleRemoveDenied,
        (false, false) => AdvisoryKind::RoleEditNotPropagated,
    })
}

/// Pick the advisory for a transformation save, `None` when every reciprocal edit applied.
pub fn classify_transformation_results(results: &[ReciprocalResult]) -> Option<AdvisoryKind> {
    let mut failures = results.iter().filter(|r| r.is_failure()).peekable();
    failures.peek()?;

    if failures.any(|r| !r.is_permission_denied()) {
        Some(AdvisoryKind::TransformationEditsIncomplete)
    } else {
        Some(AdvisoryKind::TransformationEditDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vts_common::{EditIntent, Outcome};

    fn ok(intent: EditIntent) -> ReciprocalResult {
        ReciprocalResult::success(&intent)
    }

    fn failed(intent: EditIntent, status: u16) -> ReciprocalResult {
        ReciprocalResult::failure(&intent, Some(status))
    }

    #[test]
    fn test_no_results_no_advisory() {
        assert_eq!(classify_role_results(SaveMode::Update, &[]), None);
        assert_eq!(classify_role_results(SaveMode::Create, &[]), None);
        assert_eq!(classify_transformation_results(&[]), None);
    }

    #[test]
    fn test_all_successful_no_advisory() {
        let results = vec![ok(EditIntent::add("t1")), ok(EditIntent::remove("t2"))];
        assert_eq!(classify_role_results(SaveMode::Update, &results), None);
        assert_eq!(classify_transformation_results(&results), None);
    }

    #[test]
    fn test_add_ok_remove_denied_selects_removing_message() {
        let results = vec![ok(EditIntent::add("t1")), failed(EditIntent::remove("t2"), 403)];
        let kind = classify_role_results(SaveMode::Update, &results).unwrap();
        assert_eq!(kind, AdvisoryKind::RoleRemoveDenied);
        assert!(kind.message().contains("remove transformations"));
        assert!(kind.message().contains("lack of permissions"));
    }

    #[test]
    fn test_role_add_denied() {
        let results = vec![failed(EditIntent::add("t1"), 403)];
        assert_eq!(
            classify_role_results(SaveMode::Update, &results),
            Some(AdvisoryKind::RoleAddDenied)
        );
    }

    #[test]
    fn test_role_add_and_remove_denied() {
        let results = vec![failed(EditIntent::add("t1"), 403), failed(EditIntent::remove("t2"), 403)];
        assert_eq!(
            classify_role_results(SaveMode::Update, &results),
            Some(AdvisoryKind::RoleAddAndRemoveDenied)
        );
    }

    #[test]
    fn test_role_create_mode_wins() {
        let results = vec![failed(EditIntent::add("t1"), 403), failed(EditIntent::remove("t2"), 403)];
        assert_eq!(
            classify_role_results(SaveMode::Create, &results),
            Some(AdvisoryKind::RoleCreateNotPropagated)
        );
    }

    #[test]
    fn test_role_non_permission_failure_is_generic() {
        let results = vec![failed(EditIntent::add("t1"), 500)];
        assert_eq!(
            classify_role_results(SaveMode::Update, &results),
            Some(AdvisoryKind::RoleEditNotPropagated)
        );

        let transport = vec![ReciprocalResult::failure(&EditIntent::add("t1"), None)];
        assert_eq!(transport[0].outcome, Outcome::Failed(None));
        assert_eq!(
            classify_role_results(SaveMode::Update, &transport),
            Some(AdvisoryKind::RoleEditNotPropagated)
        );
    }

    #[test]
    fn test_transformation_all_denied() {
        let results = vec![failed(EditIntent::add("r1"), 403), ok(EditIntent::remove("r2"))];
        assert_eq!(
            classify_transformation_results(&results),
            Some(AdvisoryKind::TransformationEditDenied)
        );
    }

    #[test]
    fn test_transformation_any_other_failure_is_generic() {
        let results = vec![
            failed(EditIntent::add("r1"), 403),
            ReciprocalResult::create_failed(&EditIntent::add("r2"), Some(400)),
        ];
        assert_eq!(
            classify_transformation_results(&results),
            Some(AdvisoryKind::TransformationEditsIncomplete)
        );
    }

    #[test]
    fn test_advisory_keeps_only_failures() {
        let results = vec![ok(EditIntent::add("t1")), failed(EditIntent::remove("t2"), 403)];
        let advisory = Advisory::new(AdvisoryKind::RoleRemoveDenied, "role/payments", &results);
        assert_eq!(advisory.failed.len(), 1);
        assert_eq!(advisory.failed[0].id, "t2");
        assert_eq!(advisory.message, AdvisoryKind::RoleRemoveDenied.message());
    }
}
