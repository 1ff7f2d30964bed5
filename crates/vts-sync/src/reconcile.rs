//! Reciprocal update orchestration
//!
//! Each intent becomes one independent fetch-mutate-save against the store.
//! The whole batch is joined with `join_all`: every operation runs to
//! completion and reports a tagged [`ReciprocalResult`], so one failing peer
//! never stops the others.

use futures::future::join_all;
use tracing::{debug, info, info_span, warn, Instrument};

use vts_common::{EditAction, EditIntent, ReciprocalResult, Role, Transformation};
use vts_store::RecordStore;

/// Apply `action` for `role_id` to a transformation's allowed roles.
///
/// Idempotent. Returns whether the list changed.
pub fn apply_to_transformation(transformation: &mut Transformation, role_id: &str, action: EditAction) -> bool {
    match action {
        EditAction::Add => transformation.allow_role(role_id),
        EditAction::Remove => transformation.disallow_role(role_id),
    }
}

/// Apply `action` for `transformation_id` to a role's transformations.
///
/// Idempotent. Returns whether the list changed.
pub fn apply_to_role(role: &mut Role, transformation_id: &str, action: EditAction) -> bool {
    match action {
        EditAction::Add => role.attach_transformation(transformation_id),
        EditAction::Remove => role.detach_transformation(transformation_id),
    }
}

/// Add or remove `role_id` in the allowed roles of every transformation named by `intents`.
pub async fn update_transformations_for_role(
    store: &dyn RecordStore,
    backend: &str,
    role_id: &str,
    intents: &[EditIntent],
) -> Vec<ReciprocalResult> {
    let span = info_span!("reconcile", backend, role = role_id, intents = intents.len());

    async {
        let results = join_all(
            intents
                .iter()
                .map(|intent| update_transformation(store, backend, role_id, intent)),
        )
        .await;

        log_summary(&results);
        results
    }
    .instrument(span)
    .await
}

async fn update_transformation(
    store: &dyn RecordStore,
    backend: &str,
    role_id: &str,
    intent: &EditIntent,
) -> ReciprocalResult {
    let mut transformation = match store.find_transformation(backend, &intent.id).await {
        Ok(t) => t,
        Err(e) => {
            warn!(transformation = %intent.id, action = %intent.action, error = %e, "Failed to load transformation");
            return ReciprocalResult::failure(intent, e.status());
        }
    };

    let changed = apply_to_transformation(&mut transformation, role_id, intent.action);
    transformation.backend = backend.to_string();

    match store.save_transformation(&transformation).await {
        Ok(()) => {
            debug!(transformation = %intent.id, action = %intent.action, changed, "Updated allowed_roles");
            ReciprocalResult::success(intent)
        }
        Err(e) => {
            warn!(transformation = %intent.id, action = %intent.action, error = %e, "Failed to save transformation");
            ReciprocalResult::failure(intent, e.status())
        }
    }
}

/// Add or remove `transformation_id` in the transformations of every role named by `intents`.
///
/// A role that cannot be loaded for an ADD, for any reason other than a
/// permission denial, is treated as missing and created with just this
/// transformation attached.
pub async fn update_roles_for_transformation(
    store: &dyn RecordStore,
    backend: &str,
    transformation_id: &str,
    intents: &[EditIntent],
) -> Vec<ReciprocalResult> {
    let span = info_span!(
        "reconcile",
        backend,
        transformation = transformation_id,
        intents = intents.len()
    );

    async {
        let results = join_all(
            intents
                .iter()
                .map(|intent| update_or_create_role(store, backend, transformation_id, intent)),
        )
        .await;

        log_summary(&results);
        results
    }
    .instrument(span)
    .await
}

async fn update_or_create_role(
    store: &dyn RecordStore,
    backend: &str,
    transformation_id: &str,
    intent: &EditIntent,
) -> ReciprocalResult {
    match store.find_role(backend, &intent.id).await {
        Ok(mut role) => {
            let changed = apply_to_role(&mut role, transformation_id, intent.action);
            role.backend = backend.to_string();

            match store.save_role(&role).await {
                Ok(()) => {
                    debug!(role = %intent.id, action = %intent.action, changed, "Updated role transformations");
                    ReciprocalResult::success(intent)
                }
                Err(e) => {
                    warn!(role = %intent.id, action = %intent.action, error = %e, "Failed to save role");
                    ReciprocalResult::failure(intent, e.status())
                }
            }
        }
        Err(e) if !e.is_permission_denied() && intent.action == EditAction::Add => {
            info!(role = %intent.id, error = %e, "Role not found, creating it");
            let role = Role::new(backend, &intent.id).with_transformations([transformation_id]);

            match store.create_role(&role).await {
                Ok(()) => ReciprocalResult::created(intent),
                Err(e) => {
                    warn!(role = %intent.id, error = %e, "Failed to create role");
                    ReciprocalResult::create_failed(intent, e.status())
                }
            }
        }
        Err(e) => {
            warn!(role = %intent.id, action = %intent.action, error = %e, "Failed to load role");
            ReciprocalResult::failure(intent, e.status())
        }
    }
}

fn log_summary(results: &[ReciprocalResult]) {
    let failed = results.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        warn!(total = results.len(), failed, "Reciprocal updates settled with failures");
    } else {
        info!(total = results.len(), "Reciprocal updates settled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vts_common::{Outcome, RecordKind, ReciprocalAction};
    use vts_store::{MemoryRecordStore, Operation};

    const BACKEND: &str = "transform";

    #[test]
    fn test_apply_is_idempotent() {
        let mut t = Transformation::new(BACKEND, "ccn").with_allowed_roles(["payments"]);

        assert!(!apply_to_transformation(&mut t, "payments", EditAction::Add));
        assert_eq!(t.allowed_role_ids(), vec!["payments"]);

        assert!(apply_to_transformation(&mut t, "payments", EditAction::Remove));
        assert!(!apply_to_transformation(&mut t, "payments", EditAction::Remove));
        assert!(t.allowed_roles.is_empty());

        let mut role = Role::new(BACKEND, "payments");
        assert!(apply_to_role(&mut role, "ccn", EditAction::Add));
        assert!(!apply_to_role(&mut role, "ccn", EditAction::Add));
        assert_eq!(role.transformation_ids(), vec!["ccn"]);
    }

    #[tokio::test]
    async fn test_empty_batch_settles_immediately() {
        let store = MemoryRecordStore::new();
        let results = update_transformations_for_role(&store, BACKEND, "payments", &[]).await;
        assert!(results.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let store = MemoryRecordStore::new();
        store.insert_transformation(Transformation::new(BACKEND, "t1"));
        store.insert_transformation(Transformation::new(BACKEND, "t2").with_allowed_roles(["payments"]));
        store.insert_transformation(Transformation::new(BACKEND, "t3"));
        store.deny(RecordKind::Transformation, "t1", Operation::Save);

        let intents = vec![EditIntent::add("t1"), EditIntent::remove("t2"), EditIntent::add("t3")];
        let results = update_transformations_for_role(&store, BACKEND, "payments", &intents).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, Outcome::PermissionDenied);
        assert_eq!(results[1].outcome, Outcome::Success);
        assert_eq!(results[2].outcome, Outcome::Success);

        assert!(store.transformation(BACKEND, "t2").unwrap().allowed_roles.is_empty());
        assert_eq!(store.transformation(BACKEND, "t3").unwrap().allowed_role_ids(), vec!["payments"]);
    }

    #[tokio::test]
    async fn test_missing_transformation_is_reported_not_created() {
        let store = MemoryRecordStore::new();
        let results =
            update_transformations_for_role(&store, BACKEND, "payments", &[EditIntent::add("ghost")]).await;

        assert_eq!(results[0].action, ReciprocalAction::Add);
        assert_eq!(results[0].outcome, Outcome::Failed(Some(404)));
        assert!(store.transformation(BACKEND, "ghost").is_none());
    }

    #[tokio::test]
    async fn test_missing_role_on_add_is_created() {
        let store = MemoryRecordStore::new();
        let results =
            update_roles_for_transformation(&store, BACKEND, "ccn", &[EditIntent::add("missing-role")]).await;

        assert_eq!(results[0].action, ReciprocalAction::Create);
        assert_eq!(results[0].outcome, Outcome::Success);
        assert_eq!(
            store.role(BACKEND, "missing-role").unwrap().transformation_ids(),
            vec!["ccn"]
        );
    }

    #[tokio::test]
    async fn test_missing_role_on_remove_is_a_failure() {
        let store = MemoryRecordStore::new();
        let results =
            update_roles_for_transformation(&store, BACKEND, "ccn", &[EditIntent::remove("gone")]).await;

        assert_eq!(results[0].action, ReciprocalAction::Remove);
        assert_eq!(results[0].outcome, Outcome::Failed(Some(404)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_role_fetch_does_not_create() {
        let store = MemoryRecordStore::new();
        store.deny(RecordKind::Role, "locked", Operation::Find);

        let results =
            update_roles_for_transformation(&store, BACKEND, "ccn", &[EditIntent::add("locked")]).await;

        assert_eq!(results[0].action, ReciprocalAction::Add);
        assert_eq!(results[0].outcome, Outcome::PermissionDenied);
        assert!(store.role(BACKEND, "locked").is_none());
    }
}
