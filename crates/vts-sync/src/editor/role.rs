use vts_common::{validate_identifier, RecordKind, Role, SaveMode};

use super::base::validate_members;
use super::{EditableRecord, EditorBase, EditorError, FormState, SaveReport};
use crate::advisory::classify_role_results;
use crate::reconcile::update_transformations_for_role;

/// Edits a role and keeps `allowed_roles` of its transformations in step
pub struct RoleEditor {
    base: EditorBase,
    form: FormState<Role>,
}

impl RoleEditor {
    /// Edit an existing role
    pub async fn load(base: EditorBase, id: &str) -> Result<Self, EditorError> {
        validate_identifier(id)?;

        let mut role = base
            .store()
            .find_role(base.backend(), id)
            .await
            .map_err(|source| EditorError::Load {
                kind: RecordKind::Role,
                id: id.to_string(),
                source,
            })?;
        role.set_backend(base.backend());

        Ok(Self {
            base,
            form: FormState::loaded(role),
        })
    }

    /// Edit a role that does not exist yet
    pub fn create(base: EditorBase, id: &str) -> Result<Self, EditorError> {
        validate_identifier(id)?;
        let role = Role::new(base.backend(), id);

        Ok(Self {
            base,
            form: FormState::fresh(role),
        })
    }

    pub fn model(&self) -> &Role {
        self.form.model()
    }

    pub fn model_mut(&mut self) -> &mut Role {
        self.form.model_mut()
    }

    pub fn initial_transformations(&self) -> Option<&[String]> {
        self.form.initial_members()
    }

    /// Replace the role's transformation list
    pub fn set_transformations(
        &mut self,
        transformations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), EditorError> {
        let transformations: Vec<String> = transformations.into_iter().map(Into::into).collect();
        validate_members(&transformations)?;

        let role = self.form.model_mut();
        role.transformations = transformations.into_iter().collect();
        Ok(())
    }

    /// Save the role, then add or remove it in each affected transformation.
    ///
    /// Reciprocal failures are reported through the advisory, never as `Err`.
    pub async fn create_or_update(&mut self, mode: SaveMode) -> Result<SaveReport, EditorError> {
        self.form.apply_changes(self.base.store(), mode).await?;

        // The caller's mode only matters for a role saved without a snapshot
        let advisory_mode = if self.form.has_snapshot() { SaveMode::Update } else { mode };
        let intents = self.form.intents();
        let role_id = self.form.model().id.clone();

        let results = update_transformations_for_role(
            self.base.store(),
            self.base.backend(),
            &role_id,
            &intents,
        )
        .await;

        let advisory = match classify_role_results(advisory_mode, &results) {
            Some(kind) => Some(self.base.notify(kind, format!("role/{}", role_id), &results).await),
            None => None,
        };

        self.form.commit();

        Ok(SaveReport {
            mode,
            intents,
            results,
            advisory,
        })
    }
}
