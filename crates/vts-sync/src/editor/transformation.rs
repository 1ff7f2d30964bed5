use vts_common::{validate_identifier, RecordKind, SaveMode, Transformation};

use super::base::validate_members;
use super::{EditableRecord, EditorBase, EditorError, FormState, SaveReport};
use crate::advisory::classify_transformation_results;
use crate::reconcile::update_roles_for_transformation;

/// Edits a transformation and keeps the transformation lists of its roles in step
pub struct TransformationEditor {
    base: EditorBase,
    form: FormState<Transformation>,
}

impl TransformationEditor {
    /// Edit an existing transformation
    pub async fn load(base: EditorBase, id: &str) -> Result<Self, EditorError> {
        validate_identifier(id)?;

        let mut transformation = base
            .store()
            .find_transformation(base.backend(), id)
            .await
            .map_err(|source| EditorError::Load {
                kind: RecordKind::Transformation,
                id: id.to_string(),
                source,
            })?;
        transformation.set_backend(base.backend());

        Ok(Self {
            base,
            form: FormState::loaded(transformation),
        })
    }

    /// Edit a transformation that does not exist yet
    pub fn create(base: EditorBase, mut transformation: Transformation) -> Result<Self, EditorError> {
        validate_identifier(&transformation.id)?;
        transformation.set_backend(base.backend());

        Ok(Self {
            base,
            form: FormState::fresh(transformation),
        })
    }

    pub fn model(&self) -> &Transformation {
        self.form.model()
    }

    pub fn model_mut(&mut self) -> &mut Transformation {
        self.form.model_mut()
    }

    pub fn initial_allowed_roles(&self) -> Option<&[String]> {
        self.form.initial_members()
    }

    /// Replace the allowed roles, wildcards included
    pub fn set_allowed_roles(
        &mut self,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), EditorError> {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        validate_members(&roles)?;

        let transformation = self.form.model_mut();
        transformation.allowed_roles = roles.into_iter().collect();
        Ok(())
    }

    /// Save the transformation, then add or remove it in each affected role,
    /// creating roles that do not exist yet.
    pub async fn create_or_update(&mut self, mode: SaveMode) -> Result<SaveReport, EditorError> {
        self.form.apply_changes(self.base.store(), mode).await?;

        let intents = self.form.intents();
        let transformation_id = self.form.model().id.clone();

        let results = update_roles_for_transformation(
            self.base.store(),
            self.base.backend(),
            &transformation_id,
            &intents,
        )
        .await;

        let advisory = match classify_transformation_results(&results) {
            Some(kind) => Some(
                self.base
                    .notify(kind, format!("transformation/{}", transformation_id), &results)
                    .await,
            ),
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
