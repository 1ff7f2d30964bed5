//! Shared editor plumbing: form state and primary save.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use vts_common::{
    is_wildcard, validate_identifier, EditIntent, RecordError, RecordKind, ReciprocalResult, Role,
    SaveMode, Transformation,
};
use vts_store::RecordStore;

use super::EditorError;
use crate::advisory::{Advisory, AdvisoryKind};
use crate::diff::{all_added, diff_memberships};
use crate::notification::NotificationSink;

/// A record whose membership list is mirrored on its peers
#[async_trait]
pub trait EditableRecord: Clone + Send + Sync {
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn set_backend(&mut self, backend: &str);

    /// The membership list peers mirror
    fn members(&self) -> Vec<String>;

    /// Write the record itself
    async fn persist(&self, store: &dyn RecordStore, mode: SaveMode) -> vts_store::Result<()>;
}

#[async_trait]
impl EditableRecord for Role {
    const KIND: RecordKind = RecordKind::Role;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_backend(&mut self, backend: &str) {
        self.backend = backend.to_string();
    }

    fn members(&self) -> Vec<String> {
        self.transformation_ids()
    }

    async fn persist(&self, store: &dyn RecordStore, mode: SaveMode) -> vts_store::Result<()> {
        match mode {
            SaveMode::Create => store.create_role(self).await,
            SaveMode::Update => store.save_role(self).await,
        }
    }
}

#[async_trait]
impl EditableRecord for Transformation {
    const KIND: RecordKind = RecordKind::Transformation;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_backend(&mut self, backend: &str) {
        self.backend = backend.to_string();
    }

    fn members(&self) -> Vec<String> {
        self.allowed_role_ids()
    }

    async fn persist(&self, store: &dyn RecordStore, mode: SaveMode) -> vts_store::Result<()> {
        match mode {
            SaveMode::Create => store.create_transformation(self).await,
            SaveMode::Update => store.save_transformation(self).await,
        }
    }
}

/// Reject membership entries that cannot name a peer record. Wildcards pass.
pub(crate) fn validate_members<I: AsRef<str>>(
    members: impl IntoIterator<Item = I>,
) -> Result<(), RecordError> {
    members.into_iter().try_for_each(|member| {
        let member = member.as_ref();
        if is_wildcard(member) {
            Ok(())
        } else {
            validate_identifier(member)
        }
    })
}

/// The record being edited plus its membership as of load time
#[derive(Debug, Clone)]
pub struct FormState<R> {
    model: R,
    initial: Option<Vec<String>>,
}

impl<R: EditableRecord> FormState<R> {
    /// A record read from the store; its current members become the snapshot
    pub fn loaded(model: R) -> Self {
        let initial = Some(model.members());
        Self { model, initial }
    }

    /// A record that does not exist yet; there is no snapshot
    pub fn fresh(model: R) -> Self {
        Self { model, initial: None }
    }

    pub fn model(&self) -> &R {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut R {
        &mut self.model
    }

    pub fn initial_members(&self) -> Option<&[String]> {
        self.initial.as_deref()
    }

    pub fn has_snapshot(&self) -> bool {
        self.initial.is_some()
    }

    /// Reciprocal edits implied by the changes since the snapshot
    pub fn intents(&self) -> Vec<EditIntent> {
        let current = self.model.members();
        match &self.initial {
            Some(initial) => diff_memberships(initial, &current),
            None => all_added(&current),
        }
    }

    /// Save the record itself. Reconciliation must only follow an `Ok`.
    pub async fn apply_changes(&self, store: &dyn RecordStore, mode: SaveMode) -> Result<(), EditorError> {
        validate_members(self.model.members())?;

        self.model
            .persist(store, mode)
            .await
            .map_err(|source| EditorError::PrimarySave {
                kind: R::KIND,
                id: self.model.id().to_string(),
                source,
            })?;

        info!(kind = %R::KIND, id = self.model.id(), ?mode, "Saved record");
        Ok(())
    }

    /// Take the saved membership as the new snapshot
    pub fn commit(&mut self) {
        self.initial = Some(self.model.members());
    }
}

/// Collaborators shared by both editors
#[derive(Clone)]
pub struct EditorBase {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn NotificationSink>,
    backend: String,
}

impl EditorBase {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn NotificationSink>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            backend: backend.into().trim_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Build the advisory and deliver it as a sticky notice
    pub(crate) async fn notify(
        &self,
        kind: AdvisoryKind,
        source: String,
        results: &[ReciprocalResult],
    ) -> Advisory {
        let advisory = Advisory::new(kind, source, results);
        self.notifier.sticky_info(&advisory).await;
        advisory
    }
}
