//! Role and transformation editors
//!
//! An editor owns one record and the membership snapshot taken when it was
//! loaded. `create_or_update` saves the record, then mirrors the membership
//! changes onto every affected peer and reports the outcome.

mod base;
mod role;
mod transformation;

pub use base::{EditableRecord, EditorBase, FormState};
pub use role::RoleEditor;
pub use transformation::TransformationEditor;

use thiserror::Error;
use vts_common::{EditIntent, RecordError, RecordKind, ReciprocalResult, SaveMode};
use vts_store::StoreError;

use crate::advisory::Advisory;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Failed to load {kind} {id}: {source}")]
    Load {
        kind: RecordKind,
        id: String,
        #[source]
        source: StoreError,
    },

    /// The record itself could not be saved; nothing was reconciled
    #[error("Failed to save {kind} {id}: {source}")]
    PrimarySave {
        kind: RecordKind,
        id: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    InvalidRecord(#[from] RecordError),
}

/// What a save did beyond the record itself
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub mode: SaveMode,
    pub intents: Vec<EditIntent>,
    pub results: Vec<ReciprocalResult>,
    /// Set when at least one reciprocal edit did not apply
    pub advisory: Option<Advisory>,
}

impl SaveReport {
    pub fn failures(&self) -> impl Iterator<Item = &ReciprocalResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn is_fully_synced(&self) -> bool {
        self.failures().next().is_none()
    }
}
