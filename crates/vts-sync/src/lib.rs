//! # Reciprocal membership sync for Vault Transform
//!
//! Roles list the transformations they may use; transformations list the roles
//! allowed to use them. Editing either side through [`RoleEditor`] or
//! [`TransformationEditor`] saves the record and then mirrors the change onto
//! every affected peer:
//!
//! 1. diff the membership snapshot against the edited list ([`diff`])
//! 2. fetch, mutate and save every peer concurrently ([`reconcile`])
//! 3. classify failures into at most one advisory ([`advisory`])
//! 4. deliver the advisory as a sticky notice ([`notification`])
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vts_common::SaveMode;
//! use vts_store::MemoryRecordStore;
//! use vts_sync::{EditorBase, LogNotificationSink, RoleEditor};
//!
//! # async fn run() -> Result<(), vts_sync::EditorError> {
//! let base = EditorBase::new(
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(LogNotificationSink),
//!     "transform",
//! );
//!
//! let mut editor = RoleEditor::load(base, "payments").await?;
//! editor.set_transformations(["ccn", "ssn"])?;
//! let report = editor.create_or_update(SaveMode::Update).await?;
//! assert!(report.advisory.is_none() || !report.is_fully_synced());
//! # Ok(())
//! # }
//! ```

pub mod advisory;
pub mod diff;
pub mod editor;
pub mod notification;
pub mod reconcile;

pub use advisory::{classify_role_results, classify_transformation_results, Advisory, AdvisoryKind};
pub use diff::{all_added, diff_memberships};
pub use editor::{EditorBase, EditorError, RoleEditor, SaveReport, TransformationEditor};
pub use notification::{
    create_notification_sink, CollectingNotificationSink, FanoutNotificationSink,
    LogNotificationSink, NoOpNotificationSink, NotificationSink, WebhookNotificationSink,
};
