//! # Record store for transform roles and transformations
//!
//! The sync editors only see the [`RecordStore`] trait. Two implementations:
//!
//! - [`VaultRecordStore`]: talks to the Vault HTTP API
//! - [`MemoryRecordStore`]: in-process, with injectable failures

use async_trait::async_trait;
use vts_common::{Role, Transformation};

pub mod config;
pub mod error;
pub mod memory;
pub mod vault;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::{MemoryRecordStore, Operation, Snapshot};
pub use vault::VaultRecordStore;

/// Remote store holding role and transformation records.
///
/// Concurrent writes to the same record are serialized by the store itself;
/// callers take no locks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a role by identifier
    async fn find_role(&self, backend: &str, id: &str) -> Result<Role>;

    /// Fetch a transformation by identifier
    async fn find_transformation(&self, backend: &str, id: &str) -> Result<Transformation>;

    /// Create a role that does not exist yet
    async fn create_role(&self, role: &Role) -> Result<()>;

    /// Persist an existing role
    async fn save_role(&self, role: &Role) -> Result<()>;

    /// Create a transformation that does not exist yet
    async fn create_transformation(&self, transformation: &Transformation) -> Result<()>;

    /// Persist an existing transformation
    async fn save_transformation(&self, transformation: &Transformation) -> Result<()>;
}
