//! In-memory record store
//!
//! Used for dry runs and tests. Failures can be injected per record and
//! operation with an HTTP status, which the store then reports exactly as the
//! Vault store would.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use vts_common::{RecordKind, Role, Transformation};

use crate::error::{Result, StoreError};
use crate::RecordStore;

/// Store operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Find,
    Create,
    Save,
}

/// Serializable contents of a [`MemoryRecordStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub transformations: Vec<Transformation>,
}

type Key = (String, String);

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    roles: DashMap<Key, Role>,
    transformations: DashMap<Key, Transformation>,
    failures: DashMap<(RecordKind, String, Operation), u16>,
    writes: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot, default_backend: &str) -> Self {
        let store = Self::new();
        for mut role in snapshot.roles {
            if role.backend.is_empty() {
                role.backend = default_backend.to_string();
            }
            store.insert_role(role);
        }
        for mut transformation in snapshot.transformations {
            if transformation.backend.is_empty() {
                transformation.backend = default_backend.to_string();
            }
            store.insert_transformation(transformation);
        }
        store
    }

    /// Current contents, sorted by backend and identifier
    pub fn snapshot(&self) -> Snapshot {
        let mut roles: Vec<Role> = self.roles.iter().map(|e| e.value().clone()).collect();
        roles.sort_by(|a, b| (&a.backend, &a.id).cmp(&(&b.backend, &b.id)));

        let mut transformations: Vec<Transformation> =
            self.transformations.iter().map(|e| e.value().clone()).collect();
        transformations.sort_by(|a, b| (&a.backend, &a.id).cmp(&(&b.backend, &b.id)));

        Snapshot { roles, transformations }
    }

    pub fn insert_role(&self, role: Role) {
        self.roles.insert((role.backend.clone(), role.id.clone()), role);
    }

    pub fn insert_transformation(&self, transformation: Transformation) {
        self.transformations.insert(
            (transformation.backend.clone(), transformation.id.clone()),
            transformation,
        );
    }

    pub fn role(&self, backend: &str, id: &str) -> Option<Role> {
        self.roles
            .get(&(backend.to_string(), id.to_string()))
            .map(|r| r.value().clone())
    }

    pub fn transformation(&self, backend: &str, id: &str) -> Option<Transformation> {
        self.transformations
            .get(&(backend.to_string(), id.to_string()))
            .map(|t| t.value().clone())
    }

    /// Make `operation` on record `id` fail with `status` from now on
    pub fn fail(&self, kind: RecordKind, id: impl Into<String>, operation: Operation, status: u16) {
        self.failures.insert((kind, id.into(), operation), status);
    }

    /// Shorthand for a 403 failure
    pub fn deny(&self, kind: RecordKind, id: impl Into<String>, operation: Operation) {
        self.fail(kind, id, operation, 403);
    }

    /// Number of successful creates and saves
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, kind: RecordKind, id: &str, operation: Operation) -> Result<()> {
        match self.failures.get(&(kind, id.to_string(), operation)) {
            Some(status) => {
                debug!(%kind, id, ?operation, status = *status, "Injected store failure");
                Err(StoreError::from_status(
                    *status,
                    format!("injected failure for {} {}", kind, id),
                ))
            }
            None => Ok(()),
        }
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_role(&self, backend: &str, id: &str) -> Result<Role> {
        self.check(RecordKind::Role, id, Operation::Find)?;
        self.role(backend, id)
            .ok_or_else(|| StoreError::NotFound(format!("role {}/{}", backend, id)))
    }

    async fn find_transformation(&self, backend: &str, id: &str) -> Result<Transformation> {
        self.check(RecordKind::Transformation, id, Operation::Find)?;
        self.transformation(backend, id)
            .ok_or_else(|| StoreError::NotFound(format!("transformation {}/{}", backend, id)))
    }

    async fn create_role(&self, role: &Role) -> Result<()> {
        self.check(RecordKind::Role, &role.id, Operation::Create)?;
        let key = (role.backend.clone(), role.id.clone());
        if self.roles.contains_key(&key) {
            return Err(StoreError::from_status(409, format!("role {} already exists", role.id)));
        }
        self.roles.insert(key, role.clone());
        self.record_write();
        Ok(())
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        self.check(RecordKind::Role, &role.id, Operation::Save)?;
        self.insert_role(role.clone());
        self.record_write();
        Ok(())
    }

    async fn create_transformation(&self, transformation: &Transformation) -> Result<()> {
        self.check(RecordKind::Transformation, &transformation.id, Operation::Create)?;
        let key = (transformation.backend.clone(), transformation.id.clone());
        if self.transformations.contains_key(&key) {
            return Err(StoreError::from_status(
                409,
                format!("transformation {} already exists", transformation.id),
            ));
        }
        self.transformations.insert(key, transformation.clone());
        self.record_write();
        Ok(())
    }

    async fn save_transformation(&self, transformation: &Transformation) -> Result<()> {
        self.check(RecordKind::Transformation, &transformation.id, Operation::Save)?;
        self.insert_transformation(transformation.clone());
        self.record_write();
        Ok(())
    }
}
