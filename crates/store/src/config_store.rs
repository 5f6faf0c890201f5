use std::sync::Arc;

use chatrelay_core::{StoreError, WorkspaceConfig, WorkspaceId};

use crate::object::ObjectStore;

/// Typed view over the blob store: one JSON-serialized `WorkspaceConfig`
/// per workspace id.
///
/// A record that fails to decode is reported as `Transient`, not as data
/// corruption the caller must handle specially; the resolver treats it the
/// same as a connectivity failure and falls back to process defaults.
#[derive(Clone)]
pub struct ConfigStore {
    objects: Arc<dyn ObjectStore>,
}

impl ConfigStore {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    pub async fn load(&self, workspace: &WorkspaceId) -> Result<WorkspaceConfig, StoreError> {
        let body = self.objects.get(workspace.as_str()).await?;
        serde_json::from_slice(&body)
            .map_err(|error| StoreError::Transient(format!("record decode failed: {error}")))
    }

    /// Overwrites any prior record for the workspace wholesale.
    pub async fn save(
        &self,
        workspace: &WorkspaceId,
        record: &WorkspaceConfig,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec(record)
            .map_err(|error| StoreError::Transient(format!("record encode failed: {error}")))?;
        self.objects.put(workspace.as_str(), body).await
    }

    /// Idempotent; removing a workspace that has no record is not an error.
    pub async fn remove(&self, workspace: &WorkspaceId) -> Result<(), StoreError> {
        self.objects.delete(workspace.as_str()).await
    }

    pub async fn exists(&self, workspace: &WorkspaceId) -> bool {
        self.objects.get(workspace.as_str()).await.is_ok()
    }
}
