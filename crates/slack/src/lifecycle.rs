use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, info};

use chatrelay_core::{StoreError, WorkspaceId};
use chatrelay_store::ConfigStore;

/// Platform-issued installation grants, keyed by workspace.
///
/// The real implementation sits on Slack's OAuth installation storage;
/// only the deletions surface here because teardown is all this bot needs.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    async fn delete_installation(
        &self,
        workspace: &WorkspaceId,
        user_id: &str,
    ) -> Result<(), StoreError>;

    async fn delete_bot(&self, workspace: &WorkspaceId) -> Result<(), StoreError>;

    /// Removes every grant for the workspace, users and bot alike.
    async fn delete_all(&self, workspace: &WorkspaceId) -> Result<(), StoreError>;
}

#[derive(Default)]
struct InstallationState {
    user_grants: HashSet<String>,
    bot_installed: bool,
}

#[derive(Default)]
pub struct MemoryInstallationStore {
    workspaces: RwLock<HashMap<String, InstallationState>>,
}

impl MemoryInstallationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn install_user(&self, workspace: &WorkspaceId, user_id: &str) {
        let mut workspaces = self.workspaces.write().await;
        workspaces
            .entry(workspace.as_str().to_owned())
            .or_default()
            .user_grants
            .insert(user_id.to_owned());
    }

    pub async fn install_bot(&self, workspace: &WorkspaceId) {
        let mut workspaces = self.workspaces.write().await;
        workspaces.entry(workspace.as_str().to_owned()).or_default().bot_installed = true;
    }

    pub async fn user_count(&self, workspace: &WorkspaceId) -> usize {
        let workspaces = self.workspaces.read().await;
        workspaces.get(workspace.as_str()).map_or(0, |state| state.user_grants.len())
    }

    pub async fn bot_installed(&self, workspace: &WorkspaceId) -> bool {
        let workspaces = self.workspaces.read().await;
        workspaces.get(workspace.as_str()).is_some_and(|state| state.bot_installed)
    }
}

#[async_trait]
impl InstallationStore for MemoryInstallationStore {
    async fn delete_installation(
        &self,
        workspace: &WorkspaceId,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let mut workspaces = self.workspaces.write().await;
        if let Some(state) = workspaces.get_mut(workspace.as_str()) {
            state.user_grants.remove(user_id);
        }
        Ok(())
    }

    async fn delete_bot(&self, workspace: &WorkspaceId) -> Result<(), StoreError> {
        let mut workspaces = self.workspaces.write().await;
        if let Some(state) = workspaces.get_mut(workspace.as_str()) {
            state.bot_installed = false;
        }
        Ok(())
    }

    async fn delete_all(&self, workspace: &WorkspaceId) -> Result<(), StoreError> {
        let mut workspaces = self.workspaces.write().await;
        workspaces.remove(workspace.as_str());
        Ok(())
    }
}

/// Token-revocation payload, already narrowed to what teardown needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokensRevokedEvent {
    pub oauth_user_ids: Vec<String>,
    pub bot_revoked: bool,
}

/// Removes a workspace's installation records and stored configuration
/// when Slack tells us the app is gone.
///
/// Installation deletion is the authoritative teardown signal; deleting
/// the stored config is a courtesy, so its failures are logged with the
/// workspace id and never escalated.
pub struct WorkspaceTeardown {
    installations: Arc<dyn InstallationStore>,
    configs: ConfigStore,
}

impl WorkspaceTeardown {
    pub fn new(installations: Arc<dyn InstallationStore>, configs: ConfigStore) -> Self {
        Self { installations, configs }
    }

    pub async fn tokens_revoked(&self, workspace: &WorkspaceId, event: &TokensRevokedEvent) {
        for user_id in &event.oauth_user_ids {
            if let Err(store_error) =
                self.installations.delete_installation(workspace, user_id).await
            {
                error!(
                    workspace_id = %workspace,
                    user_id,
                    error = %store_error,
                    "failed to delete a revoked user installation"
                );
            }
        }

        if event.bot_revoked {
            if let Err(store_error) = self.installations.delete_bot(workspace).await {
                error!(
                    workspace_id = %workspace,
                    error = %store_error,
                    "failed to delete the bot installation"
                );
            }
            self.delete_config_best_effort(workspace).await;
        }
    }

    pub async fn app_uninstalled(&self, workspace: &WorkspaceId) {
        if let Err(store_error) = self.installations.delete_all(workspace).await {
            error!(
                workspace_id = %workspace,
                error = %store_error,
                "failed to delete installation records on uninstall"
            );
        }
        self.delete_config_best_effort(workspace).await;
    }

    async fn delete_config_best_effort(&self, workspace: &WorkspaceId) {
        match self.configs.remove(workspace).await {
            Ok(()) => {
                info!(workspace_id = %workspace, "workspace configuration deleted");
            }
            Err(store_error) => {
                error!(
                    workspace_id = %workspace,
                    error = %store_error,
                    "failed to delete workspace configuration"
                );
            }
        }
    }
}
