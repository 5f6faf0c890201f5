use tracing::{debug, warn};

use chatrelay_core::{ProcessDefaults, ResolvedContext, WorkspaceId};
use chatrelay_store::ConfigStore;

/// Per-event middleware that turns a workspace id into the configuration
/// the rest of the pipeline runs with.
///
/// Infallible by contract: a missing record, an undecodable record, and a
/// store outage all degrade to the process defaults. This runs to
/// completion before any handler sees the event.
#[derive(Clone)]
pub struct ConfigResolver {
    store: ConfigStore,
    defaults: ProcessDefaults,
}

impl ConfigResolver {
    pub fn new(store: ConfigStore, defaults: ProcessDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn defaults(&self) -> &ProcessDefaults {
        &self.defaults
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub async fn resolve(&self, workspace: &WorkspaceId) -> ResolvedContext {
        match self.store.load(workspace).await {
            Ok(record) => ResolvedContext::from_stored(record),
            Err(error) if error.is_not_found() => {
                debug!(
                    workspace_id = %workspace,
                    "no stored config for workspace; using process defaults"
                );
                ResolvedContext::from_defaults(&self.defaults)
            }
            Err(error) => {
                // Transient store trouble must not take the event down;
                // the workspace just runs on defaults for this request.
                warn!(
                    workspace_id = %workspace,
                    failure_kind = error.kind(),
                    error = %error,
                    "config load failed; degrading to process defaults"
                );
                ResolvedContext::from_defaults(&self.defaults)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use secrecy::ExposeSecret;

    use chatrelay_core::{
        ProcessDefaults, ResolvedSource, StoreError, WorkspaceConfig, WorkspaceId,
    };
    use chatrelay_store::{ConfigStore, MemoryObjectStore, ObjectStore};

    use super::ConfigResolver;

    fn defaults() -> ProcessDefaults {
        ProcessDefaults {
            api_key: Some("sk-process-default".into()),
            model: "gpt-3.5-turbo".to_owned(),
            system_prompt: "default template".to_owned(),
            prompt_override_enabled: true,
        }
    }

    struct FailingObjectStore;

    #[async_trait]
    impl ObjectStore for FailingObjectStore {
        async fn get(&self, _key: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::Transient("store unreachable".to_owned()))
        }

        async fn put(&self, _key: &str, _body: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Transient("store unreachable".to_owned()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Transient("store unreachable".to_owned()))
        }
    }

    #[tokio::test]
    async fn stored_record_fields_are_copied_verbatim() {
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        let workspace = WorkspaceId::new("T1");
        store
            .save(
                &workspace,
                &WorkspaceConfig {
                    api_key: Some("sk-workspace".to_owned()),
                    model: None,
                    system_prompt: Some("pirate speak".to_owned()),
                },
            )
            .await
            .expect("seed record");

        let resolver = ConfigResolver::new(store, defaults());
        let resolved = resolver.resolve(&workspace).await;

        assert_eq!(resolved.source, ResolvedSource::Stored);
        assert_eq!(
            resolved.api_key.as_ref().map(|key| key.expose_secret().to_owned()),
            Some("sk-workspace".to_owned())
        );
        // No per-field fallback at this layer: the absent model stays absent.
        assert_eq!(resolved.model, None);
        assert_eq!(resolved.system_prompt.as_deref(), Some("pirate speak"));
    }

    #[tokio::test]
    async fn missing_record_falls_back_to_defaults_exactly() {
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        let resolver = ConfigResolver::new(store, defaults());

        let resolved = resolver.resolve(&WorkspaceId::new("T-unconfigured")).await;

        assert_eq!(resolved.source, ResolvedSource::Defaults);
        assert_eq!(
            resolved.api_key.as_ref().map(|key| key.expose_secret().to_owned()),
            Some("sk-process-default".to_owned())
        );
        assert_eq!(resolved.model.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(resolved.system_prompt.as_deref(), Some("default template"));
    }

    #[tokio::test]
    async fn store_outage_degrades_to_defaults_instead_of_raising() {
        let store = ConfigStore::new(Arc::new(FailingObjectStore));
        let resolver = ConfigResolver::new(store, defaults());

        let resolved = resolver.resolve(&WorkspaceId::new("T1")).await;

        assert_eq!(resolved.source, ResolvedSource::Defaults);
    }

    #[tokio::test]
    async fn undecodable_record_degrades_to_defaults() {
        let objects = Arc::new(MemoryObjectStore::new());
        objects.put("T1", b"{broken json".to_vec()).await.expect("seed garbage");

        let resolver = ConfigResolver::new(ConfigStore::new(objects), defaults());
        let resolved = resolver.resolve(&WorkspaceId::new("T1")).await;

        assert_eq!(resolved.source, ResolvedSource::Defaults);
    }
}
