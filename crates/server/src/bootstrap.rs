use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use chatrelay_agent::{FixedLanguage, LlmTranslator, OpenAiProvider, Translator};
use chatrelay_core::{AppConfig, CompletionProvider, ConfigError, LoadOptions};
use chatrelay_slack::configure::ConfigEditor;
use chatrelay_slack::events::{
    AppUninstalledHandler, ConfigureOpenedHandler, ConfigureSubmissionHandler, EventDispatcher,
    HomeTabHandler, MessageHandler, TokensRevokedHandler,
};
use chatrelay_slack::lifecycle::{MemoryInstallationStore, WorkspaceTeardown};
use chatrelay_slack::resolver::ConfigResolver;
use chatrelay_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};
use chatrelay_store::{connect_with_settings, migrations, ConfigStore, DbPool, SqliteObjectStore};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store connection failed: {0}")]
    StoreConnect(#[source] sqlx::Error),
    #[error("store migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.store.url,
        config.store.max_connections,
        config.store.timeout_secs,
    )
    .await
    .map_err(BootstrapError::StoreConnect)?;
    info!(
        event_name = "system.bootstrap.store_connected",
        correlation_id = "bootstrap",
        "config store connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "config store migrations applied"
    );

    let configs = ConfigStore::new(Arc::new(SqliteObjectStore::new(db_pool.clone())));
    let defaults = config.process_defaults();

    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiProvider::new(
        config.provider.base_url.clone(),
        config.provider.timeout_secs,
    ));

    // UI localization is billed to the process default key; without one the
    // interface stays in its authored language.
    let translator: Arc<dyn Translator> = match &defaults.api_key {
        Some(default_key) => Arc::new(LlmTranslator::new(
            Arc::clone(&provider),
            default_key.clone(),
            defaults.model.clone(),
        )),
        None => Arc::new(FixedLanguage),
    };

    let teardown = Arc::new(WorkspaceTeardown::new(
        Arc::new(MemoryInstallationStore::new()),
        configs.clone(),
    ));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(HomeTabHandler::new(configs.clone(), Arc::clone(&translator)));
    dispatcher.register(ConfigureOpenedHandler::new(defaults.clone(), translator));
    dispatcher.register(ConfigureSubmissionHandler::new(
        ConfigEditor::new(Arc::clone(&provider)),
        configs.clone(),
    ));
    dispatcher.register(MessageHandler::new(provider, defaults.clone()));
    dispatcher.register(TokensRevokedHandler::new(Arc::clone(&teardown)));
    dispatcher.register(AppUninstalledHandler::new(teardown));

    let resolver = ConfigResolver::new(configs, defaults);
    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        resolver,
        dispatcher,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, slack_runner })
}

#[cfg(test)]
mod tests {
    use chatrelay_core::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(store_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                store_url: Some(store_url.to_string()),
                slack_app_token: Some("xapp-test".to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                store_url: Some("sqlite::memory:".to_string()),
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_and_config_object_table() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'config_object'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected the config table to be available after bootstrap");
        assert_eq!(table_count, 1, "bootstrap should expose the config_object table");

        app.db_pool.close().await;
    }
}
