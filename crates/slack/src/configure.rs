use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{error, info};

use chatrelay_agent::Translator;
use chatrelay_core::{
    CompletionProvider, ConfigurePhase, ConfigureSignal, PhaseTransitionError, ProcessDefaults,
    ResolvedContext, StoreError, WorkspaceConfig, WorkspaceId, BASELINE_MODEL, MODEL_CATALOG,
};
use chatrelay_store::ConfigStore;

use crate::blocks::{Block, InputElement, ModalView, SelectOption, TextObject};

pub const CONFIGURE_CALLBACK_ID: &str = "configure";

pub const API_KEY_BLOCK_ID: &str = "api_key";
pub const MODEL_BLOCK_ID: &str = "model";
pub const SYSTEM_PROMPT_BLOCK_ID: &str = "system_prompt";

const INVALID_KEY_MESSAGE: &str = "This API key seems to be invalid";
const UNAVAILABLE_MODEL_MESSAGE: &str = "This model is not yet available for this API key";

/// Field values extracted from a submitted configure view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigureSubmission {
    pub api_key: String,
    pub model: String,
    pub system_prompt: Option<String>,
}

impl ConfigureSubmission {
    fn as_record(&self) -> WorkspaceConfig {
        WorkspaceConfig {
            api_key: Some(self.api_key.clone()),
            model: Some(self.model.clone()),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

/// Which form field a rejection is pinned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionField {
    ApiKey,
    Model,
}

impl SubmissionField {
    pub fn block_id(self) -> &'static str {
        match self {
            Self::ApiKey => API_KEY_BLOCK_ID,
            Self::Model => MODEL_BLOCK_ID,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionVerdict {
    Accepted,
    Rejected { field: SubmissionField, message: String },
}

/// User-visible labels for the configure surfaces, localized through the
/// `Translator` once the workspace has a working key.
#[derive(Clone, Debug)]
pub struct ConfigureLabels {
    pub title: String,
    pub submit: String,
    pub cancel: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

impl Default for ConfigureLabels {
    fn default() -> Self {
        Self {
            title: "Configure".to_owned(),
            submit: "Submit".to_owned(),
            cancel: "Cancel".to_owned(),
            api_key: "Save your OpenAI API key:".to_owned(),
            model: "OpenAI Model".to_owned(),
            system_prompt: "Override System Prompt".to_owned(),
        }
    }
}

impl ConfigureLabels {
    /// Localized variant of the default labels. Only translates when the
    /// workspace already has a key resolved; otherwise the fixed-language
    /// defaults come back untouched.
    pub async fn localized(
        translator: &dyn Translator,
        resolved: &ResolvedContext,
        locale: Option<&str>,
    ) -> Self {
        let defaults = Self::default();
        if !resolved.has_api_key() {
            return defaults;
        }

        Self {
            title: translator.translate(&defaults.title, locale).await,
            submit: translator.translate(&defaults.submit, locale).await,
            cancel: translator.translate(&defaults.cancel, locale).await,
            api_key: translator.translate(&defaults.api_key, locale).await,
            model: translator.translate(&defaults.model, locale).await,
            system_prompt: translator.translate(&defaults.system_prompt, locale).await,
        }
    }
}

/// Builds the configure modal, pre-seeded with the workspace's resolved
/// values.
///
/// The stored API key is pre-filled as-is, unmasked. That matches the
/// upstream behavior and is tracked as a security review item in
/// DESIGN.md; the modal is only reachable from the app home of the
/// installing workspace.
pub fn configure_modal(
    resolved: &ResolvedContext,
    defaults: &ProcessDefaults,
    labels: &ConfigureLabels,
) -> ModalView {
    let mut view = ModalView::new(CONFIGURE_CALLBACK_ID);
    view.title = TextObject::plain(&labels.title);
    view.submit = TextObject::plain(&labels.submit);
    view.close = TextObject::plain(&labels.cancel);

    view.blocks.push(Block::Input {
        block_id: API_KEY_BLOCK_ID.to_owned(),
        label: TextObject::plain(&labels.api_key),
        element: InputElement::PlainTextInput {
            action_id: "input".to_owned(),
            initial_value: resolved
                .api_key
                .as_ref()
                .map(|key| key.expose_secret().to_owned()),
            multiline: false,
        },
    });

    let options: Vec<SelectOption> =
        MODEL_CATALOG.iter().map(|(id, label)| SelectOption::new(*id, *label)).collect();
    let selected = resolved.model.as_deref().unwrap_or(BASELINE_MODEL);
    let initial_option = options
        .iter()
        .find(|option| option.value == selected)
        .cloned()
        .or_else(|| options.first().cloned());

    view.blocks.push(Block::Input {
        block_id: MODEL_BLOCK_ID.to_owned(),
        label: TextObject::plain(&labels.model),
        element: InputElement::StaticSelect {
            action_id: "input".to_owned(),
            options,
            initial_option,
        },
    });

    if defaults.prompt_override_enabled {
        view.blocks.push(Block::Input {
            block_id: SYSTEM_PROMPT_BLOCK_ID.to_owned(),
            label: TextObject::plain(&labels.system_prompt),
            element: InputElement::PlainTextInput {
                action_id: "input".to_owned(),
                initial_value: Some(
                    resolved
                        .system_prompt
                        .clone()
                        .unwrap_or_else(|| defaults.system_prompt.clone()),
                ),
                multiline: true,
            },
        });
    }

    view
}

/// Runs the two-step provider validation that gates every persist.
///
/// Step one proves the key itself works by looking up the baseline model;
/// only then is the selected model checked against the same key. The
/// second lookup is never attempted when the first fails, so a dead key
/// costs exactly one provider call.
pub struct ConfigEditor {
    provider: Arc<dyn CompletionProvider>,
}

impl ConfigEditor {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> Arc<dyn CompletionProvider> {
        Arc::clone(&self.provider)
    }

    pub async fn validate(&self, submission: &ConfigureSubmission) -> SubmissionVerdict {
        let api_key = SecretString::from(submission.api_key.clone());

        if let Err(error) = self.provider.lookup_model(&api_key, BASELINE_MODEL).await {
            info!(error = %error, "configure submission rejected: api key failed baseline lookup");
            return SubmissionVerdict::Rejected {
                field: SubmissionField::ApiKey,
                message: INVALID_KEY_MESSAGE.to_owned(),
            };
        }

        if let Err(error) = self.provider.lookup_model(&api_key, &submission.model).await {
            info!(
                model = %submission.model,
                error = %error,
                "configure submission rejected: selected model unavailable for key"
            );
            return SubmissionVerdict::Rejected {
                field: SubmissionField::Model,
                message: UNAVAILABLE_MODEL_MESSAGE.to_owned(),
            };
        }

        SubmissionVerdict::Accepted
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("revalidation failed before persist: {0}")]
    Revalidation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Phase(#[from] PhaseTransitionError),
}

/// Second phase of a configure submission.
///
/// Runs after the interactive ack, possibly in a different execution
/// context, so it re-validates the key/model pair instead of trusting the
/// earlier check. Failures here are an operator concern only: the
/// submitter has already been acknowledged, and the workspace keeps its
/// previous configuration.
pub struct PersistTask {
    provider: Arc<dyn CompletionProvider>,
    store: ConfigStore,
    workspace: WorkspaceId,
    submission: ConfigureSubmission,
}

impl PersistTask {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: ConfigStore,
        workspace: WorkspaceId,
        submission: ConfigureSubmission,
    ) -> Self {
        Self { provider, store, workspace, submission }
    }

    /// Re-validates and saves, reporting where the interaction ended up.
    /// A successful run lands the interaction in its `Persisted` terminal
    /// phase; any error means `PersistFailed`.
    pub async fn run(self) -> Result<ConfigurePhase, PersistError> {
        let api_key = SecretString::from(self.submission.api_key.clone());
        self.provider
            .lookup_model(&api_key, &self.submission.model)
            .await
            .map_err(|error| PersistError::Revalidation(error.to_string()))?;

        self.store.save(&self.workspace, &self.submission.as_record()).await?;

        let phase = ConfigurePhase::Persisting.advance(ConfigureSignal::PersistSucceeded)?;
        info!(workspace_id = %self.workspace, phase = ?phase, "workspace configuration persisted");
        Ok(phase)
    }

    /// Detaches the task; the only trace of a failure is the error log.
    pub fn spawn(self) {
        let workspace = self.workspace.clone();
        tokio::spawn(async move {
            if let Err(persist_error) = self.run().await {
                error!(
                    workspace_id = %workspace,
                    phase = ?ConfigurePhase::PersistFailed,
                    error = %persist_error,
                    "post-ack config persist failed; workspace keeps previous configuration"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};

    use chatrelay_core::{
        CompletionProvider, CompletionRequest, ConfigurePhase, ProcessDefaults, ProviderError,
        ResolvedContext, WorkspaceConfig, WorkspaceId, BASELINE_MODEL,
    };
    use chatrelay_store::{ConfigStore, MemoryObjectStore};

    use super::{
        configure_modal, ConfigEditor, ConfigureLabels, ConfigureSubmission, PersistTask,
        SubmissionField, SubmissionVerdict, API_KEY_BLOCK_ID, MODEL_BLOCK_ID,
        SYSTEM_PROMPT_BLOCK_ID,
    };
    use crate::blocks::{Block, InputElement};

    /// Provider stub that accepts a single key and, for that key, a single
    /// extra model beyond the baseline. Records every lookup.
    struct StubProvider {
        valid_key: &'static str,
        extra_model: &'static str,
        lookups: AtomicUsize,
    }

    impl StubProvider {
        fn new(valid_key: &'static str, extra_model: &'static str) -> Self {
            Self { valid_key, extra_model, lookups: AtomicUsize::new(0) }
        }

        fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for StubProvider {
        async fn lookup_model(
            &self,
            api_key: &SecretString,
            model_id: &str,
        ) -> Result<(), ProviderError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if api_key.expose_secret() != self.valid_key {
                return Err(ProviderError::Rejected("unknown key".to_owned()));
            }
            if model_id == BASELINE_MODEL || model_id == self.extra_model {
                Ok(())
            } else {
                Err(ProviderError::Rejected(format!("model `{model_id}` not visible")))
            }
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            Err(ProviderError::Transport("not a completion stub".to_owned()))
        }
    }

    fn defaults() -> ProcessDefaults {
        ProcessDefaults {
            api_key: None,
            model: BASELINE_MODEL.to_owned(),
            system_prompt: "default template".to_owned(),
            prompt_override_enabled: true,
        }
    }

    fn submission(api_key: &str, model: &str) -> ConfigureSubmission {
        ConfigureSubmission {
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            system_prompt: Some("be helpful".to_owned()),
        }
    }

    #[tokio::test]
    async fn invalid_key_is_rejected_without_a_model_lookup() {
        let provider = Arc::new(StubProvider::new("sk-good", "gpt-4"));
        let editor = ConfigEditor::new(provider.clone());

        let verdict = editor.validate(&submission("sk-bad", "gpt-4")).await;

        assert_eq!(
            verdict,
            SubmissionVerdict::Rejected {
                field: SubmissionField::ApiKey,
                message: "This API key seems to be invalid".to_owned(),
            }
        );
        // Only the baseline lookup ran; the selected model was never checked.
        assert_eq!(provider.lookup_count(), 1);
    }

    #[tokio::test]
    async fn unsupported_model_is_rejected_on_the_model_field_only() {
        let provider = Arc::new(StubProvider::new("sk-good", "gpt-4"));
        let editor = ConfigEditor::new(provider.clone());

        let verdict = editor.validate(&submission("sk-good", "gpt-5-preview")).await;

        let SubmissionVerdict::Rejected { field, .. } = verdict else {
            panic!("expected rejection");
        };
        assert_eq!(field, SubmissionField::Model);
        assert_eq!(provider.lookup_count(), 2);
    }

    #[tokio::test]
    async fn accepted_submission_persists_the_exact_triple() {
        let provider = Arc::new(StubProvider::new("sk-good", "gpt-4"));
        let editor = ConfigEditor::new(provider.clone());
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        let workspace = WorkspaceId::new("T1");

        let submitted = submission("sk-good", "gpt-4");
        let verdict = editor.validate(&submitted).await;
        assert_eq!(verdict, SubmissionVerdict::Accepted);

        let phase = PersistTask::new(provider, store.clone(), workspace.clone(), submitted)
            .run()
            .await
            .expect("persist");
        assert_eq!(phase, ConfigurePhase::Persisted);
        assert!(phase.is_terminal());

        let stored = store.load(&workspace).await.expect("stored record");
        assert_eq!(
            stored,
            WorkspaceConfig {
                api_key: Some("sk-good".to_owned()),
                model: Some("gpt-4".to_owned()),
                system_prompt: Some("be helpful".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn persist_task_revalidates_and_refuses_to_store_a_dead_key() {
        let provider = Arc::new(StubProvider::new("sk-good", "gpt-4"));
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        let workspace = WorkspaceId::new("T1");

        // Simulates the key being revoked between ack and persist.
        let result = PersistTask::new(
            provider,
            store.clone(),
            workspace.clone(),
            submission("sk-revoked", "gpt-4"),
        )
        .run()
        .await;

        assert!(result.is_err());
        assert!(store.load(&workspace).await.is_err(), "nothing may be persisted");
    }

    #[test]
    fn modal_prefills_key_and_selected_model() {
        let resolved = ResolvedContext::from_stored(WorkspaceConfig {
            api_key: Some("sk-stored".to_owned()),
            model: Some("gpt-4".to_owned()),
            system_prompt: None,
        });

        let view = configure_modal(&resolved, &defaults(), &ConfigureLabels::default());

        let Block::Input { element: InputElement::PlainTextInput { initial_value, .. }, .. } =
            &view.blocks[0]
        else {
            panic!("expected api key input first");
        };
        assert_eq!(initial_value.as_deref(), Some("sk-stored"));

        let Block::Input {
            block_id,
            element: InputElement::StaticSelect { initial_option, .. },
            ..
        } = &view.blocks[1]
        else {
            panic!("expected model select second");
        };
        assert_eq!(block_id, MODEL_BLOCK_ID);
        assert_eq!(initial_option.as_ref().map(|option| option.value.as_str()), Some("gpt-4"));
    }

    #[test]
    fn modal_omits_prompt_field_when_override_is_disabled() {
        let mut locked = defaults();
        locked.prompt_override_enabled = false;
        let resolved = ResolvedContext::from_defaults(&locked);

        let view = configure_modal(&resolved, &locked, &ConfigureLabels::default());

        assert_eq!(view.blocks.len(), 2);
        assert!(view.blocks.iter().all(|block| {
            !matches!(block, Block::Input { block_id, .. } if block_id == SYSTEM_PROMPT_BLOCK_ID)
        }));
    }

    #[test]
    fn modal_select_defaults_to_cheapest_model_when_none_stored() {
        let resolved = ResolvedContext::from_stored(WorkspaceConfig {
            api_key: Some("sk-stored".to_owned()),
            ..Default::default()
        });

        let view = configure_modal(&resolved, &defaults(), &ConfigureLabels::default());

        let Block::Input { element: InputElement::StaticSelect { initial_option, .. }, .. } =
            &view.blocks[1]
        else {
            panic!("expected model select");
        };
        assert_eq!(
            initial_option.as_ref().map(|option| option.value.as_str()),
            Some(BASELINE_MODEL)
        );
    }

    #[test]
    fn field_rejections_target_the_right_block_ids() {
        assert_eq!(SubmissionField::ApiKey.block_id(), API_KEY_BLOCK_ID);
        assert_eq!(SubmissionField::Model.block_id(), MODEL_BLOCK_ID);
    }
}
