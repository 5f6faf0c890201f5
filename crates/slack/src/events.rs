use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use chatrelay_agent::Translator;
use chatrelay_core::{
    CompletionProvider, CompletionRequest, ConfigurePhase, ConfigureSignal, ProcessDefaults,
    ResolvedContext, WorkspaceId,
};
use chatrelay_store::ConfigStore;

use crate::blocks::{
    home_tab_view, HomeTabView, ModalView, DEFAULT_CONFIGURE_LABEL, ONBOARDING_MESSAGE,
    READY_MESSAGE,
};
use crate::configure::{
    configure_modal, ConfigEditor, ConfigureLabels, ConfigureSubmission, PersistTask,
    SubmissionField, SubmissionVerdict, API_KEY_BLOCK_ID, CONFIGURE_CALLBACK_ID, MODEL_BLOCK_ID,
    SYSTEM_PROMPT_BLOCK_ID,
};
use crate::lifecycle::{TokensRevokedEvent, WorkspaceTeardown};

#[derive(Clone, Debug, PartialEq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub workspace_id: WorkspaceId,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SlackEvent {
    AppHomeOpened(AppHomeOpenedEvent),
    ConfigureOpened(ConfigureOpenedEvent),
    ConfigureSubmitted(ConfigureSubmission),
    Message(MessageEvent),
    TokensRevoked(TokensRevokedEvent),
    AppUninstalled,
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::AppHomeOpened(_) => SlackEventType::AppHomeOpened,
            Self::ConfigureOpened(_) => SlackEventType::ConfigureOpened,
            Self::ConfigureSubmitted(_) => SlackEventType::ConfigureSubmitted,
            Self::Message(_) => SlackEventType::Message,
            Self::TokensRevoked(_) => SlackEventType::TokensRevoked,
            Self::AppUninstalled => SlackEventType::AppUninstalled,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    AppHomeOpened,
    ConfigureOpened,
    ConfigureSubmitted,
    Message,
    TokensRevoked,
    AppUninstalled,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppHomeOpenedEvent {
    pub user_id: String,
    pub locale: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigureOpenedEvent {
    pub trigger_id: String,
    pub user_id: String,
    pub locale: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

/// Per-event context assembled by the resolver before dispatch.
#[derive(Clone, Debug)]
pub struct EventContext {
    pub correlation_id: String,
    pub resolved: ResolvedContext,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HandlerResult {
    PublishedHome(HomeTabView),
    OpenedModal(ModalView),
    /// View submission passed validation; the ack unblocks the modal and
    /// persistence continues detached.
    SubmissionAccepted,
    /// View submission failed validation; the error is pinned to one field
    /// and rides the view-submission ack so the modal stays open.
    SubmissionRejected { field: SubmissionField, message: String },
    Replied(String),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("configure interaction failure: {0}")]
    Configure(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeParseError {
    #[error("envelope is missing a workspace (team) id")]
    MissingWorkspaceId,
    #[error("envelope is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Converts a raw Socket Mode payload into a typed envelope.
///
/// Events without a workspace id are rejected here, before resolution;
/// unknown event shapes come back as `Unsupported` so the dispatcher can
/// ack and drop them.
pub fn parse_envelope(raw: &serde_json::Value) -> Result<SlackEnvelope, EnvelopeParseError> {
    let envelope_id = raw["envelope_id"]
        .as_str()
        .ok_or(EnvelopeParseError::MissingField("envelope_id"))?
        .to_owned();
    let payload = &raw["payload"];

    let workspace_id = payload["team_id"]
        .as_str()
        .or_else(|| payload["team"]["id"].as_str())
        .or_else(|| payload["event"]["team"].as_str())
        .map(WorkspaceId::new)
        .ok_or(EnvelopeParseError::MissingWorkspaceId)?;

    let event = match raw["type"].as_str() {
        Some("events_api") => parse_events_api(payload),
        Some("interactive") => parse_interactive(payload),
        Some(other) => SlackEvent::Unsupported { event_type: other.to_owned() },
        None => return Err(EnvelopeParseError::MissingField("type")),
    };

    Ok(SlackEnvelope { envelope_id, workspace_id, event })
}

fn parse_events_api(payload: &serde_json::Value) -> SlackEvent {
    let event = &payload["event"];
    match event["type"].as_str() {
        Some("app_home_opened") => SlackEvent::AppHomeOpened(AppHomeOpenedEvent {
            user_id: event["user"].as_str().unwrap_or_default().to_owned(),
            locale: event["locale"].as_str().map(str::to_owned),
        }),
        Some("message") => SlackEvent::Message(MessageEvent {
            channel_id: event["channel"].as_str().unwrap_or_default().to_owned(),
            user_id: event["user"].as_str().unwrap_or_default().to_owned(),
            text: event["text"].as_str().unwrap_or_default().to_owned(),
            thread_ts: event["thread_ts"].as_str().map(str::to_owned),
        }),
        Some("tokens_revoked") => SlackEvent::TokensRevoked(TokensRevokedEvent {
            oauth_user_ids: event["tokens"]["oauth"]
                .as_array()
                .map(|ids| {
                    ids.iter().filter_map(|id| id.as_str()).map(str::to_owned).collect()
                })
                .unwrap_or_default(),
            bot_revoked: event["tokens"]["bot"]
                .as_array()
                .is_some_and(|bots| !bots.is_empty()),
        }),
        Some("app_uninstalled") => SlackEvent::AppUninstalled,
        Some(other) => SlackEvent::Unsupported { event_type: other.to_owned() },
        None => SlackEvent::Unsupported { event_type: "unknown".to_owned() },
    }
}

fn parse_interactive(payload: &serde_json::Value) -> SlackEvent {
    match payload["type"].as_str() {
        Some("block_actions") => {
            let configure = payload["actions"]
                .as_array()
                .and_then(|actions| actions.first())
                .and_then(|action| action["action_id"].as_str())
                == Some(crate::blocks::CONFIGURE_ACTION_ID);
            if configure {
                SlackEvent::ConfigureOpened(ConfigureOpenedEvent {
                    trigger_id: payload["trigger_id"].as_str().unwrap_or_default().to_owned(),
                    user_id: payload["user"]["id"].as_str().unwrap_or_default().to_owned(),
                    locale: payload["user"]["locale"].as_str().map(str::to_owned),
                })
            } else {
                SlackEvent::Unsupported { event_type: "block_actions".to_owned() }
            }
        }
        Some("view_submission")
            if payload["view"]["callback_id"].as_str() == Some(CONFIGURE_CALLBACK_ID) =>
        {
            let values = &payload["view"]["state"]["values"];
            SlackEvent::ConfigureSubmitted(ConfigureSubmission {
                api_key: values[API_KEY_BLOCK_ID]["input"]["value"]
                    .as_str()
                    .unwrap_or_default()
                    .to_owned(),
                model: values[MODEL_BLOCK_ID]["input"]["selected_option"]["value"]
                    .as_str()
                    .unwrap_or_default()
                    .to_owned(),
                system_prompt: values[SYSTEM_PROMPT_BLOCK_ID]["input"]["value"]
                    .as_str()
                    .filter(|value| !value.is_empty())
                    .map(str::to_owned),
            })
        }
        Some(other) => SlackEvent::Unsupported { event_type: other.to_owned() },
        None => SlackEvent::Unsupported { event_type: "interactive".to_owned() },
    }
}

/// Renders the app home: onboarding copy until a config is stored, then
/// the "ready" banner. Labels localize once the workspace has a key.
pub struct HomeTabHandler {
    store: ConfigStore,
    translator: Arc<dyn Translator>,
}

impl HomeTabHandler {
    pub fn new(store: ConfigStore, translator: Arc<dyn Translator>) -> Self {
        Self { store, translator }
    }
}

#[async_trait]
impl EventHandler for HomeTabHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppHomeOpened
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppHomeOpened(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = if self.store.exists(&envelope.workspace_id).await {
            READY_MESSAGE
        } else {
            ONBOARDING_MESSAGE
        };

        let locale = event.locale.as_deref();
        let (message, configure_label) = if ctx.resolved.has_api_key() {
            (
                self.translator.translate(message, locale).await,
                self.translator.translate(DEFAULT_CONFIGURE_LABEL, locale).await,
            )
        } else {
            (message.to_owned(), DEFAULT_CONFIGURE_LABEL.to_owned())
        };

        Ok(HandlerResult::PublishedHome(home_tab_view(&message, &configure_label)))
    }
}

/// Opens the configure modal pre-filled with the resolved values.
pub struct ConfigureOpenedHandler {
    defaults: ProcessDefaults,
    translator: Arc<dyn Translator>,
}

impl ConfigureOpenedHandler {
    pub fn new(defaults: ProcessDefaults, translator: Arc<dyn Translator>) -> Self {
        Self { defaults, translator }
    }
}

#[async_trait]
impl EventHandler for ConfigureOpenedHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ConfigureOpened
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ConfigureOpened(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let labels = ConfigureLabels::localized(
            self.translator.as_ref(),
            &ctx.resolved,
            event.locale.as_deref(),
        )
        .await;

        Ok(HandlerResult::OpenedModal(configure_modal(&ctx.resolved, &self.defaults, &labels)))
    }
}

/// Validates a configure submission and, on acceptance, detaches the
/// persist task so the modal ack is never blocked on storage.
pub struct ConfigureSubmissionHandler {
    editor: ConfigEditor,
    store: ConfigStore,
}

impl ConfigureSubmissionHandler {
    pub fn new(editor: ConfigEditor, store: ConfigStore) -> Self {
        Self { editor, store }
    }
}

#[async_trait]
impl EventHandler for ConfigureSubmissionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ConfigureSubmitted
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ConfigureSubmitted(submission) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if submission.api_key.trim().is_empty() || submission.model.trim().is_empty() {
            return Err(EventHandlerError::Configure(
                "submission is missing api_key or model values".to_owned(),
            ));
        }

        let validating = ConfigurePhase::FormOpen
            .advance(ConfigureSignal::Submit)
            .map_err(|error| EventHandlerError::Configure(error.to_string()))?;

        match self.editor.validate(submission).await {
            SubmissionVerdict::Rejected { field, message } => {
                let phase = validating
                    .advance(ConfigureSignal::Reject)
                    .map_err(|error| EventHandlerError::Configure(error.to_string()))?;
                debug!(
                    workspace_id = %envelope.workspace_id,
                    phase = ?phase,
                    field = field.block_id(),
                    "configure submission rejected; form stays open"
                );
                Ok(HandlerResult::SubmissionRejected { field, message })
            }
            SubmissionVerdict::Accepted => {
                let phase = validating
                    .advance(ConfigureSignal::Accept)
                    .map_err(|error| EventHandlerError::Configure(error.to_string()))?;
                debug!(
                    workspace_id = %envelope.workspace_id,
                    phase = ?phase,
                    "configure submission accepted; persisting detached"
                );
                PersistTask::new(
                    self.editor.provider(),
                    self.store.clone(),
                    envelope.workspace_id.clone(),
                    submission.clone(),
                )
                .spawn();
                Ok(HandlerResult::SubmissionAccepted)
            }
        }
    }
}

/// Relays a channel message to the completion provider using the
/// workspace's resolved configuration.
pub struct MessageHandler {
    provider: Arc<dyn CompletionProvider>,
    defaults: ProcessDefaults,
}

impl MessageHandler {
    pub fn new(provider: Arc<dyn CompletionProvider>, defaults: ProcessDefaults) -> Self {
        Self { provider, defaults }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Processed);
        }

        let Some(api_key) = ctx.resolved.api_key.clone() else {
            return Ok(HandlerResult::Replied(
                "No API key is configured for this workspace yet. \
                 Open the app home and press Configure to set one up."
                    .to_owned(),
            ));
        };

        let request = CompletionRequest {
            api_key,
            model: ctx.resolved.effective_model(&self.defaults).to_owned(),
            system_prompt: Some(ctx.resolved.effective_system_prompt(&self.defaults).to_owned()),
            user_text: event.text.clone(),
        };

        match self.provider.complete(&request).await {
            Ok(reply) => Ok(HandlerResult::Replied(reply)),
            Err(provider_error) => {
                warn!(
                    workspace_id = %envelope.workspace_id,
                    correlation_id = %ctx.correlation_id,
                    error = %provider_error,
                    "completion call failed"
                );
                Ok(HandlerResult::Replied(
                    ":warning: Something went wrong while talking to the model. Please try again."
                        .to_owned(),
                ))
            }
        }
    }
}

/// Adapter that routes `tokens_revoked` envelopes into the teardown service.
pub struct TokensRevokedHandler {
    teardown: Arc<WorkspaceTeardown>,
}

impl TokensRevokedHandler {
    pub fn new(teardown: Arc<WorkspaceTeardown>) -> Self {
        Self { teardown }
    }
}

#[async_trait]
impl EventHandler for TokensRevokedHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::TokensRevoked
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::TokensRevoked(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.teardown.tokens_revoked(&envelope.workspace_id, event).await;
        Ok(HandlerResult::Processed)
    }
}

/// Adapter that routes `app_uninstalled` envelopes into the teardown service.
pub struct AppUninstalledHandler {
    teardown: Arc<WorkspaceTeardown>,
}

impl AppUninstalledHandler {
    pub fn new(teardown: Arc<WorkspaceTeardown>) -> Self {
        Self { teardown }
    }
}

#[async_trait]
impl EventHandler for AppUninstalledHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppUninstalled
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if envelope.event != SlackEvent::AppUninstalled {
            return Ok(HandlerResult::Ignored);
        }

        self.teardown.app_uninstalled(&envelope.workspace_id).await;
        Ok(HandlerResult::Processed)
    }
}
