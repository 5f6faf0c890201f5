use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::configure::SubmissionField;
use crate::events::{
    parse_envelope, DispatchError, EventContext, EventDispatcher, HandlerResult, SlackEventType,
};
use crate::resolver::ConfigResolver;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Raw Socket Mode connection. Payloads come back as untyped JSON; the
/// runner owns parsing so transport implementations stay dumb pipes.
///
/// `acknowledge` optionally carries a response body: for view submissions
/// the ack frame is Slack's interactive response, so field errors have to
/// ride it. An empty ack closes the modal.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_payload(&self) -> Result<Option<serde_json::Value>, TransportError>;
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_payload(&self) -> Result<Option<serde_json::Value>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(
        &self,
        _envelope_id: &str,
        _payload: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Body for an ack that keeps a rejected configure modal open, with the
/// message pinned to the offending input block.
fn rejection_ack(field: SubmissionField, message: &str) -> serde_json::Value {
    let mut errors = serde_json::Map::new();
    errors.insert(field.block_id().to_owned(), serde_json::Value::String(message.to_owned()));
    serde_json::json!({ "response_action": "errors", "errors": errors })
}

/// Pumps envelopes from the transport through the resolver and dispatcher.
///
/// Most envelopes are acked before any slow work so Slack never redelivers
/// one we are still processing. Configure view submissions are the
/// exception: their ack is the interactive response itself, so the runner
/// dispatches first and acks with the validation verdict (field errors on
/// rejection, an empty ack to close the modal on acceptance). Nothing in
/// the loop is allowed to take the connection down; failures are logged
/// and the pump continues.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    resolver: ConfigResolver,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        resolver: ConfigResolver,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, resolver, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(payload) = self.transport.next_payload().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            let envelope = match parse_envelope(&payload) {
                Ok(envelope) => envelope,
                Err(parse_error) => {
                    // Without a workspace id there is nothing to resolve
                    // against; ack what we can and drop the payload.
                    warn!(error = %parse_error, "discarding unparseable socket payload");
                    if let Some(envelope_id) = payload["envelope_id"].as_str() {
                        if let Err(ack_error) =
                            self.transport.acknowledge(envelope_id, None).await
                        {
                            warn!(envelope_id, error = %ack_error, "ack of bad payload failed");
                        }
                    }
                    continue;
                }
            };

            let correlation_id = Uuid::new_v4().to_string();
            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                workspace_id = %envelope.workspace_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %correlation_id,
                "received slack envelope"
            );

            // A view-submission ack carries the verdict, so it cannot go
            // out until the handler has validated the submission.
            let ack_carries_verdict =
                envelope.event.event_type() == SlackEventType::ConfigureSubmitted;
            if !ack_carries_verdict {
                self.send_ack(&envelope.envelope_id, None, &correlation_id).await;
            }

            let resolved = self.resolver.resolve(&envelope.workspace_id).await;
            let context = EventContext { correlation_id: correlation_id.clone(), resolved };

            let outcome = self.dispatcher.dispatch(&envelope, &context).await;

            if ack_carries_verdict {
                let verdict_payload = match &outcome {
                    Ok(HandlerResult::SubmissionRejected { field, message }) => {
                        Some(rejection_ack(*field, message))
                    }
                    // Acceptance, handler errors, and missing handlers all
                    // close the modal with an empty ack.
                    _ => None,
                };
                self.send_ack(&envelope.envelope_id, verdict_payload, &correlation_id).await;
            }

            if let Err(error) = outcome {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    workspace_id = %envelope.workspace_id,
                    correlation_id = %correlation_id,
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
            }
        }
    }

    async fn send_ack(
        &self,
        envelope_id: &str,
        payload: Option<serde_json::Value>,
        correlation_id: &str,
    ) {
        if let Err(error) = self.transport.acknowledge(envelope_id, payload).await {
            warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id,
                correlation_id,
                error = %error,
                "failed to acknowledge slack envelope"
            );
        } else {
            debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id,
                correlation_id,
                "acknowledged slack envelope"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::json;
    use tokio::sync::Mutex;

    use chatrelay_core::{
        CompletionProvider, CompletionRequest, ProcessDefaults, ProviderError, WorkspaceConfig,
        WorkspaceId, BASELINE_MODEL,
    };
    use chatrelay_store::{ConfigStore, MemoryObjectStore};

    use super::{ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::configure::ConfigEditor;
    use crate::events::{
        ConfigureSubmissionHandler, EventContext, EventDispatcher, EventHandler,
        EventHandlerError, HandlerResult, SlackEnvelope, SlackEventType,
    };
    use crate::resolver::ConfigResolver;

    type RecordedAck = (String, Option<serde_json::Value>);

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        payloads: VecDeque<Result<Option<serde_json::Value>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<RecordedAck>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            payloads: Vec<Result<Option<serde_json::Value>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    payloads: payloads.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<RecordedAck> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_payload(&self) -> Result<Option<serde_json::Value>, TransportError> {
            let mut state = self.state.lock().await;
            state.payloads.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(
            &self,
            envelope_id: &str,
            payload: Option<serde_json::Value>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push((envelope_id.to_owned(), payload));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Records the resolved model seen by each dispatched message event.
    struct ResolvedModelRecorder {
        seen: Arc<Mutex<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl EventHandler for ResolvedModelRecorder {
        fn event_type(&self) -> SlackEventType {
            SlackEventType::Message
        }

        async fn handle(
            &self,
            _envelope: &SlackEnvelope,
            ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.seen.lock().await.push(ctx.resolved.model.clone());
            Ok(HandlerResult::Processed)
        }
    }

    struct AcceptAllProvider;

    #[async_trait]
    impl CompletionProvider for AcceptAllProvider {
        async fn lookup_model(
            &self,
            _api_key: &SecretString,
            _model_id: &str,
        ) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            Err(ProviderError::Transport("not a completion stub".to_owned()))
        }
    }

    struct RejectAllProvider;

    #[async_trait]
    impl CompletionProvider for RejectAllProvider {
        async fn lookup_model(
            &self,
            _api_key: &SecretString,
            _model_id: &str,
        ) -> Result<(), ProviderError> {
            Err(ProviderError::Rejected("unknown key".to_owned()))
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            Err(ProviderError::Rejected("unknown key".to_owned()))
        }
    }

    fn message_payload(envelope_id: &str, team_id: &str) -> serde_json::Value {
        json!({
            "envelope_id": envelope_id,
            "type": "events_api",
            "payload": {
                "team_id": team_id,
                "event": { "type": "message", "channel": "C1", "user": "U1", "text": "hi" }
            }
        })
    }

    fn view_submission_payload(
        envelope_id: &str,
        team_id: &str,
        api_key: &str,
    ) -> serde_json::Value {
        json!({
            "envelope_id": envelope_id,
            "type": "interactive",
            "payload": {
                "type": "view_submission",
                "team": { "id": team_id },
                "view": {
                    "callback_id": "configure",
                    "state": { "values": {
                        "api_key": { "input": { "value": api_key } },
                        "model": { "input": { "selected_option": { "value": "gpt-4" } } }
                    } }
                }
            }
        })
    }

    fn resolver_with(store: ConfigStore) -> ConfigResolver {
        ConfigResolver::new(
            store,
            ProcessDefaults {
                api_key: None,
                model: BASELINE_MODEL.to_owned(),
                system_prompt: "default template".to_owned(),
                prompt_override_enabled: true,
            },
        )
    }

    fn single_attempt_policy() -> ReconnectPolicy {
        ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(message_payload("env-1", "T1"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            resolver_with(ConfigStore::new(Arc::new(MemoryObjectStore::new()))),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec![("env-1".to_owned(), None)]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            resolver_with(ConfigStore::new(Arc::new(MemoryObjectStore::new()))),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn handlers_see_the_stored_config_for_the_envelope_workspace() {
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        store
            .save(
                &WorkspaceId::new("T-configured"),
                &WorkspaceConfig { model: Some("gpt-4".to_owned()), ..Default::default() },
            )
            .await
            .expect("seed");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ResolvedModelRecorder { seen: seen.clone() });

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(message_payload("env-1", "T-configured"))),
                Ok(Some(message_payload("env-2", "T-other"))),
                Ok(None),
            ],
        ));

        let runner =
            SocketModeRunner::new(transport, resolver_with(store), dispatcher, single_attempt_policy());
        runner.start().await.expect("pump");

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 2);
        // Stored record for T-configured, process defaults for T-other.
        assert_eq!(seen[0].as_deref(), Some("gpt-4"));
        assert_eq!(seen[1].as_deref(), Some(BASELINE_MODEL));
    }

    #[tokio::test]
    async fn unparseable_payload_is_acked_and_skipped() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                // No team id anywhere: unparseable, but carries an envelope id.
                Ok(Some(json!({
                    "envelope_id": "env-bad",
                    "type": "events_api",
                    "payload": { "event": { "type": "message" } }
                }))),
                Ok(Some(message_payload("env-good", "T1"))),
                Ok(None),
            ],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            resolver_with(ConfigStore::new(Arc::new(MemoryObjectStore::new()))),
            EventDispatcher::default(),
            single_attempt_policy(),
        );
        runner.start().await.expect("pump");

        assert_eq!(
            transport.acknowledgements().await,
            vec![("env-bad".to_owned(), None), ("env-good".to_owned(), None)]
        );
    }

    #[tokio::test]
    async fn rejected_view_submission_ack_carries_field_errors() {
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ConfigureSubmissionHandler::new(
            ConfigEditor::new(Arc::new(RejectAllProvider)),
            store.clone(),
        ));

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(view_submission_payload("env-1", "T1", "sk-dead"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            resolver_with(store.clone()),
            dispatcher,
            single_attempt_policy(),
        );
        runner.start().await.expect("pump");

        let acks = transport.acknowledgements().await;
        assert_eq!(acks.len(), 1);
        let (envelope_id, body) = &acks[0];
        assert_eq!(envelope_id, "env-1");

        // The rejection must ride the ack itself so the modal stays open.
        let body = body.as_ref().expect("verdict body");
        assert_eq!(body["response_action"], "errors");
        assert_eq!(body["errors"]["api_key"], "This API key seems to be invalid");
        assert!(store.load(&WorkspaceId::new("T1")).await.is_err());
    }

    #[tokio::test]
    async fn accepted_view_submission_gets_a_plain_closing_ack() {
        let store = ConfigStore::new(Arc::new(MemoryObjectStore::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ConfigureSubmissionHandler::new(
            ConfigEditor::new(Arc::new(AcceptAllProvider)),
            store.clone(),
        ));

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(view_submission_payload("env-1", "T1", "sk-good"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            resolver_with(store),
            dispatcher,
            single_attempt_policy(),
        );
        runner.start().await.expect("pump");

        assert_eq!(transport.acknowledgements().await, vec![("env-1".to_owned(), None)]);
    }
}
