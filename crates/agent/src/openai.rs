use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use chatrelay_core::{CompletionProvider, CompletionRequest, ProviderError};

/// OpenAI-backed `CompletionProvider`.
///
/// Each call carries its own API key (per-workspace), so the client holds
/// no credential state; only the base URL and the timeout are shared.
pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout_secs,
        }
    }

    fn classify(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else {
            ProviderError::Transport(error.to_string())
        }
    }
}

fn rejected(status: StatusCode, what: &str) -> ProviderError {
    ProviderError::Rejected(format!("{what} refused with status {status}"))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn lookup_model(
        &self,
        api_key: &SecretString,
        model_id: &str,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/v1/models/{model_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key.expose_secret())
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // 401/403 mean the key is bad, 404 means this key cannot see the
        // model. Both are explicit refusals, not transport problems.
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::NOT_FOUND
        {
            return Err(rejected(status, &format!("model lookup for `{model_id}`")));
        }

        Err(ProviderError::Transport(format!("model lookup returned status {status}")))
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": request.user_text }));

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(request.api_key.expose_secret())
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&json!({ "model": request.model, "messages": messages }))
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(rejected(status, "completion"));
            }
            return Err(ProviderError::Transport(format!(
                "completion returned status {status}"
            )));
        }

        let body: ChatCompletionResponse =
            response.json().await.map_err(|error| self.classify(error))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::Transport("completion response carried no content".to_owned())
            })
    }
}
