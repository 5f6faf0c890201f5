use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

/// Model used to verify that a submitted API key is valid at all, before the
/// selected model is checked against the same key. Every OpenAI key can see
/// this model, so a lookup failure means the key itself is bad.
pub const BASELINE_MODEL: &str = "gpt-3.5-turbo";

/// Models offered in the configure form, with their display labels.
/// The first entry is the cheapest and doubles as the select default.
pub const MODEL_CATALOG: &[(&str, &str)] =
    &[("gpt-3.5-turbo", "GPT-3.5 Turbo"), ("gpt-4", "GPT-4")];

pub fn model_label(model_id: &str) -> Option<&'static str> {
    MODEL_CATALOG.iter().find(|(id, _)| *id == model_id).map(|(_, label)| *label)
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    #[error("provider call timed out after {0}s")]
    Timeout(u64),
    #[error("provider transport failure: {0}")]
    Transport(String),
}

impl ProviderError {
    /// True when the provider explicitly refused the credential or model,
    /// as opposed to the call not completing.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub api_key: SecretString,
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_text: String,
}

/// Boundary to the upstream completion service.
///
/// `lookup_model` is used purely as a credential/model-compatibility check
/// during the configure workflow; `complete` generates the actual reply for
/// the message path. Implementations must bound each call by the configured
/// provider timeout.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn lookup_model(
        &self,
        api_key: &SecretString,
        model_id: &str,
    ) -> Result<(), ProviderError>;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
