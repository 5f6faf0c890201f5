use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use chatrelay_core::{CompletionProvider, CompletionRequest};

/// Localizes user-visible UI strings (home-tab copy, configure labels).
///
/// Translation is a courtesy, not a contract: implementations return the
/// input unchanged when they cannot do better, and the caller only engages
/// a real translator once the workspace has a working API key to pay for it.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, locale: Option<&str>) -> String;
}

/// Passthrough translator; the UI stays in its authored language.
#[derive(Default)]
pub struct FixedLanguage;

#[async_trait]
impl Translator for FixedLanguage {
    async fn translate(&self, text: &str, _locale: Option<&str>) -> String {
        text.to_owned()
    }
}

/// Translator that asks the completion provider to rewrite a label in the
/// viewer's Slack locale, billed to the workspace's own key.
pub struct LlmTranslator {
    provider: Arc<dyn CompletionProvider>,
    api_key: SecretString,
    model: String,
}

impl LlmTranslator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Self {
        Self { provider, api_key, model: model.into() }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, locale: Option<&str>) -> String {
        let Some(locale) = locale else {
            return text.to_owned();
        };
        if locale.starts_with("en") {
            return text.to_owned();
        }

        let request = CompletionRequest {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            system_prompt: Some(format!(
                "Translate the user's message into the language for locale `{locale}`. \
                 Reply with the translation only, no commentary."
            )),
            user_text: text.to_owned(),
        };

        match self.provider.complete(&request).await {
            Ok(translated) if !translated.trim().is_empty() => translated.trim().to_owned(),
            Ok(_) => text.to_owned(),
            Err(error) => {
                debug!(%error, locale, "label translation failed; using original text");
                text.to_owned()
            }
        }
    }
}
