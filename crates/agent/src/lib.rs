//! Upstream LLM integration for chatrelay.
//!
//! Implements the `CompletionProvider` contract from `chatrelay-core`
//! against the OpenAI HTTP API, plus the label `Translator` used by the
//! configure UI once a workspace has a working key.
//!
//! The provider is used in two very different modes:
//! - `lookup_model` as a cheap credential/model-compatibility check during
//!   the configure workflow (never to generate text), and
//! - `complete` on the message path with the per-request resolved
//!   key/model/prompt.

pub mod openai;
pub mod translate;

pub use openai::OpenAiProvider;
pub use translate::{FixedLanguage, LlmTranslator, Translator};
