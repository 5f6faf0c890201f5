use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// System instruction used when neither the workspace nor the process
/// configuration overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a bot in a Slack chat room. You can receive messages from multiple people.
Format bold text *like this*, italic text _like this_ and strikethrough text ~like this~.
Slack user IDs match the regex `<@U.*?>`.";

/// Opaque Slack team id; the only key under which workspace state is stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The stored per-workspace record. Each field is independently optional;
/// the record is always read and overwritten wholesale, never field by field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Process-wide fallbacks, derived from `AppConfig` once at startup and
/// never mutated afterwards.
#[derive(Clone, Debug)]
pub struct ProcessDefaults {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub system_prompt: String,
    pub prompt_override_enabled: bool,
}

impl Default for ProcessDefaults {
    fn default() -> Self {
        Self {
            api_key: None,
            model: crate::provider::BASELINE_MODEL.to_owned(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            prompt_override_enabled: true,
        }
    }
}

/// Where a `ResolvedContext` came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedSource {
    /// A stored record existed for the workspace; its fields were copied
    /// verbatim (absent fields stay absent).
    Stored,
    /// No usable record; the context carries the process defaults wholesale.
    Defaults,
}

/// Effective configuration for one inbound event. Built by the resolver
/// before dispatch, threaded through handler signatures, discarded at the
/// end of the request. Never persisted.
#[derive(Clone, Debug)]
pub struct ResolvedContext {
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub source: ResolvedSource,
}

impl ResolvedContext {
    pub fn from_stored(record: WorkspaceConfig) -> Self {
        Self {
            api_key: record.api_key.map(SecretString::from),
            model: record.model,
            system_prompt: record.system_prompt,
            source: ResolvedSource::Stored,
        }
    }

    pub fn from_defaults(defaults: &ProcessDefaults) -> Self {
        Self {
            api_key: defaults.api_key.clone(),
            model: Some(defaults.model.clone()),
            system_prompt: Some(defaults.system_prompt.clone()),
            source: ResolvedSource::Defaults,
        }
    }

    /// Model to use downstream when a stored record omitted the field.
    pub fn effective_model<'a>(&'a self, defaults: &'a ProcessDefaults) -> &'a str {
        self.model.as_deref().unwrap_or(&defaults.model)
    }

    /// System prompt for the completion call. Stored overrides are only
    /// honored while prompt override is enabled for the process.
    pub fn effective_system_prompt<'a>(&'a self, defaults: &'a ProcessDefaults) -> &'a str {
        if defaults.prompt_override_enabled {
            self.system_prompt.as_deref().unwrap_or(&defaults.system_prompt)
        } else {
            &defaults.system_prompt
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}
