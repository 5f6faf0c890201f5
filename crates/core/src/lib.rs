//! Core domain types for chatrelay - a Slack bot that relays workspace
//! messages to an LLM completion API.
//!
//! Everything that is shared across the interface crates lives here:
//! - **Process configuration** (`config`) - immutable `AppConfig` built once
//!   at startup from defaults, an optional TOML file, and `CHATRELAY_*` env
//!   overrides.
//! - **Workspace configuration** (`workspace`) - the per-tenant stored record
//!   (`WorkspaceConfig`) and the request-scoped merge result
//!   (`ResolvedContext`).
//! - **Provider boundary** (`provider`) - the `CompletionProvider` trait used
//!   both for credential validation and for generating replies.
//! - **Configure flow** (`flows`) - the state machine for one configure-modal
//!   interaction (open, validate, ack, persist).
//!
//! # Design principle
//!
//! There is no in-process mutable configuration state. `AppConfig` is never
//! mutated after construction, and everything workspace-specific is either a
//! `ResolvedContext` (one per inbound event, discarded afterwards) or lives
//! in the external store behind `chatrelay-store`.

pub mod config;
pub mod errors;
pub mod flows;
pub mod provider;
pub mod workspace;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use errors::StoreError;
pub use flows::{ConfigurePhase, ConfigureSignal, PhaseTransitionError};
pub use provider::{
    model_label, CompletionProvider, CompletionRequest, ProviderError, BASELINE_MODEL,
    MODEL_CATALOG,
};
pub use workspace::{
    ProcessDefaults, ResolvedContext, ResolvedSource, WorkspaceConfig, WorkspaceId,
    DEFAULT_SYSTEM_PROMPT,
};
