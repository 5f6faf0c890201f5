//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack interface for chatrelay:
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Events** (`events`) - home tab opens, messages, configure interactions,
//!   uninstall / token-revocation teardown
//! - **Resolver** (`resolver`) - per-event middleware that loads the
//!   workspace's stored configuration (or process defaults) before dispatch
//! - **Configure flow** (`configure`) - the configure modal: render, validate
//!   against the provider, ack, then persist asynchronously
//! - **Lifecycle** (`lifecycle`) - installation and config cleanup on
//!   uninstall and token revocation
//! - **Block Kit** (`blocks`) - view and message builders (home tab, modal)
//!
//! # Architecture
//!
//! ```text
//! Slack Events → ConfigResolver → EventDispatcher → Handlers
//!                     ↓                                ↓
//!              ResolvedContext              ConfigEditor / Teardown
//!                                                     ↓
//!                                            ConfigStore / Provider
//! ```
//!
//! Configuration is resolved once per envelope and threaded through handler
//! signatures as a typed `ResolvedContext`; no handler reaches into shared
//! mutable state.

pub mod blocks;
pub mod configure;
pub mod events;
pub mod lifecycle;
pub mod resolver;
pub mod socket;
