//! Persistence for per-workspace configuration.
//!
//! The storage contract is deliberately tiny: an `ObjectStore` moves opaque
//! bytes under a string key (get / put / delete, delete idempotent), and
//! `ConfigStore` layers the JSON encoding of `WorkspaceConfig` on top. The
//! production backing is a single SQLite table behind the workspace `sqlx`
//! pool; `MemoryObjectStore` serves tests and local development.

pub mod config_store;
pub mod connection;
pub mod migrations;
pub mod object;
pub mod sqlite;

pub use config_store::ConfigStore;
pub use connection::{connect, connect_with_settings, DbPool};
pub use object::{MemoryObjectStore, ObjectStore};
pub use sqlite::SqliteObjectStore;
