//! # gharbato-store
//!
//! Access layer for the remote key-value tree that carries GharBato chat
//! messages and call invitations.
//!
//! The [`RemoteStore`] trait is the only seam the relay talks to. Two
//! backends implement it:
//! - [`MemoryStore`]: in-process tree with fault injection (offline mode,
//!   revoked permissions), used by tests and offline demos.
//! - [`SqliteStore`]: the same tree persisted in SQLite through a
//!   `rusqlite::Connection`, with schema migrations.
//!
//! Both stamp server-timestamp placeholders with their own monotonic clock
//! and hand out push ids that sort in creation order.

pub mod clock;
pub mod database;
pub mod feed;
pub mod memory;
pub mod migrations;
pub mod nodes;
pub mod path;
pub mod remote;
pub mod sqlite;
pub mod value;

mod error;

pub use clock::ServerClock;
pub use database::Database;
pub use error::{Result, StoreError};
pub use feed::{ChangeFeed, StoreEvent, Watch, WatchEvent};
pub use memory::MemoryStore;
pub use path::StorePath;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;
pub use value::{is_server_timestamp, resolve_server_values, server_timestamp};
