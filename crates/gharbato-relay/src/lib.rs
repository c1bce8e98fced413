//! # gharbato-relay
//!
//! Messaging and call-signaling relay for the GharBato marketplace client.
//!
//! - [`MessageStream`]: live, server-ordered view of a two-party
//!   conversation plus sending and read receipts.
//! - [`CallSignaling`]: single-slot call-invitation mailboxes with the
//!   invite / accept / decline / cancel handshake.
//! - [`Relay`]: the service root an application constructs once and passes
//!   by reference to whatever needs chat or calls.
//!
//! All persistence and fan-out is delegated to a [`RemoteStore`].

pub mod chat;
pub mod config;
pub mod error;
pub mod inbox;
pub mod listener;
pub mod paths;
pub mod signaling;
pub mod subscription;

use std::sync::Arc;

use anyhow::Context;
use gharbato_store::{Database, MemoryStore, RemoteStore, ServerClock, SqliteStore};
use tracing_subscriber::{fmt, EnvFilter};

pub use chat::MessageStream;
pub use config::{RelayConfig, StoreBackend};
pub use error::{RelayError, SendError, SignalError};
pub use gharbato_shared::{derive_conversation_key, CallInvitation, ConversationKey, Message, ParticipantId};
pub use inbox::InvitationInbox;
pub use listener::{invitation_handlers, message_handlers, InvitationListener, MessageListener};
pub use signaling::{AcceptedCall, CallPhase, CallSignaling};
pub use subscription::Subscription;

/// Messaging and signaling services sharing one store.
pub struct Relay {
    store: Arc<dyn RemoteStore>,
    messages: MessageStream,
    calls: CallSignaling,
    config: RelayConfig,
}

impl Relay {
    pub fn new(store: Arc<dyn RemoteStore>, config: RelayConfig) -> Self {
        Self {
            messages: MessageStream::new(store.clone(), config.max_body_len),
            calls: CallSignaling::new(store.clone()),
            store,
            config,
        }
    }

    /// Open the store backend named by `config` and build the relay on it.
    pub fn open(config: RelayConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn RemoteStore> = match config.store {
            StoreBackend::Memory => Arc::new(MemoryStore::with_clock(
                ServerClock::new(),
                config.feed_capacity,
            )),
            StoreBackend::Sqlite => {
                let db = match &config.db_path {
                    Some(path) => Database::open_at(path)
                        .with_context(|| format!("opening database at {}", path.display()))?,
                    None => Database::open_default().context("opening default database")?,
                };
                let store = SqliteStore::with_feed_capacity(db, config.feed_capacity)
                    .context("preparing sqlite store")?;
                Arc::new(store)
            }
        };

        tracing::info!(backend = ?config.store, "relay store opened");
        Ok(Self::new(store, config))
    }

    pub fn messages(&self) -> &MessageStream {
        &self.messages
    }

    pub fn calls(&self) -> &CallSignaling {
        &self.calls
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Install the global `tracing` subscriber (respects `RUST_LOG`).
///
/// Call once from the application entry point; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gharbato_relay=debug,gharbato_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
