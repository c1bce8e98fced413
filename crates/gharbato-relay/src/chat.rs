//! Two-party chat over the remote store.
//!
//! Every change under `conversations/{key}/messages` makes a subscriber
//! re-read the whole collection and receive a freshly sorted view. There is
//! no incremental merge, so the local view can never drift from the store.
//!
//! Order is ascending `sent_at` (server clock). Messages stamped in the same
//! server tick are ordered by their push id, which the store allocates in
//! write order.

use std::sync::Arc;

use gharbato_shared::{ConversationKey, Message, ParticipantId};
use gharbato_store::{server_timestamp, RemoteStore, StorePath, WatchEvent};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{RelayError, SendError};
use crate::listener::MessageListener;
use crate::paths;
use crate::subscription::{DeliveryGate, Subscription};

/// Subscribe to and write the messages of two-party conversations.
#[derive(Clone)]
pub struct MessageStream {
    store: Arc<dyn RemoteStore>,
    max_body_len: usize,
}

impl MessageStream {
    pub fn new(store: Arc<dyn RemoteStore>, max_body_len: usize) -> Self {
        Self {
            store,
            max_body_len,
        }
    }

    /// Start delivering the ordered message view of `key` to `listener`.
    ///
    /// The current view is delivered right away, then again after every
    /// change. Must be called from within a tokio runtime.
    pub fn subscribe<L: MessageListener>(&self, key: &ConversationKey, listener: L) -> Subscription {
        let store = self.store.clone();
        let path = paths::messages(key);
        let label = path
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| key.to_string());

        Subscription::spawn(label, move |gate| async move {
            match path {
                Ok(path) => run_message_feed(store, path, gate, listener).await,
                Err(e) => {
                    let mut listener = listener;
                    report_failure(&gate, &mut listener, RelayError::from(e));
                }
            }
        })
    }

    /// Append a message to the conversation.
    ///
    /// The store stamps `sentAt` with its own clock. Returns the store-assigned
    /// message id once the write is acknowledged; does not wait for listeners.
    pub async fn send(
        &self,
        key: &ConversationKey,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
    ) -> Result<String, SendError> {
        let (sender, receiver) = self.validate_send(key, sender_id, receiver_id, body)?;
        let path = paths::messages(key)?;

        let record = Message::outgoing_record(&sender, &receiver, body, server_timestamp());
        let id = self.store.push(&path, record).await.map_err(|e| {
            warn!(conversation = %key, error = %e, "message send failed");
            SendError::from(e)
        })?;

        debug!(
            conversation = %key,
            message = %id,
            sender = %sender.short(),
            "message sent"
        );
        Ok(id)
    }

    /// One-shot read of the ordered view, without subscribing.
    pub async fn snapshot(&self, key: &ConversationKey) -> Result<Vec<Message>, RelayError> {
        let path = paths::messages(key)?;
        read_view(self.store.as_ref(), &path).await
    }

    /// Mark a message as read. Only its receiver may do so.
    pub async fn mark_read(
        &self,
        key: &ConversationKey,
        message_id: &str,
        reader_id: &str,
    ) -> Result<(), SendError> {
        if message_id.is_empty() {
            return Err(SendError::InvalidArgument("message id is empty".into()));
        }
        let path = paths::message(key, message_id)?;

        let value = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| SendError::InvalidArgument(format!("unknown message {message_id}")))?;
        let message = Message::from_record(message_id, &value)
            .map_err(|e| SendError::InvalidArgument(format!("message {message_id}: {e}")))?;

        if message.receiver_id != reader_id {
            return Err(SendError::InvalidArgument(format!(
                "only the receiver may mark message {message_id} as read"
            )));
        }
        if message.read {
            return Ok(());
        }

        let mut fields = Map::new();
        fields.insert("read".into(), Value::Bool(true));
        self.store.update(&path, fields).await?;
        debug!(conversation = %key, message = %message_id, "message marked read");
        Ok(())
    }

    fn validate_send(
        &self,
        key: &ConversationKey,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
    ) -> Result<(ParticipantId, ParticipantId), SendError> {
        let sender = ParticipantId::new(sender_id)
            .map_err(|_| SendError::InvalidArgument("sender id is empty".into()))?;
        let receiver = ParticipantId::new(receiver_id)
            .map_err(|_| SendError::InvalidArgument("receiver id is empty".into()))?;

        if body.trim().is_empty() {
            return Err(SendError::InvalidArgument("message body is empty".into()));
        }
        let len = body.chars().count();
        if len > self.max_body_len {
            return Err(SendError::InvalidArgument(format!(
                "message body has {len} characters, limit is {}",
                self.max_body_len
            )));
        }
        if !key.is_between(sender_id, receiver_id) {
            return Err(SendError::InvalidArgument(format!(
                "{sender} and {receiver} are not the participants of {key}"
            )));
        }
        Ok((sender, receiver))
    }
}

/// Parse raw children into the ordered message view.
///
/// Malformed records are skipped. Order is `sent_at`, then message id.
pub fn materialize(children: Vec<(String, Value)>) -> Vec<Message> {
    let mut messages: Vec<Message> = children
        .into_iter()
        .filter_map(|(id, value)| match Message::from_record(&id, &value) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(message = %id, error = %e, "skipping malformed message record");
                None
            }
        })
        .collect();

    messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
    messages
}

async fn read_view(store: &dyn RemoteStore, path: &StorePath) -> Result<Vec<Message>, RelayError> {
    let children = store.children(path).await?;
    Ok(materialize(children))
}

async fn run_message_feed<L: MessageListener>(
    store: Arc<dyn RemoteStore>,
    path: StorePath,
    gate: DeliveryGate,
    mut listener: L,
) {
    // Watch before the first read so no write can fall between the two.
    let mut watch = match store.watch(&path) {
        Ok(watch) => watch,
        Err(e) => return report_failure(&gate, &mut listener, e.into()),
    };
    info!(path = %path, "message feed attached");

    loop {
        let view = match read_view(store.as_ref(), &path).await {
            Ok(view) => view,
            Err(e) => return report_failure(&gate, &mut listener, e),
        };
        if !gate.deliver(|| listener.on_update(&view)) {
            break;
        }

        match watch.next().await {
            Some(WatchEvent::Changed) => {}
            Some(WatchEvent::Lagged(missed)) => {
                debug!(path = %path, missed, "message feed lagged, re-reading");
            }
            Some(WatchEvent::Revoked(e)) => return report_failure(&gate, &mut listener, e.into()),
            None => return report_failure(&gate, &mut listener, RelayError::StoreClosed),
        }
    }
    debug!(path = %path, "message feed detached");
}

fn report_failure<L: MessageListener>(gate: &DeliveryGate, listener: &mut L, error: RelayError) {
    warn!(error = %error, "message feed failed");
    gate.deliver(|| listener.on_error(error));
    gate.close();
}
