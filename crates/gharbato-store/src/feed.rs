//! Change notifications for store listeners.
//!
//! Every backend owns one [`ChangeFeed`]. Writes publish the path they
//! touched; each [`Watch`] filters the feed down to events overlapping the
//! path it was opened on. A watcher that falls behind is told how many events
//! it missed instead of failing, since listeners re-read the whole subtree
//! anyway.

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StoreError;
use crate::path::StorePath;

/// Default number of buffered events per feed.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Raw event published by a backend.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Data at or below `path` was written or removed.
    Changed(StorePath),
    /// Listeners overlapping `path` lost read permission.
    Revoked { path: StorePath, reason: String },
    /// The backend shut down; no further events follow.
    Closed,
}

/// Event seen by a single watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// Something under the watched path changed.
    Changed,
    /// The watcher missed this many events; treat as a change.
    Lagged(u64),
    /// The listener was cancelled by the store.
    Revoked(StoreError),
}

pub struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: StoreEvent) {
        // No receivers is the normal idle state.
        if self.tx.send(event).is_err() {
            debug!("change published with no active watchers");
        }
    }

    pub fn watch(&self, path: StorePath) -> Watch {
        Watch {
            path,
            rx: self.tx.subscribe(),
        }
    }

    pub fn watcher_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

/// Live listener on one subtree of the store.
pub struct Watch {
    path: StorePath,
    rx: broadcast::Receiver<StoreEvent>,
}

impl Watch {
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Wait for the next relevant event. `None` once the store has closed.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            match self.rx.recv().await {
                Ok(StoreEvent::Changed(path)) => {
                    if path.overlaps(&self.path) {
                        return Some(WatchEvent::Changed);
                    }
                }
                Ok(StoreEvent::Revoked { path, reason }) => {
                    if path.overlaps(&self.path) {
                        return Some(WatchEvent::Revoked(StoreError::PermissionDenied(reason)));
                    }
                }
                Ok(StoreEvent::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(WatchEvent::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn watch_filters_unrelated_paths() {
        let feed = ChangeFeed::new(8);
        let mut watch = feed.watch(path("conversations/a_b/messages"));

        feed.publish(StoreEvent::Changed(path("conversations/a_c/messages/m1")));
        feed.publish(StoreEvent::Changed(path("conversations/a_b/messages/m2")));

        assert!(matches!(watch.next().await, Some(WatchEvent::Changed)));
        assert_eq!(feed.watcher_count(), 1);
    }

    #[tokio::test]
    async fn ancestor_changes_are_relevant() {
        let feed = ChangeFeed::new(8);
        let mut watch = feed.watch(path("call_invitations/u2"));
        feed.publish(StoreEvent::Changed(path("call_invitations")));
        assert!(matches!(watch.next().await, Some(WatchEvent::Changed)));
    }

    #[tokio::test]
    async fn lagging_watcher_is_told_how_much_it_missed() {
        let feed = ChangeFeed::new(2);
        let mut watch = feed.watch(path("a"));
        for i in 0..5 {
            feed.publish(StoreEvent::Changed(path(&format!("a/{i}"))));
        }
        assert!(matches!(watch.next().await, Some(WatchEvent::Lagged(3))));
        assert!(matches!(watch.next().await, Some(WatchEvent::Changed)));
    }

    #[tokio::test]
    async fn revocation_and_close() {
        let feed = ChangeFeed::new(8);
        let mut watch = feed.watch(path("call_invitations/u2"));
        feed.publish(StoreEvent::Revoked {
            path: path("call_invitations"),
            reason: "rules changed".into(),
        });
        feed.publish(StoreEvent::Closed);

        match watch.next().await {
            Some(WatchEvent::Revoked(StoreError::PermissionDenied(reason))) => {
                assert_eq!(reason, "rules changed")
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(watch.next().await.is_none());
    }
}
