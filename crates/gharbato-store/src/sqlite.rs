//! SQLite-backed store.
//!
//! Persists the tree in a [`Database`]. Change notifications cover writes
//! made through this handle only; another process writing the same file is
//! not observed.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::clock::ServerClock;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::feed::{ChangeFeed, StoreEvent, Watch, DEFAULT_FEED_CAPACITY};
use crate::path::StorePath;
use crate::remote::RemoteStore;
use crate::value::{merge_fields, resolve_server_values};

/// Fresh ids tried before `push` gives up on a contended tick.
const PUSH_ATTEMPTS: usize = 1024;

pub struct SqliteStore {
    db: Mutex<Database>,
    clock: ServerClock,
    feed: ChangeFeed,
    closed: AtomicBool,
}

impl SqliteStore {
    pub fn new(db: Database) -> Result<Self> {
        Self::with_feed_capacity(db, DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(db: Database, feed_capacity: usize) -> Result<Self> {
        Self::with_clock(db, ServerClock::new(), feed_capacity)
    }

    /// Build on `db` with a custom clock. The clock is first advanced past
    /// the newest persisted write, so timestamps keep increasing across
    /// restarts even if the wall clock went backwards.
    pub fn with_clock(db: Database, clock: ServerClock, feed_capacity: usize) -> Result<Self> {
        if let Some(latest) = db.latest_update()? {
            clock.advance_to(latest);
        }
        info!(path = ?db.path(), "sqlite store ready");
        Ok(Self {
            db: Mutex::new(db),
            clock,
            feed: ChangeFeed::new(feed_capacity),
            closed: AtomicBool::new(false),
        })
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Self::new(Database::open_at(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Database::open_in_memory()?)
    }

    /// Shut the store down: every watcher ends and later operations fail
    /// with [`StoreError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.feed.publish(StoreEvent::Closed);
        }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(self.db.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn writable(path: &StorePath) -> Result<()> {
    if path.is_root() {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "cannot write the root",
        });
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        self.db()?.get_node(path)
    }

    async fn children(&self, path: &StorePath) -> Result<Vec<(String, Value)>> {
        self.db()?.child_nodes(path)
    }

    async fn set(&self, path: &StorePath, mut value: Value) -> Result<()> {
        writable(path)?;
        let now = self.clock.now_millis();
        resolve_server_values(&mut value, now);
        self.db()?.put_node(path, &value, now)?;
        debug!(path = %path, "set");
        self.feed.publish(StoreEvent::Changed(path.clone()));
        Ok(())
    }

    async fn push(&self, parent: &StorePath, value: Value) -> Result<String> {
        writable(parent)?;
        let db = self.db()?;
        // Another handle on the same file may have taken the id already.
        for _ in 0..PUSH_ATTEMPTS {
            let (id, now) = self.clock.next_push_id();
            let path = parent.child(&id)?;
            let mut record = value.clone();
            resolve_server_values(&mut record, now);
            if db.insert_node(&path, &record, now)? {
                drop(db);
                debug!(path = %path, "push");
                self.feed.publish(StoreEvent::Changed(path));
                return Ok(id);
            }
            debug!(path = %path, "push id already taken, allocating another");
        }
        Err(StoreError::Unavailable(format!(
            "no free push id under {parent} after {PUSH_ATTEMPTS} attempts"
        )))
    }

    async fn update(&self, path: &StorePath, mut fields: Map<String, Value>) -> Result<()> {
        writable(path)?;
        let now = self.clock.now_millis();
        for value in fields.values_mut() {
            resolve_server_values(value, now);
        }
        {
            let mut db = self.db()?;
            let mut record = db.get_node(path)?.unwrap_or(Value::Null);
            merge_fields(&mut record, fields);
            db.put_node(path, &record, now)?;
        }
        debug!(path = %path, "update");
        self.feed.publish(StoreEvent::Changed(path.clone()));
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<bool> {
        writable(path)?;
        let removed = self.db()?.delete_node(path)?;
        debug!(path = %path, removed, "remove");
        if removed > 0 {
            self.feed.publish(StoreEvent::Changed(path.clone()));
        }
        Ok(removed > 0)
    }

    fn watch(&self, path: &StorePath) -> Result<Watch> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(self.feed.watch(path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::feed::WatchEvent;
    use crate::value::server_timestamp;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("store.db");
        let parent = path("conversations/u1_u2/messages");

        let id = {
            let store = SqliteStore::open_at(&file).unwrap();
            store
                .push(&parent, json!({"body": "hello", "sentAt": server_timestamp()}))
                .await
                .unwrap()
        };

        let store = SqliteStore::open_at(&file).unwrap();
        let children = store.children(&parent).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, id);
        assert_eq!(children[0].1["body"], json!("hello"));
        assert!(children[0].1["sentAt"].is_i64());
    }

    #[tokio::test]
    async fn update_and_remove_notify_watchers() {
        let store = SqliteStore::open_in_memory().unwrap();
        let msg = path("conversations/k/messages/m1");
        store.set(&msg, json!({"read": false})).await.unwrap();

        let mut watch = store.watch(&path("conversations/k/messages")).unwrap();

        let mut fields = Map::new();
        fields.insert("read".into(), json!(true));
        store.update(&msg, fields).await.unwrap();
        assert!(matches!(watch.next().await, Some(WatchEvent::Changed)));
        assert_eq!(store.get(&msg).await.unwrap(), Some(json!({"read": true})));

        assert!(store.remove(&msg).await.unwrap());
        assert!(matches!(watch.next().await, Some(WatchEvent::Changed)));
        assert!(!store.remove(&msg).await.unwrap());

        store.close();
        assert!(watch.next().await.is_none());
    }

    #[tokio::test]
    async fn two_handles_on_one_file_never_share_a_push_id() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("shared.db");
        let parent = path("conversations/u1_u2/messages");
        // Same frozen wall clock on both handles: every push collides first.
        let first = SqliteStore::with_clock(
            Database::open_at(&file).unwrap(),
            ServerClock::with_wall_clock(|| 7_000),
            16,
        )
        .unwrap();
        let second = SqliteStore::with_clock(
            Database::open_at(&file).unwrap(),
            ServerClock::with_wall_clock(|| 7_000),
            16,
        )
        .unwrap();

        let mut acked = Vec::new();
        for round in 0..20 {
            acked.push(first.push(&parent, json!({"body": format!("a{round}")})).await.unwrap());
            acked.push(second.push(&parent, json!({"body": format!("b{round}")})).await.unwrap());
        }

        let mut unique = acked.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 40);
        assert_eq!(first.children(&parent).await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn reopen_keeps_timestamps_increasing_when_wall_clock_goes_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clock.db");
        let parent = path("conversations/u1_u2/messages");

        let before = {
            let store = SqliteStore::with_clock(
                Database::open_at(&file).unwrap(),
                ServerClock::with_wall_clock(|| 9_000),
                16,
            )
            .unwrap();
            store
                .push(&parent, json!({"sentAt": server_timestamp()}))
                .await
                .unwrap()
        };

        let store = SqliteStore::with_clock(
            Database::open_at(&file).unwrap(),
            ServerClock::with_wall_clock(|| 1_000),
            16,
        )
        .unwrap();
        let after = store
            .push(&parent, json!({"sentAt": server_timestamp()}))
            .await
            .unwrap();

        let children = store.children(&parent).await.unwrap();
        assert_eq!(children.len(), 2);
        assert!(before < after);
        assert!(children.iter().all(|(_, v)| v["sentAt"] == json!(9_000)));
    }

    #[tokio::test]
    async fn operations_after_close_fail() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.close();
        store.close();
        assert!(matches!(
            store.set(&path("a"), json!(1)).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.get(&path("a")).await, Err(StoreError::Closed)));
        assert!(matches!(store.watch(&path("a")), Err(StoreError::Closed)));
    }
}
