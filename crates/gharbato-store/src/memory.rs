//! In-process store backend.
//!
//! Keeps the whole tree in a `BTreeMap` keyed by full path, so children and
//! subtrees are contiguous key ranges. Faults can be injected to exercise the
//! relay's error paths: going offline makes every operation fail with
//! [`StoreError::Unavailable`], and denying a path fails operations on it with
//! [`StoreError::PermissionDenied`] and cancels overlapping watchers.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clock::ServerClock;
use crate::error::{Result, StoreError};
use crate::feed::{ChangeFeed, StoreEvent, Watch, DEFAULT_FEED_CAPACITY};
use crate::path::StorePath;
use crate::remote::RemoteStore;
use crate::value::{merge_fields, resolve_server_values};

#[derive(Default)]
struct Faults {
    closed: bool,
    offline: bool,
    denied: Vec<StorePath>,
}

pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Value>>,
    clock: ServerClock,
    feed: ChangeFeed,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(ServerClock::new(), DEFAULT_FEED_CAPACITY)
    }

    pub fn with_clock(clock: ServerClock, feed_capacity: usize) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            clock,
            feed: ChangeFeed::new(feed_capacity),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_online(&self, online: bool) {
        self.faults().offline = !online;
        info!(online, "memory store connectivity changed");
    }

    /// Deny access to `path` and everything overlapping it. Active watchers
    /// on overlapping paths are cancelled.
    pub fn deny(&self, path: &StorePath) {
        self.faults().denied.push(path.clone());
        info!(path = %path, "memory store access revoked");
        self.feed.publish(StoreEvent::Revoked {
            path: path.clone(),
            reason: format!("access to {path} revoked"),
        });
    }

    /// Lift a previous [`MemoryStore::deny`].
    pub fn allow(&self, path: &StorePath) {
        self.faults().denied.retain(|denied| denied != path);
    }

    /// Shut the store down: every watcher ends and later operations fail
    /// with [`StoreError::Closed`].
    pub fn close(&self) {
        let already = std::mem::replace(&mut self.faults().closed, true);
        if !already {
            info!("memory store closed");
            self.feed.publish(StoreEvent::Closed);
        }
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, path: &StorePath) -> Result<()> {
        let faults = self.faults();
        if faults.closed {
            return Err(StoreError::Closed);
        }
        if faults.offline {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        if let Some(denied) = faults.denied.iter().find(|denied| denied.overlaps(path)) {
            return Err(StoreError::PermissionDenied(format!(
                "{path} is covered by a rule denying {denied}"
            )));
        }
        Ok(())
    }

    fn check_writable(&self, path: &StorePath) -> Result<()> {
        if path.is_root() {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                reason: "cannot write the root",
            });
        }
        self.check(path)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_subtree(nodes: &mut BTreeMap<String, Value>, path: &StorePath) -> usize {
    let mut removed = usize::from(nodes.remove(path.as_str()).is_some());
    let (lower, upper) = path.descendant_range();
    let doomed: Vec<String> = nodes.range(lower..upper).map(|(k, _)| k.clone()).collect();
    removed += doomed.len();
    for key in doomed {
        nodes.remove(&key);
    }
    removed
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        self.check(path)?;
        Ok(self.nodes.read().await.get(path.as_str()).cloned())
    }

    async fn children(&self, path: &StorePath) -> Result<Vec<(String, Value)>> {
        self.check(path)?;
        let nodes = self.nodes.read().await;

        let direct_child = |key: &str, rest: &str| -> Option<(String, Value)> {
            if rest.is_empty() || rest.contains('/') {
                return None;
            }
            nodes.get(key).map(|v| (rest.to_string(), v.clone()))
        };

        let children = if path.is_root() {
            nodes
                .keys()
                .filter_map(|key| direct_child(key.as_str(), key.as_str()))
                .collect()
        } else {
            let (lower, upper) = path.descendant_range();
            let prefix_len = lower.len();
            nodes
                .range(lower..upper)
                .filter_map(|(key, _)| direct_child(key.as_str(), &key[prefix_len..]))
                .collect()
        };
        Ok(children)
    }

    async fn set(&self, path: &StorePath, mut value: Value) -> Result<()> {
        self.check_writable(path)?;
        resolve_server_values(&mut value, self.clock.now_millis());
        {
            let mut nodes = self.nodes.write().await;
            remove_subtree(&mut nodes, path);
            nodes.insert(path.as_str().to_string(), value);
        }
        debug!(path = %path, "set");
        self.feed.publish(StoreEvent::Changed(path.clone()));
        Ok(())
    }

    async fn push(&self, parent: &StorePath, mut value: Value) -> Result<String> {
        self.check_writable(parent)?;
        let (id, now) = self.clock.next_push_id();
        let path = parent.child(&id)?;
        resolve_server_values(&mut value, now);
        self.nodes
            .write()
            .await
            .insert(path.as_str().to_string(), value);
        debug!(path = %path, "push");
        self.feed.publish(StoreEvent::Changed(path));
        Ok(id)
    }

    async fn update(&self, path: &StorePath, mut fields: Map<String, Value>) -> Result<()> {
        self.check_writable(path)?;
        let now = self.clock.now_millis();
        for value in fields.values_mut() {
            resolve_server_values(value, now);
        }
        {
            let mut nodes = self.nodes.write().await;
            let record = nodes
                .entry(path.as_str().to_string())
                .or_insert(Value::Null);
            merge_fields(record, fields);
        }
        debug!(path = %path, "update");
        self.feed.publish(StoreEvent::Changed(path.clone()));
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<bool> {
        self.check_writable(path)?;
        let removed = remove_subtree(&mut *self.nodes.write().await, path);
        debug!(path = %path, removed, "remove");
        if removed > 0 {
            self.feed.publish(StoreEvent::Changed(path.clone()));
        }
        Ok(removed > 0)
    }

    fn watch(&self, path: &StorePath) -> Result<Watch> {
        self.check(path)?;
        Ok(self.feed.watch(path.clone()))
    }
}
