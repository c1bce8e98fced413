use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::feed::Watch;
use crate::path::StorePath;

/// A remote key-value tree: the persistence and fan-out mechanism behind the
/// messaging relay.
///
/// Records live at leaf paths. Writing a path replaces everything below it;
/// removing a path removes its whole subtree. Server-timestamp placeholders
/// (see [`crate::server_timestamp`]) are resolved by the store on every write.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Record stored exactly at `path`.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>>;

    /// Records directly below `path`, keyed by their last segment and sorted
    /// by key.
    async fn children(&self, path: &StorePath) -> Result<Vec<(String, Value)>>;

    /// Write `value` at `path`, replacing any previous record and subtree.
    async fn set(&self, path: &StorePath, value: Value) -> Result<()>;

    /// Write `value` under a fresh push id below `parent`. Push ids sort in
    /// allocation order. Returns the id.
    async fn push(&self, parent: &StorePath, value: Value) -> Result<String>;

    /// Merge `fields` into the record at `path`, creating it if absent.
    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<()>;

    /// Remove the record at `path` and its subtree. Returns whether anything
    /// was removed; removing nothing is not an error.
    async fn remove(&self, path: &StorePath) -> Result<bool>;

    /// Start listening for changes overlapping `path`.
    fn watch(&self, path: &StorePath) -> Result<Watch>;
}
