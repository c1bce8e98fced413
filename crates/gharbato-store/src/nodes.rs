//! CRUD operations on the `nodes` table.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::database::Database;
use crate::error::Result;
use crate::path::StorePath;

impl Database {
    /// Fetch the record stored exactly at `path`.
    pub fn get_node(&self, path: &StorePath) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM nodes WHERE path = ?1",
                params![path.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// List the records directly below `parent`, ordered by key.
    ///
    /// Rows whose JSON no longer parses are returned as `Value::Null` so one
    /// bad row does not hide its siblings.
    pub fn child_nodes(&self, parent: &StorePath) -> Result<Vec<(String, Value)>> {
        let mut stmt = self.conn().prepare(
            "SELECT key, value
             FROM nodes
             WHERE parent = ?1
             ORDER BY key ASC",
        )?;

        let rows = stmt.query_map(params![parent.as_str()], |row| {
            let key: String = row.get(0)?;
            let json: String = row.get(1)?;
            Ok((key, json))
        })?;

        let mut children = Vec::new();
        for row in rows {
            let (key, json) = row?;
            let value = serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "stored node is not valid JSON");
                Value::Null
            });
            children.push((key, value));
        }
        Ok(children)
    }

    /// Replace the record at `path` and drop everything below it.
    pub fn put_node(&mut self, path: &StorePath, value: &Value, now_millis: i64) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let parent = path.parent().unwrap_or_default();
        let key = path.key().unwrap_or_default().to_string();

        let tx = self.conn_mut().transaction()?;
        delete_subtree(&tx, path)?;
        tx.execute(
            "INSERT INTO nodes (path, parent, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path.as_str(), parent.as_str(), key, json, now_millis],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Insert a record at a path that must not exist yet. Returns `false`
    /// and leaves the table untouched if the path is taken.
    pub fn insert_node(&self, path: &StorePath, value: &Value, now_millis: i64) -> Result<bool> {
        let json = serde_json::to_string(value)?;
        let parent = path.parent().unwrap_or_default();
        let key = path.key().unwrap_or_default();

        let inserted = self.conn().execute(
            "INSERT INTO nodes (path, parent, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO NOTHING",
            params![path.as_str(), parent.as_str(), key, json, now_millis],
        )?;
        Ok(inserted == 1)
    }

    /// Newest `updated_at` in the table, if any row exists.
    pub fn latest_update(&self) -> Result<Option<i64>> {
        let latest: Option<i64> =
            self.conn()
                .query_row("SELECT MAX(updated_at) FROM nodes", [], |row| row.get(0))?;
        Ok(latest)
    }

    /// Remove the record at `path` and its subtree. Returns the number of rows
    /// deleted.
    pub fn delete_node(&self, path: &StorePath) -> Result<usize> {
        delete_subtree(self.conn(), path)
    }

    /// Number of stored records.
    pub fn node_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn delete_subtree(conn: &rusqlite::Connection, path: &StorePath) -> Result<usize> {
    // Range bounds instead of LIKE: keys routinely contain '_'.
    let (lower, upper) = path.descendant_range();
    let affected = conn.execute(
        "DELETE FROM nodes WHERE path = ?1 OR (path >= ?2 AND path < ?3)",
        params![path.as_str(), lower, upper],
    )?;
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[test]
    fn put_get_delete() {
        let mut db = Database::open_in_memory().unwrap();
        let slot = path("call_invitations/u2");

        db.put_node(&slot, &json!({"callId": "A"}), 1).unwrap();
        db.put_node(&slot, &json!({"callId": "B"}), 2).unwrap();
        assert_eq!(db.get_node(&slot).unwrap(), Some(json!({"callId": "B"})));
        assert_eq!(db.node_count().unwrap(), 1);

        assert_eq!(db.delete_node(&slot).unwrap(), 1);
        assert_eq!(db.delete_node(&slot).unwrap(), 0);
        assert!(db.get_node(&slot).unwrap().is_none());
    }

    #[test]
    fn children_are_direct_and_sorted() {
        let mut db = Database::open_in_memory().unwrap();
        db.put_node(&path("c/u1_u2/messages/b"), &json!(2), 1).unwrap();
        db.put_node(&path("c/u1_u2/messages/a"), &json!(1), 1).unwrap();
        db.put_node(&path("c/u1_u2/messages/a/deep"), &json!(3), 1).unwrap();
        db.put_node(&path("c/u1_u20/messages/z"), &json!(4), 1).unwrap();

        let children = db.child_nodes(&path("c/u1_u2/messages")).unwrap();
        assert_eq!(
            children,
            vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))]
        );
    }

    #[test]
    fn subtree_delete_does_not_treat_underscore_as_wildcard() {
        let mut db = Database::open_in_memory().unwrap();
        db.put_node(&path("conversations/u1_u2/messages/m"), &json!(1), 1).unwrap();
        db.put_node(&path("conversations/u1xu2/messages/m"), &json!(2), 1).unwrap();

        assert_eq!(db.delete_node(&path("conversations/u1_u2")).unwrap(), 1);
        assert_eq!(db.node_count().unwrap(), 1);
    }

    #[test]
    fn insert_never_replaces() {
        let db = Database::open_in_memory().unwrap();
        let msg = path("conversations/u1_u2/messages/m1");

        assert!(db.insert_node(&msg, &json!({"body": "first"}), 1).unwrap());
        assert!(!db.insert_node(&msg, &json!({"body": "second"}), 2).unwrap());
        assert_eq!(db.get_node(&msg).unwrap(), Some(json!({"body": "first"})));
        assert_eq!(db.child_nodes(&path("conversations/u1_u2/messages")).unwrap().len(), 1);
    }

    #[test]
    fn latest_update_tracks_newest_row() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.latest_update().unwrap(), None);
        db.put_node(&path("a"), &json!(1), 30).unwrap();
        db.put_node(&path("b"), &json!(2), 10).unwrap();
        assert_eq!(db.latest_update().unwrap(), Some(30));
    }
}
