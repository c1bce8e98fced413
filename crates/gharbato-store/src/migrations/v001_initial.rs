//! v001 -- Initial schema creation.
//!
//! One `nodes` table holds every record of the tree, keyed by full path.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Nodes
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS nodes (
    path       TEXT PRIMARY KEY NOT NULL,   -- e.g. conversations/u1_u2/messages/<pushId>
    parent     TEXT NOT NULL,               -- path minus its last segment ('' for top level)
    key        TEXT NOT NULL,               -- last segment
    value      TEXT NOT NULL,               -- JSON document
    updated_at INTEGER NOT NULL             -- server clock, ms since epoch
);

CREATE INDEX IF NOT EXISTS idx_nodes_parent_key ON nodes(parent, key);
"#;

/// Apply the v001 migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
