//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use cv_core::{Error, Result};
use rusqlite::Connection;

/// V1: initial schema -- items, labels and the link table.
const V1_INITIAL: &str = r#"
CREATE TABLE items (
    id             TEXT PRIMARY KEY,
    folder_name    TEXT NOT NULL UNIQUE,
    title          TEXT,
    description    TEXT,
    uploader       TEXT,
    uploader_url   TEXT,
    webpage_url    TEXT,
    thumbnail      TEXT,
    duration       REAL,
    width          INTEGER,
    height         INTEGER,
    aspect_ratio   REAL,
    like_count     INTEGER,
    repost_count   INTEGER,
    comment_count  INTEGER,
    extractor      TEXT,
    post_timestamp INTEGER,
    epoch          INTEGER,
    is_available   INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Name uniqueness is case-insensitive; the stored spelling is the first writer's.
CREATE TABLE labels (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE item_labels (
    item_id  TEXT    NOT NULL REFERENCES items(id)  ON DELETE CASCADE,
    label_id INTEGER NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
    PRIMARY KEY (item_id, label_id)
);

CREATE INDEX idx_items_epoch       ON items(epoch DESC);
CREATE INDEX idx_items_available   ON items(is_available);
CREATE INDEX idx_item_labels_item  ON item_labels(item_id);
CREATE INDEX idx_item_labels_label ON item_labels(label_id);
"#;

/// Ordered list of all migrations.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each migration whose version has not yet been recorded.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}
