//! Label get-or-create, item links and autocomplete search.

use cv_core::{Error, Result};
use rusqlite::Connection;

use crate::models::{Label, LabelUsage};

/// Fetch the label named `name` (case-insensitively), creating it if needed.
///
/// The name is trimmed; a blank name is a validation error. When the label
/// already exists its stored spelling is kept.
pub fn get_or_create_label(conn: &Connection, name: &str) -> Result<Label> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("tag name cannot be empty".into()));
    }

    conn.execute(
        "INSERT INTO labels (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        [name],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    find_label(conn, name)?
        .ok_or_else(|| Error::Internal(format!("label '{name}' vanished after upsert")))
}

/// Case-insensitive lookup by name.
pub fn find_label(conn: &Connection, name: &str) -> Result<Option<Label>> {
    let result = conn.query_row(
        "SELECT id, name FROM labels WHERE name = ?1",
        [name.trim()],
        Label::from_row,
    );
    match result {
        Ok(l) => Ok(Some(l)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Link a label to an item. Returns false if the link already existed.
pub fn attach_label(conn: &Connection, item_id: &str, label_id: i64) -> Result<bool> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO item_labels (item_id, label_id) VALUES (?1, ?2)",
            rusqlite::params![item_id, label_id],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Remove a link. Returns false if there was nothing to remove.
pub fn detach_label(conn: &Connection, item_id: &str, label_id: i64) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM item_labels WHERE item_id = ?1 AND label_id = ?2",
            rusqlite::params![item_id, label_id],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Labels linked to an item, ordered by name.
pub fn labels_for_item(conn: &Connection, item_id: &str) -> Result<Vec<Label>> {
    let mut stmt = conn
        .prepare(
            "SELECT l.id, l.name FROM labels l
             JOIN item_labels il ON il.label_id = l.id
             WHERE il.item_id = ?1
             ORDER BY l.name",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([item_id], Label::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Autocomplete: labels whose name starts with `prefix`, most used first.
///
/// Matching ignores case; `%` and `_` in the prefix match literally.
pub fn search_labels(conn: &Connection, prefix: Option<&str>, limit: i64) -> Result<Vec<LabelUsage>> {
    let pattern = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("{}%", escape_like(p)),
        None => "%".to_string(),
    };

    let mut stmt = conn
        .prepare(
            "SELECT l.id, l.name, COUNT(il.item_id) AS usage
             FROM labels l
             LEFT JOIN item_labels il ON il.label_id = l.id
             WHERE l.name LIKE ?1 ESCAPE '\\'
             GROUP BY l.id
             ORDER BY usage DESC, l.name ASC
             LIMIT ?2",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![pattern, limit], LabelUsage::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

pub fn count_labels(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM labels", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
