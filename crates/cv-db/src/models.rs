//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row` whose columns follow the owning query module's
//! column list.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One cataloged media folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    pub folder_name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub uploader_url: Option<String>,
    pub webpage_url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub aspect_ratio: Option<f64>,
    pub like_count: Option<i64>,
    pub repost_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub extractor: Option<String>,
    pub post_timestamp: Option<i64>,
    pub epoch: Option<i64>,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Item {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            folder_name: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            uploader: row.get(4)?,
            uploader_url: row.get(5)?,
            webpage_url: row.get(6)?,
            thumbnail: row.get(7)?,
            duration: row.get(8)?,
            width: row.get(9)?,
            height: row.get(10)?,
            aspect_ratio: row.get(11)?,
            like_count: row.get(12)?,
            repost_count: row.get(13)?,
            comment_count: row.get(14)?,
            extractor: row.get(15)?,
            post_timestamp: row.get(16)?,
            epoch: row.get(17)?,
            is_available: row.get::<_, i32>(18)? != 0,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
}

impl Label {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

/// A label together with the number of items linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelUsage {
    pub id: i64,
    pub name: String,
    pub item_count: i64,
}

impl LabelUsage {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            item_count: row.get(2)?,
        })
    }
}
