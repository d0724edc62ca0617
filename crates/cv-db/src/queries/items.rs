//! Item insert, scan refresh, lookup and listing operations.

use chrono::Utc;
use cv_core::{Error, Result};
use cv_parser::ParsedMetadata;
use rusqlite::Connection;

use crate::models::Item;
use crate::queries::labels;

/// Column list used in SELECT statements.
const COLS: &str = "id, folder_name, title, description, uploader, uploader_url,
    webpage_url, thumbnail, duration, width, height, aspect_ratio,
    like_count, repost_count, comment_count, extractor, post_timestamp,
    epoch, is_available, created_at, updated_at";

/// Listing order by the normalized `epoch` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest first; items without an epoch come last.
    #[default]
    EpochDesc,
    /// Oldest first; items without an epoch come first.
    EpochAsc,
}

impl SortOrder {
    fn order_by(self) -> &'static str {
        match self {
            SortOrder::EpochDesc => "epoch IS NULL, epoch DESC, id ASC",
            SortOrder::EpochAsc => "epoch ASC, id ASC",
        }
    }
}

/// Filter and pagination parameters for [`list_items`].
#[derive(Debug, Clone)]
pub struct ItemQuery {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub sort: SortOrder,
    /// Label names an item must carry, all of them, compared case-insensitively.
    pub labels: Vec<String>,
    pub available_only: bool,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 24,
            sort: SortOrder::EpochDesc,
            labels: Vec::new(),
            available_only: true,
        }
    }
}

/// One page of items plus the total number of matches.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: i64,
}

/// Insert a newly sighted item.
pub fn insert_item(conn: &Connection, folder_name: &str, meta: &ParsedMetadata) -> Result<Item> {
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO items (id, folder_name, title, description, uploader, uploader_url,
            webpage_url, thumbnail, duration, width, height, aspect_ratio,
            like_count, repost_count, comment_count, extractor, post_timestamp,
            epoch, is_available, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,1,?19,?20)",
        rusqlite::params![
            meta.id,
            folder_name,
            meta.title,
            meta.description,
            meta.uploader,
            meta.uploader_url,
            meta.webpage_url,
            meta.thumbnail,
            meta.duration,
            meta.width,
            meta.height,
            meta.aspect_ratio,
            meta.like_count,
            meta.repost_count,
            meta.comment_count,
            meta.extractor,
            meta.post_timestamp,
            meta.epoch,
            &now,
            &now,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Item {
        id: meta.id.clone(),
        folder_name: folder_name.to_string(),
        title: meta.title.clone(),
        description: meta.description.clone(),
        uploader: meta.uploader.clone(),
        uploader_url: meta.uploader_url.clone(),
        webpage_url: meta.webpage_url.clone(),
        thumbnail: meta.thumbnail.clone(),
        duration: meta.duration,
        width: meta.width,
        height: meta.height,
        aspect_ratio: meta.aspect_ratio,
        like_count: meta.like_count,
        repost_count: meta.repost_count,
        comment_count: meta.comment_count,
        extractor: meta.extractor.clone(),
        post_timestamp: meta.post_timestamp,
        epoch: meta.epoch,
        is_available: true,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Overwrite every scanned field of an existing item and mark it available.
///
/// `id` and `folder_name` are never changed. Label links are not touched.
pub fn update_item_from_scan(conn: &Connection, id: &str, meta: &ParsedMetadata) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE items SET title=?2, description=?3, uploader=?4, uploader_url=?5,
                webpage_url=?6, thumbnail=?7, duration=?8, width=?9, height=?10,
                aspect_ratio=?11, like_count=?12, repost_count=?13, comment_count=?14,
                extractor=?15, post_timestamp=?16, epoch=?17, is_available=1, updated_at=?18
             WHERE id=?1",
            rusqlite::params![
                id,
                meta.title,
                meta.description,
                meta.uploader,
                meta.uploader_url,
                meta.webpage_url,
                meta.thumbnail,
                meta.duration,
                meta.width,
                meta.height,
                meta.aspect_ratio,
                meta.like_count,
                meta.repost_count,
                meta.comment_count,
                meta.extractor,
                meta.post_timestamp,
                meta.epoch,
                now,
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Get an item by ID.
pub fn get_item(conn: &Connection, id: &str) -> Result<Option<Item>> {
    let q = format!("SELECT {COLS} FROM items WHERE id = ?1");
    let result = conn.query_row(&q, [id], Item::from_row);
    match result {
        Ok(i) => Ok(Some(i)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get an item by the name of the directory it lives in.
pub fn get_item_by_folder(conn: &Connection, folder_name: &str) -> Result<Option<Item>> {
    let q = format!("SELECT {COLS} FROM items WHERE folder_name = ?1");
    let result = conn.query_row(&q, [folder_name], Item::from_row);
    match result {
        Ok(i) => Ok(Some(i)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Filtered, sorted, paginated listing.
///
/// An unknown label name in `query.labels` yields an empty page.
pub fn list_items(conn: &Connection, query: &ItemQuery) -> Result<ItemPage> {
    let mut label_ids: Vec<i64> = Vec::new();
    for name in &query.labels {
        match labels::find_label(conn, name)? {
            Some(label) => {
                if !label_ids.contains(&label.id) {
                    label_ids.push(label.id);
                }
            }
            None => return Ok(ItemPage::default()),
        }
    }

    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if query.available_only {
        conditions.push("is_available = 1".to_string());
    }

    if !label_ids.is_empty() {
        let placeholders: Vec<String> = label_ids
            .iter()
            .map(|id| {
                params.push(Box::new(*id));
                format!("?{}", params.len())
            })
            .collect();
        params.push(Box::new(label_ids.len() as i64));
        conditions.push(format!(
            "id IN (SELECT item_id FROM item_labels WHERE label_id IN ({})
                    GROUP BY item_id HAVING COUNT(DISTINCT label_id) = ?{})",
            placeholders.join(", "),
            params.len()
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM items {where_clause}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let page = i64::from(query.page.max(1));
    let page_size = i64::from(query.page_size.max(1));
    let offset = (page - 1) * page_size;

    let q = format!(
        "SELECT {COLS} FROM items {where_clause} ORDER BY {} LIMIT {page_size} OFFSET {offset}",
        query.sort.order_by()
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let items = stmt
        .query_map(params_refs.as_slice(), Item::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(ItemPage { items, total })
}

/// `(id, folder_name)` of every item currently flagged available.
pub fn list_available_folders(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT id, folder_name FROM items WHERE is_available = 1 ORDER BY folder_name")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Clear the availability flag. Returns false if the item was unknown or
/// already unavailable.
pub fn mark_unavailable(conn: &Connection, id: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE items SET is_available = 0, updated_at = ?2
             WHERE id = ?1 AND is_available = 1",
            rusqlite::params![id, now],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

pub fn count_items(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

pub fn count_available_items(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM items WHERE is_available = 1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, PooledConnection};

    fn setup() -> PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn meta(id: &str, epoch: Option<i64>) -> ParsedMetadata {
        ParsedMetadata {
            title: Some(format!("Video {id}")),
            epoch,
            ..ParsedMetadata::new(id)
        }
    }

    fn tag(conn: &Connection, item_id: &str, name: &str) {
        let label = labels::get_or_create_label(conn, name).unwrap();
        labels::attach_label(conn, item_id, label.id).unwrap();
    }

    #[test]
    fn insert_and_get() {
        let conn = setup();
        let mut m = meta("v1", Some(100));
        m.duration = Some(12.5);
        m.width = Some(1080);
        let item = insert_item(&conn, "folder-one", &m).unwrap();
        assert!(item.is_available);

        let found = get_item(&conn, "v1").unwrap().unwrap();
        assert_eq!(found, item);
        assert_eq!(found.folder_name, "folder-one");
        assert_eq!(found.duration, Some(12.5));
        assert!(found.like_count.is_none());

        let by_folder = get_item_by_folder(&conn, "folder-one").unwrap().unwrap();
        assert_eq!(by_folder.id, "v1");
        assert!(get_item(&conn, "missing").unwrap().is_none());
        assert!(get_item_by_folder(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_folder_rejected() {
        let conn = setup();
        insert_item(&conn, "shared", &meta("a", None)).unwrap();
        let err = insert_item(&conn, "shared", &meta("b", None)).unwrap_err();
        assert!(matches!(err, Error::Database { .. }));
    }

    #[test]
    fn update_overwrites_fields_and_restores_availability() {
        let conn = setup();
        let mut m = meta("v1", Some(1));
        m.uploader = Some("old".into());
        insert_item(&conn, "folder", &m).unwrap();
        tag(&conn, "v1", "kept");
        assert!(mark_unavailable(&conn, "v1").unwrap());

        let mut m2 = meta("v1", Some(2));
        m2.uploader = None;
        m2.like_count = Some(9);
        assert!(update_item_from_scan(&conn, "v1", &m2).unwrap());

        let found = get_item(&conn, "v1").unwrap().unwrap();
        assert!(found.is_available);
        assert_eq!(found.folder_name, "folder");
        assert_eq!(found.epoch, Some(2));
        assert!(found.uploader.is_none());
        assert_eq!(found.like_count, Some(9));

        let names: Vec<String> = labels::labels_for_item(&conn, "v1")
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["kept"]);

        assert!(!update_item_from_scan(&conn, "ghost", &m2).unwrap());
    }

    #[test]
    fn mark_unavailable_only_once() {
        let conn = setup();
        insert_item(&conn, "f", &meta("v1", None)).unwrap();
        assert!(mark_unavailable(&conn, "v1").unwrap());
        assert!(!mark_unavailable(&conn, "v1").unwrap());
        assert_eq!(count_items(&conn).unwrap(), 1);
        assert_eq!(count_available_items(&conn).unwrap(), 0);
        assert!(list_available_folders(&conn).unwrap().is_empty());
    }

    #[test]
    fn list_sorted_by_epoch() {
        let conn = setup();
        insert_item(&conn, "a", &meta("a", Some(10))).unwrap();
        insert_item(&conn, "b", &meta("b", None)).unwrap();
        insert_item(&conn, "c", &meta("c", Some(30))).unwrap();
        insert_item(&conn, "d", &meta("d", Some(20))).unwrap();

        let desc = list_items(&conn, &ItemQuery::default()).unwrap();
        let ids: Vec<&str> = desc.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "a", "b"]);
        assert_eq!(desc.total, 4);

        let asc = list_items(
            &conn,
            &ItemQuery {
                sort: SortOrder::EpochAsc,
                ..ItemQuery::default()
            },
        )
        .unwrap();
        let ids: Vec<&str> = asc.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "d", "c"]);
    }

    #[test]
    fn list_paginated() {
        let conn = setup();
        for i in 0..5 {
            insert_item(&conn, &format!("f{i}"), &meta(&format!("v{i}"), Some(i))).unwrap();
        }
        let q = ItemQuery {
            page: 2,
            page_size: 2,
            ..ItemQuery::default()
        };
        let page = list_items(&conn, &q).unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);

        let last = list_items(&conn, &ItemQuery { page: 3, ..q.clone() }).unwrap();
        assert_eq!(last.items.len(), 1);
        let beyond = list_items(&conn, &ItemQuery { page: 9, ..q }).unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn list_filters_availability() {
        let conn = setup();
        insert_item(&conn, "a", &meta("a", None)).unwrap();
        insert_item(&conn, "b", &meta("b", None)).unwrap();
        mark_unavailable(&conn, "b").unwrap();

        let available = list_items(&conn, &ItemQuery::default()).unwrap();
        assert_eq!(available.total, 1);

        let all = list_items(
            &conn,
            &ItemQuery {
                available_only: false,
                ..ItemQuery::default()
            },
        )
        .unwrap();
        assert_eq!(all.total, 2);
    }

    #[test]
    fn list_label_filter_is_conjunctive() {
        let conn = setup();
        insert_item(&conn, "a", &meta("a", Some(1))).unwrap();
        insert_item(&conn, "b", &meta("b", Some(2))).unwrap();
        tag(&conn, "a", "Cats");
        tag(&conn, "a", "funny");
        tag(&conn, "b", "cats");

        let cats = list_items(
            &conn,
            &ItemQuery {
                labels: vec!["CATS".into()],
                ..ItemQuery::default()
            },
        )
        .unwrap();
        assert_eq!(cats.total, 2);

        let both = list_items(
            &conn,
            &ItemQuery {
                labels: vec!["cats".into(), "Funny".into(), "cats".into()],
                ..ItemQuery::default()
            },
        )
        .unwrap();
        assert_eq!(both.total, 1);
        assert_eq!(both.items[0].id, "a");

        let unknown = list_items(
            &conn,
            &ItemQuery {
                labels: vec!["cats".into(), "nope".into()],
                ..ItemQuery::default()
            },
        )
        .unwrap();
        assert_eq!(unknown.total, 0);
        assert!(unknown.items.is_empty());
    }
}
