//! Media directory reconciliation.
//!
//! A pass walks the immediate subdirectories of the configured video
//! directory, parses each folder's sidecar document and brings the catalog
//! in line with what is on disk:
//!
//! - unknown identifiers are inserted and their source tags imported,
//! - known identifiers in their own folder have every scanned field
//!   refreshed (user tags are left alone); a different folder claiming a
//!   known identifier is skipped,
//! - available items whose folder was not seen are marked unavailable.
//!
//! The whole pass commits as one transaction. Each folder's writes run in a
//! savepoint so one bad folder is skipped without losing the rest.
//!
//! At most one pass runs at a time. Callers that arrive while a pass is in
//! flight wait for it and receive its outcome instead of starting another.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cv_core::config::LibraryConfig;
use cv_core::{Error, Result};
use cv_db::pool::DbPool;
use cv_db::queries::{items, labels};
use cv_parser::ParsedMetadata;
use serde::Serialize;
use walkdir::WalkDir;

/// Aggregate counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ScanSummary {
    pub added: u64,
    pub updated: u64,
    pub marked_unavailable: u64,
    /// Items in the catalog after the pass, available or not.
    pub total: i64,
    pub duration_seconds: f64,
}

/// Where to look and what to look for.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub video_dir: PathBuf,
    pub media_extension: String,
    pub metadata_extension: String,
}

impl ScanSettings {
    pub fn from_config(library: &LibraryConfig) -> Self {
        Self {
            video_dir: library.video_dir.clone(),
            media_extension: library.media_extension.trim_start_matches('.').to_string(),
            metadata_extension: library.metadata_extension.trim_start_matches('.').to_string(),
        }
    }
}

/// A subdirectory holding both a media file and a sidecar document.
#[derive(Debug, Clone)]
struct Candidate {
    folder_name: String,
    metadata_path: PathBuf,
}

enum ItemOutcome {
    Added,
    Updated,
}

/// Owner of the single-run permit.
pub struct Scanner {
    db: DbPool,
    settings: ScanSettings,
    permit: tokio::sync::Mutex<()>,
    /// Number of completed passes.
    generation: AtomicU64,
    last_outcome: parking_lot::Mutex<Option<std::result::Result<ScanSummary, String>>>,
}

impl Scanner {
    pub fn new(db: DbPool, settings: ScanSettings) -> Self {
        Self {
            db,
            settings,
            permit: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            last_outcome: parking_lot::Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run a reconciliation pass, or join the one already in flight.
    ///
    /// The pass runs on its own task, so it completes even if the caller's
    /// future is dropped.
    pub async fn scan(self: &Arc<Self>) -> Result<ScanSummary> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_exclusive().await })
            .await
            .map_err(|e| Error::Internal(format!("scan task failed: {e}")))?
    }

    async fn run_exclusive(&self) -> Result<ScanSummary> {
        let observed = self.generation.load(Ordering::SeqCst);
        let _permit = self.permit.lock().await;

        if self.generation.load(Ordering::SeqCst) != observed {
            if let Some(outcome) = self.last_outcome.lock().clone() {
                tracing::debug!("Joined result of concurrent scan");
                return outcome.map_err(Error::Scan);
            }
        }

        let db = self.db.clone();
        let settings = self.settings.clone();
        let outcome = match tokio::task::spawn_blocking(move || run_pass(&db, &settings)).await {
            Ok(result) => result,
            Err(e) => Err(Error::Internal(format!("scan worker panicked: {e}"))),
        };

        let stored = match &outcome {
            Ok(summary) => Ok(summary.clone()),
            Err(e) => {
                tracing::error!(error = %e, "Scan failed and was rolled back");
                Err(e.to_string())
            }
        };
        *self.last_outcome.lock() = Some(stored);
        self.generation.fetch_add(1, Ordering::SeqCst);

        outcome.map_err(|e| match e {
            Error::Scan(_) => e,
            other => Error::Scan(other.to_string()),
        })
    }

    /// The media file of a cataloged folder, if it is still on disk.
    pub fn media_file_for(&self, folder_name: &str) -> Option<PathBuf> {
        let dir = self.settings.video_dir.join(folder_name);
        first_file_with_extension(&dir, &self.settings.media_extension)
    }
}

/// One blocking reconciliation pass.
pub fn run_pass(db: &DbPool, settings: &ScanSettings) -> Result<ScanSummary> {
    let started = Instant::now();

    if !settings.video_dir.is_dir() {
        tracing::warn!(
            video_dir = %settings.video_dir.display(),
            "Video directory does not exist, nothing to scan"
        );
        return Ok(ScanSummary::default());
    }

    tracing::info!(video_dir = %settings.video_dir.display(), "Starting scan");

    let candidates = discover_candidates(settings);

    let conn = cv_db::pool::get_conn(db)?;
    let mut tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut summary = ScanSummary::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut skipped: u64 = 0;

    for candidate in &candidates {
        // Seen even if the sidecar turns out to be bad, so a transient
        // parse failure never retires the item.
        seen.insert(candidate.folder_name.clone());

        let meta = match read_metadata(&candidate.metadata_path) {
            Ok(meta) => meta,
            Err(e) if e.is_metadata_error() => {
                tracing::warn!(folder = %candidate.folder_name, error = %e, "Skipping folder with invalid metadata");
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(folder = %candidate.folder_name, error = %e, "Skipping folder with unreadable metadata");
                skipped += 1;
                continue;
            }
        };

        match apply_item(&mut tx, &candidate.folder_name, &meta) {
            Ok(ItemOutcome::Added) => {
                tracing::debug!(folder = %candidate.folder_name, id = %meta.id, "Added item");
                summary.added += 1;
            }
            Ok(ItemOutcome::Updated) => summary.updated += 1,
            Err(e @ Error::Conflict(_)) => {
                tracing::warn!(folder = %candidate.folder_name, id = %meta.id, error = %e, "Skipping folder whose id is cataloged elsewhere");
                skipped += 1;
            }
            Err(e) => {
                tracing::warn!(folder = %candidate.folder_name, id = %meta.id, error = %e, "Skipping folder that could not be stored");
                skipped += 1;
            }
        }
    }

    for (id, folder_name) in items::list_available_folders(&tx)? {
        if !seen.contains(&folder_name) && items::mark_unavailable(&tx, &id)? {
            tracing::debug!(folder = %folder_name, id = %id, "Marked item unavailable");
            summary.marked_unavailable += 1;
        }
    }

    summary.total = items::count_items(&tx)?;

    tx.commit()
        .map_err(|e| Error::Scan(format!("commit failed: {e}")))?;

    summary.duration_seconds = (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;

    tracing::info!(
        added = summary.added,
        updated = summary.updated,
        marked_unavailable = summary.marked_unavailable,
        skipped,
        total = summary.total,
        duration_seconds = summary.duration_seconds,
        "Scan complete"
    );

    Ok(summary)
}

/// Insert or refresh one item inside its own savepoint.
fn apply_item(
    tx: &mut rusqlite::Transaction<'_>,
    folder_name: &str,
    meta: &ParsedMetadata,
) -> Result<ItemOutcome> {
    let sp = tx.savepoint().map_err(|e| Error::database(e.to_string()))?;

    let outcome = match items::get_item(&sp, &meta.id)? {
        // The folder name is fixed at insert; a second folder claiming the
        // id must not revive the item.
        Some(existing) if existing.folder_name != folder_name => {
            return Err(Error::Conflict(format!(
                "id {} belongs to folder '{}'",
                meta.id, existing.folder_name
            )));
        }
        Some(_) => {
            items::update_item_from_scan(&sp, &meta.id, meta)?;
            ItemOutcome::Updated
        }
        None => {
            items::insert_item(&sp, folder_name, meta)?;
            for name in &meta.tags {
                let label = labels::get_or_create_label(&sp, name)?;
                labels::attach_label(&sp, &meta.id, label.id)?;
            }
            ItemOutcome::Added
        }
    };

    sp.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(outcome)
}

fn read_metadata(path: &Path) -> Result<ParsedMetadata> {
    let bytes = std::fs::read(path)?;
    cv_parser::parse(&bytes)
}

/// Subdirectories that hold both a media file and a sidecar, sorted by name.
fn discover_candidates(settings: &ScanSettings) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for entry in immediate_children(&settings.video_dir) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(folder_name) = entry.file_name().to_str().map(String::from) else {
            tracing::warn!(path = %entry.path().display(), "Skipping folder with non UTF-8 name");
            continue;
        };

        let dir = entry.path();
        let Some(_media) = first_file_with_extension(dir, &settings.media_extension) else {
            tracing::debug!(folder = %folder_name, ext = %settings.media_extension, "Skipping folder without media file");
            continue;
        };
        let Some(metadata_path) = first_file_with_extension(dir, &settings.metadata_extension) else {
            tracing::debug!(folder = %folder_name, ext = %settings.metadata_extension, "Skipping folder without metadata");
            continue;
        };

        candidates.push(Candidate {
            folder_name,
            metadata_path,
        });
    }

    candidates
}

/// The lexicographically first regular file in `dir` whose extension
/// matches `extension` ignoring case. Hidden files are ignored.
pub fn first_file_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    immediate_children(dir)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .map(|entry| entry.into_path())
}

/// Non-hidden direct children of `dir` in file-name order, symlinks followed.
fn immediate_children(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "Error walking directory");
                None
            }
        })
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_db::pool::{get_conn, init_memory_pool};
    use std::fs;

    fn settings(root: &Path) -> ScanSettings {
        ScanSettings {
            video_dir: root.to_path_buf(),
            media_extension: "mp4".into(),
            metadata_extension: "json".into(),
        }
    }

    fn write_folder(root: &Path, folder: &str, sidecar: &str) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("video.mp4"), b"fake").unwrap();
        fs::write(dir.join("video.info.json"), sidecar).unwrap();
    }

    #[test]
    fn first_match_is_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.MP4"), b"").unwrap();
        fs::write(dir.path().join("a.mp4"), b"").unwrap();
        fs::write(dir.path().join(".hidden.mp4"), b"").unwrap();
        fs::write(dir.path().join("c.json"), b"").unwrap();

        let found = first_file_with_extension(dir.path(), "mp4").unwrap();
        assert_eq!(found.file_name().unwrap(), "a.mp4");
        assert!(first_file_with_extension(dir.path(), "webm").is_none());
        assert!(first_file_with_extension(&dir.path().join("missing"), "mp4").is_none());
    }

    #[test]
    fn missing_root_is_zero_effect() {
        let pool = init_memory_pool().unwrap();
        let summary = run_pass(&pool, &settings(Path::new("/definitely/not/here"))).unwrap();
        assert_eq!(summary, ScanSummary::default());
    }

    #[test]
    fn pass_inserts_updates_and_retires() {
        let root = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        write_folder(root.path(), "one", r#"{"id": "v1", "title": "One", "tags": ["a", "b"]}"#);
        write_folder(root.path(), "two", r#"{"id": "v2"}"#);

        let first = run_pass(&pool, &settings(root.path())).unwrap();
        assert_eq!((first.added, first.updated, first.marked_unavailable, first.total), (2, 0, 0, 2));

        fs::remove_dir_all(root.path().join("two")).unwrap();
        let second = run_pass(&pool, &settings(root.path())).unwrap();
        assert_eq!((second.added, second.updated, second.marked_unavailable, second.total), (0, 1, 1, 2));

        let conn = get_conn(&pool).unwrap();
        assert!(!items::get_item(&conn, "v2").unwrap().unwrap().is_available);
        assert_eq!(labels::labels_for_item(&conn, "v1").unwrap().len(), 2);
    }

    #[test]
    fn bad_sidecar_is_skipped_but_seen() {
        let root = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        write_folder(root.path(), "one", r#"{"id": "v1"}"#);
        run_pass(&pool, &settings(root.path())).unwrap();

        fs::write(root.path().join("one").join("video.info.json"), b"{not json").unwrap();
        write_folder(root.path(), "two", r#"{"title": "no id"}"#);
        let summary = run_pass(&pool, &settings(root.path())).unwrap();
        assert_eq!((summary.added, summary.updated, summary.marked_unavailable), (0, 0, 0));

        let conn = get_conn(&pool).unwrap();
        assert!(items::get_item(&conn, "v1").unwrap().unwrap().is_available);
        assert_eq!(items::count_items(&conn).unwrap(), 1);
    }

    #[test]
    fn folder_conflict_skips_only_that_folder() {
        let root = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        write_folder(root.path(), "one", r#"{"id": "v1"}"#);
        run_pass(&pool, &settings(root.path())).unwrap();

        // Same folder now claims a different identifier.
        write_folder(root.path(), "one", r#"{"id": "v9", "tags": ["x"]}"#);
        write_folder(root.path(), "two", r#"{"id": "v2"}"#);
        let summary = run_pass(&pool, &settings(root.path())).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.marked_unavailable, 0);

        let conn = get_conn(&pool).unwrap();
        assert!(items::get_item(&conn, "v9").unwrap().is_none());
        assert_eq!(labels::count_labels(&conn).unwrap(), 0);
        assert!(items::get_item(&conn, "v2").unwrap().is_some());
    }

    #[test]
    fn renamed_folder_stays_retired_across_passes() {
        let root = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        write_folder(root.path(), "old", r#"{"id": "x1", "title": "Before"}"#);
        run_pass(&pool, &settings(root.path())).unwrap();

        fs::rename(root.path().join("old"), root.path().join("new")).unwrap();
        let first = run_pass(&pool, &settings(root.path())).unwrap();
        assert_eq!((first.added, first.updated, first.marked_unavailable), (0, 0, 1));

        for _ in 0..2 {
            let again = run_pass(&pool, &settings(root.path())).unwrap();
            assert_eq!((again.added, again.updated, again.marked_unavailable), (0, 0, 0));
            assert_eq!(again.total, 1);
        }

        let conn = get_conn(&pool).unwrap();
        let item = items::get_item(&conn, "x1").unwrap().unwrap();
        assert!(!item.is_available);
        assert_eq!(item.folder_name, "old");
    }

    #[test]
    fn failed_pass_leaves_catalog_untouched() {
        let root = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        write_folder(root.path(), "one", r#"{"id": "v1", "title": "One"}"#);
        write_folder(root.path(), "two", r#"{"id": "v2"}"#);
        run_pass(&pool, &settings(root.path())).unwrap();

        // Retiring anything now fails, after the item writes have happened.
        get_conn(&pool)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_retire BEFORE UPDATE OF is_available ON items
                 WHEN NEW.is_available = 0
                 BEGIN SELECT RAISE(ABORT, 'retire blocked'); END;",
            )
            .unwrap();

        write_folder(root.path(), "one", r#"{"id": "v1", "title": "Renamed"}"#);
        write_folder(root.path(), "three", r#"{"id": "v3", "tags": ["new"]}"#);
        fs::remove_dir_all(root.path().join("two")).unwrap();

        assert!(run_pass(&pool, &settings(root.path())).is_err());

        let conn = get_conn(&pool).unwrap();
        assert_eq!(
            items::get_item(&conn, "v1").unwrap().unwrap().title.as_deref(),
            Some("One")
        );
        assert!(items::get_item(&conn, "v2").unwrap().unwrap().is_available);
        assert!(items::get_item(&conn, "v3").unwrap().is_none());
        assert_eq!(labels::count_labels(&conn).unwrap(), 0);
        assert_eq!(items::count_items(&conn).unwrap(), 2);
    }

    #[test]
    fn incomplete_folders_are_not_candidates() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("video-only")).unwrap();
        fs::write(root.path().join("video-only").join("a.mp4"), b"").unwrap();
        fs::create_dir_all(root.path().join("json-only")).unwrap();
        fs::write(root.path().join("json-only").join("a.json"), b"{}").unwrap();
        fs::write(root.path().join("stray.mp4"), b"").unwrap();
        write_folder(root.path(), ".hidden", r#"{"id": "h"}"#);

        let found = discover_candidates(&settings(root.path()));
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn concurrent_scans_collapse() {
        let root = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().unwrap();
        for i in 0..20 {
            write_folder(root.path(), &format!("f{i:02}"), &format!(r#"{{"id": "v{i}"}}"#));
        }
        let scanner = Arc::new(Scanner::new(pool.clone(), settings(root.path())));

        let (a, b, c) = tokio::join!(scanner.scan(), scanner.scan(), scanner.scan());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.added, 20);
        assert_eq!(a, b);
        assert_eq!(b, c);

        let conn = get_conn(&pool).unwrap();
        assert_eq!(items::count_items(&conn).unwrap(), 20);
    }
}
