//! Range-aware file streaming: range parsing, content-type guessing, item
//! to file resolution and chunked body construction.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use cv_core::{Error, Result};
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::context::AppContext;

/// Size of each body chunk read from disk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// An inclusive byte span of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a `Range: bytes=START-END` header value into its raw bounds.
///
/// Either bound may be omitted. Other units, multiple ranges and
/// non-numeric bounds yield `None`.
pub fn parse_range_header(value: &str) -> Option<(Option<u64>, Option<u64>)> {
    let (unit, ranges) = value.split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
        return None;
    }
    let (start, end) = ranges.split_once('-')?;
    Some((parse_bound(start)?, parse_bound(end)?))
}

fn parse_bound(s: &str) -> Option<Option<u64>> {
    let s = s.trim();
    if s.is_empty() {
        return Some(None);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().map(Some)
}

/// Resolve a range header against a file size.
///
/// A missing start means 0 and a missing end means the last byte; the end
/// is clamped to the file. `None` means serve the whole file.
pub fn resolve_range(header: Option<&str>, file_size: u64) -> Option<ByteRange> {
    let (start, end) = parse_range_header(header?)?;
    let last = file_size.checked_sub(1)?;
    let start = start.unwrap_or(0);
    let end = end.map_or(last, |e| e.min(last));
    (start <= end).then_some(ByteRange { start, end })
}

/// Guess the MIME type from the file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "flv" => "video/x-flv",
        _ => "application/octet-stream",
    }
}

/// Resolve an item id to its media file on disk.
///
/// Runs on the blocking pool. Fails with `NotFound` when the item is
/// unknown or its folder no longer holds a media file.
pub async fn locate_media(ctx: &AppContext, id: String) -> Result<PathBuf> {
    let db = ctx.db.clone();
    let scanner = ctx.scanner.clone();
    tokio::task::spawn_blocking(move || {
        let conn = cv_db::pool::get_conn(&db)?;
        let item = cv_db::queries::items::get_item(&conn, &id)?
            .ok_or_else(|| Error::not_found("video", &id))?;
        scanner
            .media_file_for(&item.folder_name)
            .ok_or_else(|| Error::not_found("video file", &item.folder_name))
    })
    .await
    .map_err(|e| Error::Internal(format!("file lookup failed: {e}")))?
}

/// Sequential chunks of `range`, ending early on a short file.
pub fn chunk_stream(
    mut file: tokio::fs::File,
    range: ByteRange,
) -> impl Stream<Item = std::io::Result<Bytes>> {
    async_stream::try_stream! {
        file.seek(std::io::SeekFrom::Start(range.start)).await?;
        let mut remaining = range.len();
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let mut chunk = vec![0u8; want];
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            chunk.truncate(n);
            remaining -= n as u64;
            yield Bytes::from(chunk);
        }
    }
}

/// Serve `path`, honoring an optional `Range` header value.
///
/// A satisfiable range gets 206 with `Content-Range`; anything else gets
/// the whole file with 200.
pub async fn serve_file(path: &Path, range_header: Option<&str>) -> Result<Response> {
    let not_found = |_| Error::not_found("video file", path.display());

    let metadata = tokio::fs::metadata(path).await.map_err(not_found)?;
    if !metadata.is_file() {
        return Err(Error::not_found("video file", path.display()));
    }
    let file_size = metadata.len();
    let content_type = guess_content_type(path);
    let file = tokio::fs::File::open(path).await.map_err(not_found)?;

    match resolve_range(range_header, file_size) {
        Some(range) => {
            tracing::trace!(file = %path.display(), start = range.start, end = range.end, "Serving range");
            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{file_size}", range.start, range.end),
                    ),
                    (header::CONTENT_LENGTH, range.len().to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                Body::from_stream(chunk_stream(file, range)),
            )
                .into_response())
        }
        None => {
            let body = match file_size.checked_sub(1) {
                Some(end) => Body::from_stream(chunk_stream(file, ByteRange { start: 0, end })),
                None => Body::empty(),
            };
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_LENGTH, file_size.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response())
        }
    }
}
