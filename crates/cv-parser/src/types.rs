//! Output type for the sidecar parser.

use serde::{Deserialize, Serialize};

/// Structured attributes extracted from a sidecar metadata document.
///
/// Only `id` is guaranteed. Every other field is `None` (or empty, for
/// `tags`) when the document does not carry it or carries a value of the
/// wrong type; absent values are never replaced by `0` or `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    /// Stable identifier from `id`, falling back to `display_id`.
    pub id: String,

    /// From `fulltitle`, falling back to `title`.
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub uploader_url: Option<String>,
    pub webpage_url: Option<String>,
    pub thumbnail: Option<String>,

    /// Length in seconds.
    pub duration: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub aspect_ratio: Option<f64>,

    pub like_count: Option<i64>,
    pub repost_count: Option<i64>,
    pub comment_count: Option<i64>,

    /// Name of the site extractor that produced the download.
    pub extractor: Option<String>,

    /// Original publish time (`timestamp`), seconds since the Unix epoch.
    pub post_timestamp: Option<i64>,
    /// Normalized ordering key (`epoch`).
    pub epoch: Option<i64>,

    /// Source-platform tags, trimmed, blanks removed, in document order.
    pub tags: Vec<String>,
}

impl ParsedMetadata {
    /// Create a record with only the identifier populated.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}
