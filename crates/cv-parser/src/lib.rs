//! cv-parser: sidecar metadata parser.
//!
//! Turns the JSON document that a downloader writes next to each video
//! (`<name>.info.json`) into a [`ParsedMetadata`] record.
//!
//! # Quick start
//!
//! ```
//! let doc = br#"{"id": "abc123", "fulltitle": "Sunset", "duration": 12.5, "tags": ["sky"]}"#;
//! let meta = cv_parser::parse(doc).unwrap();
//! assert_eq!(meta.id, "abc123");
//! assert_eq!(meta.title.as_deref(), Some("Sunset"));
//! assert_eq!(meta.duration, Some(12.5));
//! assert_eq!(meta.tags, vec!["sky".to_string()]);
//! ```

pub mod types;
mod parser;

pub use types::ParsedMetadata;

/// Parse the raw bytes of a sidecar metadata document.
///
/// Fails with [`cv_core::Error::MalformedMetadata`] when the bytes are not a
/// JSON object, and with [`cv_core::Error::MissingIdentifier`] when neither
/// `id` nor `display_id` carries a usable value.
pub fn parse(bytes: &[u8]) -> cv_core::Result<ParsedMetadata> {
    parser::parse(bytes)
}
