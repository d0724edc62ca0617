//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, library and API sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.api.page_size == 0 {
            warnings.push("api.page_size is 0; listings will use 1".into());
        }
        if self.api.page_size > self.api.max_page_size {
            warnings.push(format!(
                "api.page_size ({}) exceeds api.max_page_size ({})",
                self.api.page_size, self.api.max_page_size
            ));
        }

        let media = self.library.media_extension.trim_start_matches('.');
        let sidecar = self.library.metadata_extension.trim_start_matches('.');
        if media.is_empty() || sidecar.is_empty() {
            warnings.push("library media/metadata extensions must not be empty".into());
        } else if media.eq_ignore_ascii_case(sidecar) {
            warnings.push(format!(
                "library.media_extension and library.metadata_extension are both '{media}'"
            ));
        }

        if self.library.scan_interval_secs == Some(0) {
            warnings.push("library.scan_interval_secs is 0; periodic scanning disabled".into());
        }

        if !self.library.video_dir.exists() {
            warnings.push(format!(
                "library.video_dir {} does not exist yet; scans will find nothing",
                self.library.video_dir.display()
            ));
        }

        warnings
    }

    /// Page size clamped into `1..=max_page_size`.
    pub fn effective_page_size(&self) -> u32 {
        self.api.page_size.clamp(1, self.api.max_page_size.max(1))
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            static_dir: Some(PathBuf::from("static")),
            db_path: PathBuf::from("/data/clipvault.db"),
        }
    }
}

/// Media directory and scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directory holding one subdirectory per video.
    pub video_dir: PathBuf,
    /// Extension of the playable file inside each subdirectory.
    pub media_extension: String,
    /// Extension of the sidecar metadata document.
    pub metadata_extension: String,
    pub scan_on_startup: bool,
    /// Rescan period; `None` disables periodic scanning.
    pub scan_interval_secs: Option<u64>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("/videos"),
            media_extension: "mp4".into(),
            metadata_extension: "json".into(),
            scan_on_startup: true,
            scan_interval_secs: None,
        }
    }
}

/// Listing/pagination defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            page_size: 24,
            max_page_size: 200,
        }
    }
}

/// Turn a database location into a filesystem path.
///
/// Accepts either a bare path or a `sqlite:///` URL, where
/// `sqlite:////data/media.db` names the absolute path `/data/media.db` and
/// `sqlite:///media.db` a relative one.
pub fn db_path_from_location(location: &str) -> PathBuf {
    match location.strip_prefix("sqlite:///") {
        Some(rest) => PathBuf::from(rest),
        None => PathBuf::from(location),
    }
}
