//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, a temporary video
//! directory and a full [`AppContext`]. The [`TestHarness::with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use cv_core::config::Config;
use cv_db::pool::{init_memory_pool, DbPool};
use cv_server::context::AppContext;
use cv_server::router::build_router;
use tempfile::TempDir;

/// Test harness wrapping an [`AppContext`] backed by an in-memory database
/// and a temporary video directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub video_dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default settings pointed at a fresh
    /// temporary video directory.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a harness from `config`; the video directory is always
    /// replaced by a fresh temporary one.
    pub fn with_config(mut config: Config) -> Self {
        let video_dir = tempfile::tempdir().expect("failed to create video dir");
        config.library.video_dir = video_dir.path().to_path_buf();
        config.server.static_dir = None;

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(db.clone(), config);

        Self { ctx, db, video_dir }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = build_router(harness.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> cv_db::pool::PooledConnection {
        cv_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }

    pub fn root(&self) -> &Path {
        self.video_dir.path()
    }

    /// Create `<root>/<folder>/` holding `video.mp4` with `media` as content
    /// and `video.info.json` with the given sidecar document.
    pub fn add_folder(&self, folder: &str, sidecar: &serde_json::Value, media: &[u8]) -> PathBuf {
        let dir = self.root().join(folder);
        std::fs::create_dir_all(&dir).expect("failed to create item folder");
        std::fs::write(dir.join("video.mp4"), media).expect("failed to write media");
        std::fs::write(
            dir.join("video.info.json"),
            serde_json::to_vec(sidecar).expect("failed to encode sidecar"),
        )
        .expect("failed to write sidecar");
        dir
    }

    /// A folder with a minimal sidecar: just the id, a title and an epoch.
    pub fn add_video(&self, folder: &str, id: &str, epoch: i64) -> PathBuf {
        self.add_folder(
            folder,
            &serde_json::json!({ "id": id, "title": format!("Video {id}"), "epoch": epoch }),
            b"0123456789",
        )
    }

    pub fn remove_folder(&self, folder: &str) {
        std::fs::remove_dir_all(self.root().join(folder)).expect("failed to remove folder");
    }

    /// Run a scan through the shared scanner.
    pub async fn scan(&self) -> cv_server::scanner::ScanSummary {
        self.ctx.scanner.scan().await.expect("scan failed")
    }
}

/// POST `/api/admin/rescan` and return the decoded summary.
pub async fn rescan(addr: SocketAddr) -> serde_json::Value {
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/admin/rescan"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

/// GET a JSON document, asserting a 200.
pub async fn get_json(addr: SocketAddr, path: &str) -> serde_json::Value {
    let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    assert_eq!(resp.status(), 200, "GET {path}");
    resp.json().await.unwrap()
}
