//! Application context shared by every route handler and background task.

use std::sync::Arc;

use cv_core::config::Config;
use cv_db::pool::DbPool;

use crate::scanner::{ScanSettings, Scanner};

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s and the pool.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool.
    pub db: DbPool,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Reconciliation scanner; owns the single-run permit.
    pub scanner: Arc<Scanner>,
}

impl AppContext {
    pub fn new(db: DbPool, config: Config) -> Self {
        let scanner = Arc::new(Scanner::new(
            db.clone(),
            ScanSettings::from_config(&config.library),
        ));
        Self {
            db,
            config: Arc::new(config),
            scanner,
        }
    }
}
