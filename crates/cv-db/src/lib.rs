//! cv-db: catalog storage.
//!
//! SQLite-backed persistence for items, labels and their links, with
//! connection pooling, embedded migrations, typed models and free-function
//! query modules.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
