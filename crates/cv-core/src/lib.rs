//! cv-core: shared error type and configuration.
//!
//! This crate is the foundational dependency for all other cv-* crates,
//! providing a unified error type and the application configuration.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
