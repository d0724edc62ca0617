//! Database query modules.

pub mod items;
pub mod labels;
