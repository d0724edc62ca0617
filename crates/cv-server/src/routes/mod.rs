//! Route handlers for the HTTP API.

pub mod admin;
pub mod health;
pub mod tags;
pub mod videos;
