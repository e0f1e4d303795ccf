//! # tunegraph Common Library
//!
//! Shared code for the tunegraph services:
//! - Error type
//! - Configuration loading (TOML file + compiled defaults)
//! - SQLite pool helpers
//! - Change event envelope
//! - Catalog record types read from the source store

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
