//! MGMS Core Library
//!
//! Shared functionality for the media-gallery backend components:
//! - Environment-driven configuration
//! - SQLite pool helpers and common database errors
//! - Tracing/logging initialization

pub mod config;
pub mod db;
pub mod tracing_init;

pub use config::{Config, SmtpConfig};
pub use db::{DatabaseError, unix_timestamp};
