//! Shared types, errors, and configuration for Trellis.
//!
//! This crate holds the building blocks used by every other crate in the
//! workspace: typed entity IDs, the money type, the application error type,
//! and configuration loading. It has no database or web dependencies.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
