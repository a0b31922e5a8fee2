//! Core types, configuration, and error handling for kansa.
//!
//! This crate provides the shared foundation used by the other kansa crates:
//! - [`KansaError`]: unified error type using `thiserror`
//! - [`ReviewConfig`]: configuration loaded from `.github/ai-review/config.toml`
//! - Shared types: [`FileRecord`], [`Mode`], [`Language`]

mod config;
mod error;
mod types;

pub use config::{
    DiffConfig, ExcludeConfig, LlmConfig, OutputConfig, ReviewAspect, ReviewConfig,
    DEFAULT_CONFIG_PATH, DEFAULT_MAX_FILE_SIZE, DEFAULT_OUTPUT_PATH,
};
pub use error::KansaError;
pub use types::{FileRecord, Language, Mode};

/// A convenience `Result` type for kansa operations.
pub type Result<T> = std::result::Result<T, KansaError>;
