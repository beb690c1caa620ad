//! Configuration management for picbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use picbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PICBOX__<section>__<key>`
//!
//! Examples:
//! - `PICBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `PICBOX__WORKER__QUEUE_CAPACITY=256`
//! - `PICBOX__STORAGE__BUCKET=images`
//!
//! Storage credentials are read from `S3_ACCESS_KEY` / `S3_SECRET_KEY`
//! (or the `AWS_*` equivalents) and the initial cookie from `PICBOX_COOKIE`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/picbox.toml`.
//! This can be overridden using the `PICBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, ServerConfig, SourceConfig, StorageConfig, StorageProvider, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`PICBOX__*`)
    /// 2. TOML file (default: `config/picbox.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(sources::default_path())
    }

    /// Load configuration from a specific file, still applying env overrides
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
