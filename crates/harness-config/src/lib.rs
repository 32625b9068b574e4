//! Harness Configuration System
//!
//! Resolves the settings the test engine consumes:
//! - Project configuration (`harness.toml`)
//! - Environment variables (`HARNESS_*`)
//! - Command-line overrides
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Project config (`harness.toml`, found by walking up from the start directory)
//! 3. Environment variables (`HARNESS_*`)
//! 4. CLI flags (applied by the caller through [`Overrides`])
//!
//! # Example
//!
//! ```no_run
//! use harness_config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load_from_directory(Path::new(".")).unwrap();
//! println!("runner: {}", config.settings.runner);
//! ```

pub mod loader;
pub mod project;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
pub use project::{HarnessSection, PathList, ProjectConfig};
pub use settings::{
    default_module_pattern, module_extension, HarnessSettings, Overrides, RunnerKind,
};
