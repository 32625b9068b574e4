//! Project Configuration (harness.toml)
//!
//! Handles the `[harness]` table of a `harness.toml` file.

use crate::settings::{RunnerKind, LOG_LEVELS};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration from harness.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Runner configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harness: Option<HarnessSection>,
}

/// The `[harness]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HarnessSection {
    /// Backend: "reflection" or "libtest"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,

    /// Explicit module paths; takes precedence over `search_paths`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<PathList>,

    /// Directories (or module files) to scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_paths: Option<PathList>,

    /// File-name glob for directory scans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_pattern: Option<String>,

    /// Where the JSON report is written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,

    /// Minimum log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Upper bound on waiting for an asynchronous test body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_timeout_secs: Option<u64>,
}

/// A list of paths written either as an array or as one `;`-separated string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathList {
    Many(Vec<String>),
    Joined(String),
}

impl PathList {
    /// Non-blank entries, trimmed, in order
    pub fn entries(&self) -> Vec<String> {
        match self {
            PathList::Many(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            PathList::Joined(joined) => split_joined(joined),
        }
    }
}

/// Split a `;`-separated list, dropping blank entries
pub fn split_joined(joined: &str) -> Vec<String> {
    joined
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration text; `file` is only used for error messages
    pub fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        match &self.harness {
            Some(section) => section.validate(),
            None => Ok(()),
        }
    }

    /// The `[harness]` table, or an empty one
    pub fn section(&self) -> HarnessSection {
        self.harness.clone().unwrap_or_default()
    }
}

impl HarnessSection {
    /// Validate every value that is set
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(runner) = &self.runner {
            runner.parse::<RunnerKind>()?;
        }

        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "harness.log_level".to_string(),
                    reason: format!("must be one of {}, got '{}'", LOG_LEVELS.join(", "), level),
                });
            }
        }

        if let Some(pattern) = &self.module_pattern {
            if pattern.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "harness.module_pattern".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.async_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "harness.async_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
