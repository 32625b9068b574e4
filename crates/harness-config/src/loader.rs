//! Configuration Loader
//!
//! Finds `harness.toml`, layers environment overrides on top, and produces the
//! resolved [`HarnessSettings`].

use crate::project::ProjectConfig;
use crate::settings::{HarnessSettings, Overrides};
use crate::ConfigResult;
use std::path::{Path, PathBuf};

/// File name searched for when walking up from the start directory
pub const CONFIG_FILE_NAME: &str = "harness.toml";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Built-in defaults
/// 2. Project config (`harness.toml`)
/// 3. Environment variables (`HARNESS_*`)
/// 4. CLI flags (applied by the caller)
pub struct ConfigLoader {
    read_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved settings
    pub settings: HarnessSettings,

    /// The file the settings came from, if one was found
    pub config_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that honors `HARNESS_*` variables
    pub fn new() -> Self {
        Self { read_env: true }
    }

    /// Create a loader that ignores the environment
    pub fn without_env() -> Self {
        Self { read_env: false }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find `harness.toml`. No file anywhere is
    /// not an error: defaults are used.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        match Self::find_config_file(start_dir) {
            Some(path) => self.load_from_file(&path),
            None => self.resolve(ProjectConfig::default(), None),
        }
    }

    /// Load configuration from a specific file, which must exist
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project = ProjectConfig::load_from_file(config_path)?;
        self.resolve(project, Some(config_path.to_path_buf()))
    }

    /// Walk up from `start_dir` looking for `harness.toml`
    pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    fn resolve(&self, project: ProjectConfig, config_file: Option<PathBuf>) -> ConfigResult<Config> {
        let mut settings = HarnessSettings::default();
        let base = config_file.as_deref().and_then(Path::parent);
        settings.merge_section(&project.section(), base)?;

        if self.read_env {
            Overrides::from_env()?.apply(&mut settings);
        }

        Ok(Config {
            settings,
            config_file,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Directory holding the config file
    pub fn project_root(&self) -> Option<&Path> {
        self.config_file.as_deref().and_then(Path::parent)
    }
}
