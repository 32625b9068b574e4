//! Resolved settings
//!
//! [`HarnessSettings`] is the only configuration shape the engine sees. It is
//! built from defaults, then layered with the project file, the environment and
//! finally command-line [`Overrides`].

use crate::project::{split_joined, HarnessSection};
use crate::{ConfigError, ConfigResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default location of the JSON report
pub const DEFAULT_REPORT_PATH: &str = "reports/test-results.json";

/// Default minimum log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Accepted log level names
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Which backend executes the tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerKind {
    /// In-process discovery and execution of harness modules
    #[default]
    Reflection,
    /// Rust libtest executables driven as an external engine
    Libtest,
}

impl FromStr for RunnerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reflection" => Ok(RunnerKind::Reflection),
            "libtest" => Ok(RunnerKind::Libtest),
            other => Err(ConfigError::InvalidValue {
                field: "runner".to_string(),
                reason: format!("expected 'reflection' or 'libtest', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerKind::Reflection => write!(f, "reflection"),
            RunnerKind::Libtest => write!(f, "libtest"),
        }
    }
}

/// Shared-library extension for the current platform, without the dot
pub fn module_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Default file-name glob for test modules
pub fn default_module_pattern() -> String {
    format!("*.Tests.{}", module_extension())
}

/// Default file-name glob for libtest executables
pub fn default_executable_pattern() -> String {
    format!("*.Tests{}", std::env::consts::EXE_SUFFIX)
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessSettings {
    pub runner: RunnerKind,

    /// Explicit module paths; when non-empty, search paths are ignored
    pub modules: Vec<PathBuf>,

    pub search_paths: Vec<PathBuf>,

    /// Configured glob, if any; see [`HarnessSettings::effective_pattern`]
    pub module_pattern: Option<String>,

    pub report_path: PathBuf,

    pub log_level: String,

    pub async_timeout: Option<Duration>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            runner: RunnerKind::default(),
            modules: Vec::new(),
            search_paths: Vec::new(),
            module_pattern: None,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            async_timeout: None,
        }
    }
}

impl HarnessSettings {
    /// Layer a validated `[harness]` table over these settings
    ///
    /// Relative paths in the file are taken relative to `base`, the directory
    /// holding the file.
    pub fn merge_section(&mut self, section: &HarnessSection, base: Option<&Path>) -> ConfigResult<()> {
        let anchor = |entry: String| -> PathBuf {
            let path = PathBuf::from(entry);
            match base {
                Some(base) if path.is_relative() => base.join(path),
                _ => path,
            }
        };

        if let Some(runner) = &section.runner {
            self.runner = runner.parse()?;
        }
        if let Some(modules) = &section.modules {
            self.modules = modules.entries().into_iter().map(anchor).collect();
        }
        if let Some(search_paths) = &section.search_paths {
            self.search_paths = search_paths.entries().into_iter().map(anchor).collect();
        }
        if let Some(pattern) = &section.module_pattern {
            self.module_pattern = Some(pattern.clone());
        }
        if let Some(report_path) = &section.report_path {
            self.report_path = match base {
                Some(base) if report_path.is_relative() => base.join(report_path),
                _ => report_path.clone(),
            };
        }
        if let Some(level) = &section.log_level {
            self.log_level = level.to_lowercase();
        }
        if let Some(secs) = section.async_timeout_secs {
            self.async_timeout = Some(Duration::from_secs(secs));
        }
        Ok(())
    }

    /// Search `dir` when neither modules nor search paths are configured
    ///
    /// Returns whether `dir` was added.
    pub fn search_by_default(&mut self, dir: &Path) -> bool {
        if !self.modules.is_empty() || !self.search_paths.is_empty() {
            return false;
        }
        self.search_paths.push(dir.to_path_buf());
        true
    }

    /// The glob used for directory scans: configured, or the runner's default
    pub fn effective_pattern(&self) -> String {
        match &self.module_pattern {
            Some(pattern) => pattern.clone(),
            None => match self.runner {
                RunnerKind::Reflection => default_module_pattern(),
                RunnerKind::Libtest => default_executable_pattern(),
            },
        }
    }
}

/// Values that replace whatever the lower layers resolved
///
/// Filled from `HARNESS_*` variables by the loader and from flags by the CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub runner: Option<RunnerKind>,
    pub modules: Option<Vec<PathBuf>>,
    pub search_paths: Option<Vec<PathBuf>>,
    pub module_pattern: Option<String>,
    pub report_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub async_timeout: Option<Duration>,
}

impl Overrides {
    /// Read `HARNESS_*` variables from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `HARNESS_*` variables through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let paths = |value: String| -> Vec<PathBuf> {
            split_joined(&value).into_iter().map(PathBuf::from).collect()
        };

        let runner = get("HARNESS_RUNNER").map(|value| value.parse()).transpose()?;

        let log_level = match get("HARNESS_LOG_LEVEL") {
            Some(level) => Some(parse_log_level("HARNESS_LOG_LEVEL", &level)?),
            None => None,
        };

        let async_timeout = match get("HARNESS_ASYNC_TIMEOUT_SECS") {
            Some(value) => Some(parse_timeout("HARNESS_ASYNC_TIMEOUT_SECS", &value)?),
            None => None,
        };

        Ok(Self {
            runner,
            modules: get("HARNESS_MODULES").map(paths),
            search_paths: get("HARNESS_SEARCH_PATHS").map(paths),
            module_pattern: get("HARNESS_MODULE_PATTERN"),
            report_path: get("HARNESS_REPORT_PATH").map(PathBuf::from),
            log_level,
            async_timeout,
        })
    }

    /// Replace every field of `settings` that is set here
    pub fn apply(&self, settings: &mut HarnessSettings) {
        if let Some(runner) = self.runner {
            settings.runner = runner;
        }
        if let Some(modules) = &self.modules {
            settings.modules = modules.clone();
        }
        if let Some(search_paths) = &self.search_paths {
            settings.search_paths = search_paths.clone();
        }
        if let Some(pattern) = &self.module_pattern {
            settings.module_pattern = Some(pattern.clone());
        }
        if let Some(report_path) = &self.report_path {
            settings.report_path = report_path.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if let Some(timeout) = self.async_timeout {
            settings.async_timeout = Some(timeout);
        }
    }
}

/// Normalize and check a log level name
pub fn parse_log_level(field: &str, value: &str) -> ConfigResult<String> {
    let level = value.trim().to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be one of {}, got '{}'", LOG_LEVELS.join(", "), value),
        })
    }
}

/// Parse a positive number of seconds
pub fn parse_timeout(field: &str, value: &str) -> ConfigResult<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a positive number of seconds, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathList;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_runner_kind_parses_case_insensitively() {
        assert_eq!("Reflection".parse::<RunnerKind>().unwrap(), RunnerKind::Reflection);
        assert_eq!(" libtest ".parse::<RunnerKind>().unwrap(), RunnerKind::Libtest);
        assert!("nunit".parse::<RunnerKind>().is_err());
    }

    #[test]
    fn test_default_pattern_uses_platform_extension() {
        let pattern = default_module_pattern();
        assert!(pattern.starts_with("*.Tests."));
        assert!(pattern.ends_with(module_extension()));
    }

    #[test]
    fn test_effective_pattern_follows_runner() {
        let mut settings = HarnessSettings::default();
        assert_eq!(settings.effective_pattern(), default_module_pattern());

        settings.runner = RunnerKind::Libtest;
        assert_eq!(settings.effective_pattern(), default_executable_pattern());

        settings.module_pattern = Some("*.plugin".to_string());
        assert_eq!(settings.effective_pattern(), "*.plugin");
    }

    #[test]
    fn test_search_by_default_only_fills_an_empty_location() {
        let mut settings = HarnessSettings::default();
        assert!(settings.search_by_default(Path::new("/opt/harness")));
        assert_eq!(settings.search_paths, vec![PathBuf::from("/opt/harness")]);

        assert!(!settings.search_by_default(Path::new("/elsewhere")));
        assert_eq!(settings.search_paths, vec![PathBuf::from("/opt/harness")]);

        let mut explicit = HarnessSettings {
            modules: vec![PathBuf::from("Bank.Tests.so")],
            ..Default::default()
        };
        assert!(!explicit.search_by_default(Path::new("/opt/harness")));
        assert!(explicit.search_paths.is_empty());
    }

    #[test]
    fn test_merge_section_anchors_relative_paths() {
        let section = HarnessSection {
            modules: Some(PathList::Many(vec!["bin/a.so".into(), "/abs/b.so".into()])),
            report_path: Some(PathBuf::from("out/report.json")),
            async_timeout_secs: Some(5),
            ..Default::default()
        };
        let mut settings = HarnessSettings::default();
        settings.merge_section(&section, Some(Path::new("/project"))).unwrap();

        assert_eq!(
            settings.modules,
            vec![PathBuf::from("/project/bin/a.so"), PathBuf::from("/abs/b.so")]
        );
        assert_eq!(settings.report_path, PathBuf::from("/project/out/report.json"));
        assert_eq!(settings.async_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("HARNESS_RUNNER", "libtest"),
            ("HARNESS_SEARCH_PATHS", "a;b; ;c"),
            ("HARNESS_LOG_LEVEL", "DEBUG"),
            ("HARNESS_MODULE_PATTERN", "  "),
        ]
        .into_iter()
        .collect();

        let overrides = Overrides::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(overrides.runner, Some(RunnerKind::Libtest));
        assert_eq!(
            overrides.search_paths,
            Some(vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")])
        );
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert_eq!(overrides.module_pattern, None);
    }

    #[test]
    fn test_overrides_reject_bad_timeout() {
        let result = Overrides::from_lookup(|key| {
            (key == "HARNESS_ASYNC_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_apply_replaces_only_set_fields() {
        let mut settings = HarnessSettings {
            log_level: "warn".to_string(),
            ..Default::default()
        };
        let overrides = Overrides {
            report_path: Some(PathBuf::from("custom.json")),
            ..Default::default()
        };
        overrides.apply(&mut settings);

        assert_eq!(settings.report_path, PathBuf::from("custom.json"));
        assert_eq!(settings.log_level, "warn");
    }
}
