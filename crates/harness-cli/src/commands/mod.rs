//! Subcommand implementations

pub mod list;
pub mod run;

use clap::Args;
use harness_config::settings::{parse_log_level, parse_timeout};
use harness_config::{Config, ConfigLoader, ConfigResult, HarnessSettings, Overrides, RunnerKind};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

/// Exit code for configuration errors, shared with `CRITICAL_ERROR` runs
pub const CONFIG_ERROR_EXIT: u8 = 2;

/// Flags that decide where test modules come from
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Configuration file (defaults to the nearest harness.toml)
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Test module to load (can be repeated; disables directory search)
    #[arg(long = "module", short = 'm', value_name = "PATH")]
    pub modules: Vec<PathBuf>,

    /// Directory to search for test modules (can be repeated)
    #[arg(long = "search-path", short = 's', value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// File name glob used inside search directories
    #[arg(long, short = 'p', value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl LocationArgs {
    /// Overrides carried by these flags
    pub fn overrides(&self) -> ConfigResult<Overrides> {
        let log_level = self
            .log_level
            .as_deref()
            .map(|level| parse_log_level("--log-level", level))
            .transpose()?;

        Ok(Overrides {
            modules: non_empty(&self.modules),
            search_paths: non_empty(&self.search_paths),
            module_pattern: self.pattern.clone(),
            log_level,
            ..Default::default()
        })
    }

    /// Resolve defaults, then the project file, then `HARNESS_*`, then `extra`
    pub fn resolve(&self, extra: &Overrides) -> ConfigResult<Config> {
        let loader = ConfigLoader::new();
        let mut config = match &self.config {
            Some(path) => loader.load_from_file(path)?,
            None => loader.load_from_directory(&std::env::current_dir()?)?,
        };

        self.overrides()?.apply(&mut config.settings);
        extra.apply(&mut config.settings);
        Ok(config)
    }
}

/// Search the harness executable's own directory when nothing else is configured
pub fn apply_default_search_path(settings: &mut HarnessSettings) {
    let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    else {
        return;
    };
    if settings.search_by_default(&dir) {
        info!(path = %dir.display(), "No modules or search paths configured, searching the harness directory");
    }
}

/// Parse `--runner`
pub fn parse_runner(value: Option<&str>) -> ConfigResult<Option<RunnerKind>> {
    value.map(str::parse).transpose()
}

/// Parse `--async-timeout`
pub fn parse_async_timeout(value: Option<&str>) -> ConfigResult<Option<std::time::Duration>> {
    value
        .map(|secs| parse_timeout("--async-timeout", secs))
        .transpose()
}

/// Report a configuration problem and pick the matching exit code
pub fn config_failure(error: &harness_config::ConfigError) -> ExitCode {
    eprintln!("error: {}", error);
    ExitCode::from(CONFIG_ERROR_EXIT)
}

fn non_empty(paths: &[PathBuf]) -> Option<Vec<PathBuf>> {
    if paths.is_empty() {
        None
    } else {
        Some(paths.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_search_path_is_the_executable_directory() {
        let mut settings = HarnessSettings::default();
        apply_default_search_path(&mut settings);

        let exe = std::env::current_exe().unwrap();
        assert_eq!(settings.search_paths, vec![exe.parent().unwrap().to_path_buf()]);
    }

    #[test]
    fn test_default_search_path_leaves_configured_location_alone() {
        let mut settings = HarnessSettings {
            search_paths: vec![PathBuf::from("bin")],
            ..Default::default()
        };
        apply_default_search_path(&mut settings);

        assert_eq!(settings.search_paths, vec![PathBuf::from("bin")]);
    }

    #[test]
    fn test_empty_flags_override_nothing() {
        let overrides = LocationArgs::default().overrides().unwrap();
        assert_eq!(overrides, Overrides::default());
    }

    #[test]
    fn test_flags_replace_settings() {
        let args = LocationArgs {
            modules: vec![PathBuf::from("out/Bank.Tests.so")],
            pattern: Some("*.so".to_string()),
            log_level: Some("DEBUG".to_string()),
            ..Default::default()
        };
        let mut settings = HarnessSettings {
            search_paths: vec![PathBuf::from("bin")],
            ..Default::default()
        };

        args.overrides().unwrap().apply(&mut settings);

        assert_eq!(settings.modules, vec![PathBuf::from("out/Bank.Tests.so")]);
        assert_eq!(settings.search_paths, vec![PathBuf::from("bin")]);
        assert_eq!(settings.module_pattern.as_deref(), Some("*.so"));
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_bad_log_level_names_the_flag() {
        let args = LocationArgs {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };

        let error = args.overrides().unwrap_err();
        assert!(error.to_string().contains("--log-level"));
    }

    #[test]
    fn test_runner_and_timeout_parsing() {
        assert_eq!(parse_runner(None).unwrap(), None);
        assert_eq!(parse_runner(Some("libtest")).unwrap(), Some(RunnerKind::Libtest));
        assert!(parse_runner(Some("nunit")).is_err());

        assert_eq!(
            parse_async_timeout(Some("30")).unwrap(),
            Some(Duration::from_secs(30))
        );
        assert!(parse_async_timeout(Some("0")).is_err());
    }
}
