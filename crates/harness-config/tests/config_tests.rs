//! Configuration loading and precedence tests

use harness_config::{ConfigError, ConfigLoader, Overrides, RunnerKind, CONFIG_FILE_NAME};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const HARNESS_VARS: &[&str] = &[
    "HARNESS_RUNNER",
    "HARNESS_MODULES",
    "HARNESS_SEARCH_PATHS",
    "HARNESS_MODULE_PATTERN",
    "HARNESS_REPORT_PATH",
    "HARNESS_LOG_LEVEL",
    "HARNESS_ASYNC_TIMEOUT_SECS",
];

fn clear_env() {
    for var in HARNESS_VARS {
        env::remove_var(var);
    }
}

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_when_no_config_exists() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::new().load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(config.config_file, None);
    assert_eq!(config.settings.runner, RunnerKind::Reflection);
    assert_eq!(config.settings.report_path, PathBuf::from("reports/test-results.json"));
    assert_eq!(config.settings.log_level, "info");
    assert!(config.settings.modules.is_empty());
}

#[test]
#[serial]
fn test_load_from_subdirectory_finds_parent() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[harness]
runner = "libtest"
search_paths = ["target/debug"]
"#,
    );
    let nested = temp_dir.path().join("crates").join("inner");
    fs::create_dir_all(&nested).unwrap();

    let config = ConfigLoader::new().load_from_directory(&nested).unwrap();

    assert_eq!(config.project_root(), Some(temp_dir.path()));
    assert_eq!(config.settings.runner, RunnerKind::Libtest);
    assert_eq!(
        config.settings.search_paths,
        vec![temp_dir.path().join("target/debug")]
    );
}

#[test]
#[serial]
fn test_load_from_missing_file_is_not_found() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let result = ConfigLoader::new().load_from_file(&temp_dir.path().join("absent.toml"));

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
#[serial]
fn test_invalid_toml_reports_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[harness\nrunner = ");

    let err = ConfigLoader::new().load_from_file(&path).unwrap_err();

    assert!(err.to_string().contains(CONFIG_FILE_NAME));
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_project_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[harness]
log_level = "warn"
module_pattern = "*.Plugin.so"
"#,
    );
    env::set_var("HARNESS_LOG_LEVEL", "trace");
    env::set_var("HARNESS_ASYNC_TIMEOUT_SECS", "30");

    let config = ConfigLoader::new().load_from_directory(temp_dir.path());
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.settings.log_level, "trace");
    assert_eq!(config.settings.module_pattern.as_deref(), Some("*.Plugin.so"));
    assert_eq!(config.settings.async_timeout, Some(Duration::from_secs(30)));
}

#[test]
#[serial]
fn test_without_env_ignores_variables() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("HARNESS_RUNNER", "libtest");

    let config = ConfigLoader::without_env().load_from_directory(temp_dir.path());
    clear_env();

    assert_eq!(config.unwrap().settings.runner, RunnerKind::Reflection);
}

#[test]
#[serial]
fn test_invalid_env_value_is_an_error() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("HARNESS_RUNNER", "nunit");

    let result = ConfigLoader::new().load_from_directory(temp_dir.path());
    clear_env();

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_cli_overrides_win_over_env() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("HARNESS_MODULES", "from-env.so");

    let config = ConfigLoader::new().load_from_directory(temp_dir.path());
    clear_env();
    let mut settings = config.unwrap().settings;
    assert_eq!(settings.modules, vec![PathBuf::from("from-env.so")]);

    let cli = Overrides {
        modules: Some(vec![PathBuf::from("from-cli.so")]),
        ..Default::default()
    };
    cli.apply(&mut settings);

    assert_eq!(settings.modules, vec![PathBuf::from("from-cli.so")]);
}
