//! Runner façade
//!
//! Every backend turns its configuration into one [`TestSuiteResult`] and
//! never fails: problems become log events or `CRITICAL_ERROR` rows.

mod libtest;
mod reflection;

pub use libtest::{failure_message, map_status, parse_output, LibtestRunner, ParsedOutput};
pub use reflection::ReflectionRunner;

use crate::model::TestSuiteResult;
use async_trait::async_trait;
use harness_config::{HarnessSettings, RunnerKind};
use tracing::{info, warn};

/// A test backend
#[async_trait(?Send)]
pub trait TestRunner {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Locate, discover and execute; always returns a finalized suite
    async fn run(&self) -> TestSuiteResult;
}

/// The backend the settings ask for
pub fn runner_for(settings: &HarnessSettings) -> Box<dyn TestRunner> {
    match settings.runner {
        RunnerKind::Reflection => Box::new(ReflectionRunner::from_settings(settings)),
        RunnerKind::Libtest => Box::new(LibtestRunner::from_settings(settings)),
    }
}

/// Log the closing summary line of a run
pub(crate) fn log_summary(runner: &str, suite: &TestSuiteResult) {
    let summary = suite.summary();
    let elapsed_ms = suite.elapsed().as_millis() as u64;
    if summary.critical > 0 || summary.failed > 0 {
        warn!(
            runner,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            critical = summary.critical,
            elapsed_ms,
            "Test run finished"
        );
    } else {
        info!(
            runner,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            critical = summary.critical,
            elapsed_ms,
            "Test run finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_runner_for_follows_settings() {
        let mut settings = HarnessSettings::default();
        assert_eq!(runner_for(&settings).name(), "reflection");

        settings.runner = RunnerKind::Libtest;
        settings.search_paths = vec![PathBuf::from("target/debug")];
        assert_eq!(runner_for(&settings).name(), "libtest");
    }
}
