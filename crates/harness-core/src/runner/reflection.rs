use super::{log_summary, TestRunner};
use crate::discovery::{discover_module, DiscoveredCase};
use crate::executor::TestExecutor;
use crate::loader::{IsolationContext, TestModule};
use crate::locator::ModuleLocator;
use crate::model::TestSuiteResult;
use async_trait::async_trait;
use harness_config::HarnessSettings;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// The built-in engine: loads harness modules and runs them in-process
#[derive(Debug, Clone)]
pub struct ReflectionRunner {
    locator: ModuleLocator,
    async_timeout: Option<Duration>,
}

impl ReflectionRunner {
    pub fn new(locator: ModuleLocator) -> Self {
        Self {
            locator,
            async_timeout: None,
        }
    }

    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self::new(ModuleLocator::from_settings(settings)).with_async_timeout(settings.async_timeout)
    }

    pub fn with_async_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// One context per loadable candidate; failures are logged and skipped
    fn load_modules(&self) -> Vec<IsolationContext> {
        self.locator
            .locate()
            .into_iter()
            .filter_map(|path| match IsolationContext::load_default(&path) {
                Ok(context) => {
                    info!(module = %path.display(), dependencies = context.dependency_count(), "Loaded test module");
                    Some(context)
                }
                Err(e) => {
                    warn!(module = %path.display(), error = %e, "Failed to load test module, skipping");
                    None
                }
            })
            .collect()
    }

    /// Discovered cases across all modules, without running any of them
    pub fn discover(&self) -> Vec<DiscoveredCase> {
        let contexts = self.load_modules();
        contexts
            .iter()
            .flat_map(|context| discover_module(context))
            .collect()
    }
}

#[async_trait(?Send)]
impl TestRunner for ReflectionRunner {
    fn name(&self) -> &'static str {
        "reflection"
    }

    async fn run(&self) -> TestSuiteResult {
        let mut suite = TestSuiteResult::start();

        let contexts = self.load_modules();
        if contexts.is_empty() {
            warn!("No test modules found");
            let suite = suite.finish();
            log_summary(self.name(), &suite);
            return suite;
        }

        let discovered: Vec<Vec<DiscoveredCase>> =
            contexts.iter().map(|context| discover_module(context)).collect();
        info!(
            modules = contexts.len(),
            cases = discovered.iter().map(Vec::len).sum::<usize>(),
            "Discovery complete"
        );

        let mut executor = TestExecutor::new().with_async_timeout(self.async_timeout);
        for (context, cases) in contexts.iter().zip(&discovered) {
            let results = executor.execute_all(context, cases).await;
            suite.extend(results);
        }

        let suite = suite.finish();
        release(contexts, executor.abandoned_modules());
        log_summary(self.name(), &suite);
        suite
    }
}

/// Unload every context, except those whose code may still be running
fn release(contexts: Vec<IsolationContext>, abandoned: &[PathBuf]) {
    for context in contexts {
        if abandoned.iter().any(|path| path.as_path() == context.path()) {
            warn!(module = %context.path().display(), "Keeping module loaded: a timed-out test is still running");
            context.leak();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_config::module_extension;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_modules_gives_finished_empty_suite() {
        let dir = TempDir::new().unwrap();
        let runner = ReflectionRunner::new(
            ModuleLocator::new("*.Tests.so").with_search_paths(vec![dir.path().to_path_buf()]),
        );

        let suite = runner.run().await;

        assert!(suite.test_cases.is_empty());
        assert!(suite.finished_at >= suite.started_at);
        assert_eq!(suite.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_missing_explicit_module_is_dropped() {
        let dir = TempDir::new().unwrap();
        let runner = ReflectionRunner::new(
            ModuleLocator::new("*").with_modules(vec![dir.path().join("Gone.Tests.so")]),
        );

        let suite = runner.run().await;

        assert!(suite.test_cases.is_empty());
    }

    #[tokio::test]
    async fn test_unloadable_module_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("Corrupt.Tests.{}", module_extension()));
        fs::write(&path, b"\x7fELF but not really").unwrap();
        let runner = ReflectionRunner::new(ModuleLocator::new("*").with_modules(vec![path]));

        let suite = runner.run().await;

        assert!(suite.test_cases.is_empty());
        assert_eq!(suite.exit_code(), 0);
        assert!(runner.discover().is_empty());
    }
}
