//! Harness engine
//!
//! Locates compiled test modules, loads each one in isolation, discovers its
//! test cases from marker metadata, runs them and classifies every outcome.
//!
//! Control flow: [`locator`] → [`loader`] → [`discovery`] → [`executor`],
//! driven by a [`runner::TestRunner`], with the finished
//! [`model::TestSuiteResult`] written by [`report::JsonReportGenerator`].
//!
//! # Example
//!
//! ```no_run
//! use harness_config::ConfigLoader;
//! use harness_core::{runner_for, JsonReportGenerator};
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load_from_directory(Path::new("."))?;
//! let suite = runner_for(&config.settings).run().await;
//! JsonReportGenerator::new(&config.settings.report_path).write(&suite)?;
//! std::process::exit(suite.exit_code().into());
//! # }
//! ```

pub mod discovery;
pub mod executor;
pub mod glob;
pub mod loader;
pub mod locator;
pub mod model;
pub mod report;
pub mod runner;

#[cfg(test)]
mod testing;

pub use discovery::{discover_module, CaseListing, DiscoveredCase, MarkerFamily, MarkerKind};
pub use executor::TestExecutor;
pub use loader::{DependencyResolver, IsolationContext, LinkedNames, LoadError, TestModule};
pub use locator::ModuleLocator;
pub use model::{RunSummary, TestCaseResult, TestOutcome, TestSuiteResult};
pub use report::{JsonReportGenerator, ReportError};
pub use runner::{runner_for, LibtestRunner, ReflectionRunner, TestRunner};
