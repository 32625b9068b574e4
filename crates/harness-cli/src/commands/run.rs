//! Run command - execute every discovered test and write the report

use super::{
    apply_default_search_path, config_failure, parse_async_timeout, parse_runner, LocationArgs,
    CONFIG_ERROR_EXIT,
};
use crate::logging;
use crate::reporter::ConsoleReporter;
use anyhow::Result;
use harness_config::{ConfigResult, Overrides};
use harness_core::{runner_for, JsonReportGenerator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Arguments for the run command
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub location: LocationArgs,
    /// Backend name
    pub runner: Option<String>,
    /// Where to write the JSON report
    pub report: Option<PathBuf>,
    /// Seconds to wait for an async test body
    pub async_timeout: Option<String>,
    /// Disable colored output
    pub no_color: bool,
    /// Skip the per-case lines
    pub quiet: bool,
}

impl RunArgs {
    fn overrides(&self) -> ConfigResult<Overrides> {
        Ok(Overrides {
            runner: parse_runner(self.runner.as_deref())?,
            report_path: self.report.clone(),
            async_timeout: parse_async_timeout(self.async_timeout.as_deref())?,
            ..Default::default()
        })
    }
}

/// Run the run command
pub fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = match args
        .overrides()
        .and_then(|extra| args.location.resolve(&extra))
    {
        Ok(config) => config,
        Err(e) => return Ok(config_failure(&e)),
    };

    logging::init(&config.settings.log_level, !args.no_color);
    apply_default_search_path(&mut config.settings);
    let settings = &config.settings;
    info!(
        runner = %settings.runner,
        config = ?config.config_file,
        modules = settings.modules.len(),
        search_paths = settings.search_paths.len(),
        "Test Harness starting"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let runner = runner_for(settings);
    let suite = runtime.block_on(runner.run());
    // A timed-out body may still occupy a blocking thread
    runtime.shutdown_background();

    let mut code = suite.exit_code();
    if let Err(e) = JsonReportGenerator::new(&settings.report_path).write(&suite) {
        error!(error = %e, "Could not write the test report");
        code = code.max(CONFIG_ERROR_EXIT);
    }

    ConsoleReporter::new(!args.quiet)
        .with_no_color(args.no_color)
        .report(&suite)?;

    info!(exit_code = code, "Test Harness finished");
    Ok(ExitCode::from(code))
}
