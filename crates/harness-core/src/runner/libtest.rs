//! libtest adapter
//!
//! Drives existing Rust test executables as an external engine and maps their
//! JSON event stream onto the shared result model.

use super::{log_summary, TestRunner};
use crate::locator::{DirectFiles, ModuleLocator};
use crate::model::{TestCaseResult, TestOutcome, TestSuiteResult};
use async_trait::async_trait;
use harness_config::HarnessSettings;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Test name of the row recorded when an executable cannot be driven
pub const ENGINE_FAILURE_TEST: &str = "LibtestEngine.Run";

/// Class name of the row recorded when an executable cannot be driven
pub const ENGINE_FAILURE_CLASS: &str = "LibtestEngine";

const LIBTEST_ARGS: &[&str] = &[
    "-Z",
    "unstable-options",
    "--format",
    "json",
    "--report-time",
    "--test-threads",
    "1",
];

/// Runs libtest executables and collects their JSON reports
#[derive(Debug, Clone)]
pub struct LibtestRunner {
    locator: ModuleLocator,
}

impl LibtestRunner {
    pub fn new(locator: ModuleLocator) -> Self {
        Self {
            locator: locator.with_direct_files(DirectFiles::Any),
        }
    }

    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self::new(ModuleLocator::from_settings(settings))
    }

    async fn run_executable(&self, path: &Path) -> Result<Vec<TestCaseResult>, String> {
        let output = Command::new(path)
            .args(LIBTEST_ARGS)
            .env("RUSTC_BOOTSTRAP", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| format!("Failed to start {}: {}", path.display(), e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_output(&stdout, &executable_name(path));

        if parsed.rows.is_empty() && parsed.unfinished.is_empty() && !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                path.display(),
                output.status,
                stderr.trim()
            ));
        }

        let mut rows = parsed.rows;
        for name in parsed.unfinished {
            let class_name = class_name_of(&name, &executable_name(path));
            rows.push(TestCaseResult::critical(
                name,
                class_name,
                format!("Test did not finish; process exited with {}", output.status),
            ));
        }
        Ok(rows)
    }
}

#[async_trait(?Send)]
impl TestRunner for LibtestRunner {
    fn name(&self) -> &'static str {
        "libtest"
    }

    async fn run(&self) -> TestSuiteResult {
        let mut suite = TestSuiteResult::start();

        let executables = self.locator.locate();
        if executables.is_empty() {
            warn!("No test executables found");
            let suite = suite.finish();
            log_summary(self.name(), &suite);
            return suite;
        }

        for path in &executables {
            info!(executable = %path.display(), "Running libtest executable");
            match self.run_executable(path).await {
                Ok(rows) => {
                    debug!(executable = %path.display(), rows = rows.len(), "Collected libtest results");
                    suite.extend(rows);
                }
                Err(message) => {
                    error!(executable = %path.display(), error = %message, "Critical error running libtest executable");
                    suite.push(TestCaseResult::critical(
                        ENGINE_FAILURE_TEST,
                        ENGINE_FAILURE_CLASS,
                        message,
                    ));
                }
            }
        }

        let suite = suite.finish();
        log_summary(self.name(), &suite);
        suite
    }
}

/// One line of libtest's JSON output
#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    event: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exec_time: Option<f64>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Rows for every finished test, plus tests that started but never finished
#[derive(Debug, Default, PartialEq)]
pub struct ParsedOutput {
    pub rows: Vec<TestCaseResult>,
    pub unfinished: Vec<String>,
}

/// Outcome for a libtest test event; `None` for events that are not final
pub fn map_status(event: &str) -> Option<TestOutcome> {
    match event {
        "started" | "timeout" => None,
        "ok" => Some(TestOutcome::Pass),
        "failed" | "ignored" => Some(TestOutcome::Fail),
        _ => Some(TestOutcome::CriticalError),
    }
}

/// Parse libtest's JSON stream; `executable` names tests outside any module
pub fn parse_output(stdout: &str, executable: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();

    for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(_) => continue,
        };
        if event.kind != "test" {
            continue;
        }
        let Some(name) = event.name.clone() else {
            continue;
        };

        let Some(outcome) = map_status(&event.event) else {
            if event.event == "started" {
                parsed.unfinished.push(name);
            }
            continue;
        };
        parsed.unfinished.retain(|started| *started != name);

        let duration = event
            .exec_time
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::ZERO);
        let class_name = class_name_of(&name, executable);
        let captured = event.stdout.clone().filter(|s| !s.trim().is_empty());

        let row = match outcome {
            TestOutcome::Pass => TestCaseResult::passed(name, class_name, duration),
            TestOutcome::Fail if event.event == "ignored" => {
                let reason = event.message.clone().unwrap_or_else(|| "test ignored".to_string());
                TestCaseResult::failed(name, class_name, duration, reason)
            }
            TestOutcome::Fail => {
                let message = failure_message(captured.as_deref(), event.message.as_deref());
                TestCaseResult::failed(name, class_name, duration, message).with_stack_trace(captured)
            }
            TestOutcome::CriticalError => TestCaseResult::critical(
                name,
                class_name,
                format!("unrecognized test event '{}'", event.event),
            )
            .with_duration(duration)
            .with_stack_trace(captured),
        };
        parsed.rows.push(row);
    }

    parsed
}

/// Failure text from a failed test's captured output
///
/// Prefers the panic message, then libtest's own message, then the first
/// non-empty captured line.
pub fn failure_message(captured: Option<&str>, reported: Option<&str>) -> String {
    if let Some(text) = captured.and_then(panic_text) {
        return text;
    }
    if let Some(message) = reported.map(str::trim).filter(|m| !m.is_empty()) {
        return message.to_string();
    }
    captured
        .and_then(|text| text.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| "test failed".to_string())
}

fn panic_text(captured: &str) -> Option<String> {
    let mut lines = captured.lines();
    let header = lines.by_ref().find(|line| line.contains("panicked at"))?;

    // Older toolchains: panicked at 'message', src/lib.rs:4:5
    if let Some(rest) = header.split_once("panicked at '").map(|(_, rest)| rest) {
        return rest.rsplit_once("', ").map(|(message, _)| message.to_string());
    }

    // Current toolchains put the message on the lines after the location
    let body: Vec<&str> = lines
        .take_while(|line| !line.starts_with("note:") && !line.starts_with("stack backtrace:"))
        .collect();
    let text = body.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn class_name_of(test_name: &str, executable: &str) -> String {
    match test_name.rsplit_once("::") {
        Some((path, _)) => path.to_string(),
        None => executable.to_string(),
    }
}

fn executable_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
