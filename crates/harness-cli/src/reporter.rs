//! Console summary of a finished run

use colored::*;
use harness_core::{TestCaseResult, TestOutcome, TestSuiteResult};
use std::io::{self, Write};

/// Console reporter with output configuration
pub struct ConsoleReporter {
    /// Print one line per case
    per_case: bool,
    /// Disable colored output
    no_color: bool,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConsoleReporter {
    pub fn new(per_case: bool) -> Self {
        Self {
            per_case,
            no_color: false,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Print the summary to stdout
    pub fn report(&self, suite: &TestSuiteResult) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_to(&mut out, suite)?;
        out.flush()
    }

    /// Write the summary to any sink
    pub fn write_to<W: Write>(&self, out: &mut W, suite: &TestSuiteResult) -> io::Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }

        let result = self.write_sections(out, suite);

        if self.no_color {
            colored::control::unset_override();
        }
        result
    }

    fn write_sections<W: Write>(&self, out: &mut W, suite: &TestSuiteResult) -> io::Result<()> {
        if self.per_case {
            for case in &suite.test_cases {
                self.write_case(out, case)?;
            }
            if !suite.test_cases.is_empty() {
                writeln!(out)?;
            }
        }

        self.write_totals(out, suite)?;
        self.write_failures(out, suite)
    }

    fn write_case<W: Write>(&self, out: &mut W, case: &TestCaseResult) -> io::Result<()> {
        writeln!(
            out,
            "{} {}::{} ({:.2?})",
            outcome_label(case.outcome),
            case.class_name,
            case.test_name,
            case.duration
        )
    }

    fn write_totals<W: Write>(&self, out: &mut W, suite: &TestSuiteResult) -> io::Result<()> {
        let summary = suite.summary();

        writeln!(out, "{}", "─".repeat(50))?;

        let status = if summary.critical > 0 {
            "ERROR".yellow().bold()
        } else if summary.failed > 0 {
            "FAILED".red().bold()
        } else {
            "PASSED".green().bold()
        };

        writeln!(
            out,
            "Test result: {} | {} total, {} passed, {} failed, {} critical",
            status,
            summary.total.to_string().bold(),
            summary.passed.to_string().green().bold(),
            if summary.failed > 0 {
                summary.failed.to_string().red().bold()
            } else {
                summary.failed.to_string().normal()
            },
            if summary.critical > 0 {
                summary.critical.to_string().yellow().bold()
            } else {
                summary.critical.to_string().normal()
            }
        )?;
        writeln!(out, "Time: {:.2?}", suite.elapsed())
    }

    fn write_failures<W: Write>(&self, out: &mut W, suite: &TestSuiteResult) -> io::Result<()> {
        let failures: Vec<_> = suite
            .test_cases
            .iter()
            .filter(|case| case.outcome != TestOutcome::Pass)
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "{}", "Failures:".red().bold())?;
        writeln!(out)?;

        for case in failures {
            let bullet = match case.outcome {
                TestOutcome::CriticalError => "●".yellow(),
                _ => "●".red(),
            };
            writeln!(out, "  {} {}", bullet, case.class_name)?;
            writeln!(out, "    {}", case.test_name.bold())?;
            for line in case.message.lines() {
                writeln!(out, "      {}", line.dimmed())?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

fn outcome_label(outcome: TestOutcome) -> ColoredString {
    match outcome {
        TestOutcome::Pass => "PASS".green().bold(),
        TestOutcome::Fail => "FAIL".red().bold(),
        TestOutcome::CriticalError => "CRITICAL".yellow().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    fn sample_suite() -> TestSuiteResult {
        let mut suite = TestSuiteResult::start();
        suite.push(TestCaseResult::passed("adds", "bank::math", Duration::from_millis(4)));
        suite.push(TestCaseResult::failed(
            "divides",
            "bank::math",
            Duration::from_millis(1),
            "division by zero\nat line 3",
        ));
        suite.push(TestCaseResult::critical(
            "opens",
            "bank::Vault",
            "Failed to create instance of bank::Vault: key missing",
        ));
        suite.finish()
    }

    fn render(reporter: ConsoleReporter, suite: &TestSuiteResult) -> String {
        let mut out = Vec::new();
        reporter.with_no_color(true).write_to(&mut out, suite).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    #[serial(color)]
    fn test_per_case_lines() {
        let text = render(ConsoleReporter::new(true), &sample_suite());

        assert!(text.contains("PASS bank::math::adds"));
        assert!(text.contains("FAIL bank::math::divides"));
        assert!(text.contains("CRITICAL bank::Vault::opens"));
    }

    #[test]
    #[serial(color)]
    fn test_quiet_keeps_totals_and_failures() {
        let text = render(ConsoleReporter::new(false), &sample_suite());

        assert!(!text.contains("PASS bank::math::adds"));
        assert!(text.contains("Test result: ERROR | 3 total, 1 passed, 1 failed, 1 critical"));
        assert!(text.contains("Failures:"));
        assert!(text.contains("      division by zero\n      at line 3"));
        assert!(text.contains("key missing"));
    }

    #[test]
    #[serial(color)]
    fn test_clean_run_has_no_failure_section() {
        let mut suite = TestSuiteResult::start();
        suite.push(TestCaseResult::passed("adds", "bank::math", Duration::ZERO));

        let text = render(ConsoleReporter::default(), &suite.finish());

        assert!(text.contains("Test result: PASSED | 1 total, 1 passed, 0 failed, 0 critical"));
        assert!(!text.contains("Failures:"));
    }
}
