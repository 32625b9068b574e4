//! Outcome and result model
//!
//! Rows are created once per case and never modified afterwards; the suite only
//! grows by appending and is finalized exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of a single case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestOutcome {
    /// Completed without the body signaling failure
    Pass,
    /// The body signaled failure, or the case was skipped or not executed
    Fail,
    /// The harness could not run the case
    CriticalError,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Pass => write!(f, "PASS"),
            TestOutcome::Fail => write!(f, "FAIL"),
            TestOutcome::CriticalError => write!(f, "CRITICAL_ERROR"),
        }
    }
}

/// One row of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestCaseResult {
    pub test_name: String,
    pub class_name: String,
    #[serde(with = "timespan")]
    pub duration: Duration,
    pub outcome: TestOutcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl TestCaseResult {
    pub fn passed(test_name: impl Into<String>, class_name: impl Into<String>, duration: Duration) -> Self {
        Self {
            test_name: test_name.into(),
            class_name: class_name.into(),
            duration,
            outcome: TestOutcome::Pass,
            message: String::new(),
            stack_trace: None,
        }
    }

    pub fn failed(
        test_name: impl Into<String>,
        class_name: impl Into<String>,
        duration: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            class_name: class_name.into(),
            duration,
            outcome: TestOutcome::Fail,
            message: message.into(),
            stack_trace: None,
        }
    }

    /// A case the harness could not run; it never executed, so duration is zero
    pub fn critical(
        test_name: impl Into<String>,
        class_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            class_name: class_name.into(),
            duration: Duration::ZERO,
            outcome: TestOutcome::CriticalError,
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Attach a trace; blank traces are dropped
    pub fn with_stack_trace(mut self, trace: Option<String>) -> Self {
        self.stack_trace = trace.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Counts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub critical: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} passed, {} failed, {} critical",
            self.total, self.passed, self.failed, self.critical
        )
    }
}

/// The whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub test_cases: Vec<TestCaseResult>,
}

impl TestSuiteResult {
    /// Begin a run now
    pub fn start() -> Self {
        Self::started_at(Utc::now())
    }

    /// Begin a run at a given instant
    pub fn started_at(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            test_cases: Vec::new(),
        }
    }

    pub fn push(&mut self, case: TestCaseResult) {
        self.test_cases.push(case);
    }

    pub fn extend(&mut self, cases: impl IntoIterator<Item = TestCaseResult>) {
        self.test_cases.extend(cases);
    }

    /// Finalize now
    pub fn finish(self) -> Self {
        self.finished_at(Utc::now())
    }

    /// Finalize at a given instant, clamped so the run never ends before it began
    pub fn finished_at(mut self, at: DateTime<Utc>) -> Self {
        self.finished_at = at.max(self.started_at);
        self
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.test_cases.len(),
            ..Default::default()
        };
        for case in &self.test_cases {
            match case.outcome {
                TestOutcome::Pass => summary.passed += 1,
                TestOutcome::Fail => summary.failed += 1,
                TestOutcome::CriticalError => summary.critical += 1,
            }
        }
        summary
    }

    pub fn has_critical(&self) -> bool {
        self.test_cases
            .iter()
            .any(|c| c.outcome == TestOutcome::CriticalError)
    }

    pub fn has_failures(&self) -> bool {
        self.test_cases.iter().any(|c| c.outcome == TestOutcome::Fail)
    }

    /// Process exit code: 2 on any critical error, else 1 on any failure, else 0
    pub fn exit_code(&self) -> u8 {
        if self.has_critical() {
            2
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Wall-clock length of the run
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// `Duration` as a `[d.]hh:mm:ss[.fffffff]` time-span string
///
/// Seven fractional digits count 100ns ticks; the fraction is omitted when it
/// is zero.
pub mod timespan {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    const NANOS_PER_TICK: u32 = 100;
    const SECS_PER_DAY: u64 = 86_400;

    pub fn format(duration: Duration) -> String {
        let total = duration.as_secs();
        let days = total / SECS_PER_DAY;
        let hours = (total % SECS_PER_DAY) / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        let ticks = duration.subsec_nanos() / NANOS_PER_TICK;

        let mut text = String::new();
        if days > 0 {
            text.push_str(&format!("{}.", days));
        }
        text.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
        if ticks > 0 {
            text.push_str(&format!(".{:07}", ticks));
        }
        text
    }

    pub fn parse(text: &str) -> Option<Duration> {
        let (clock, fraction) = match text.split_once('.') {
            // A dot before the first colon separates days
            Some((days, rest)) if !days.contains(':') => {
                let days: u64 = days.parse().ok()?;
                let duration = parse(rest)?;
                return Some(duration + Duration::from_secs(days * SECS_PER_DAY));
            }
            Some((clock, fraction)) => (clock, Some(fraction)),
            None => (text, None),
        };

        let mut parts = clock.split(':');
        let hours: u64 = parts.next()?.parse().ok()?;
        let minutes: u64 = parts.next()?.parse().ok()?;
        let seconds: u64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
            return None;
        }

        let nanos = match fraction {
            Some(digits)
                if !digits.is_empty()
                    && digits.len() <= 7
                    && digits.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let ticks: u32 = format!("{:0<7}", digits).parse().ok()?;
                ticks * NANOS_PER_TICK
            }
            Some(_) => return None,
            None => 0,
        };

        Some(Duration::new(hours * 3600 + minutes * 60 + seconds, nanos))
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| de::Error::custom(format!("invalid time span '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::ZERO, "00:00:00")]
    #[case(Duration::from_millis(1500), "00:00:01.5000000")]
    #[case(Duration::from_nanos(250), "00:00:00.0000002")]
    #[case(Duration::from_secs(3 * 3600 + 25 * 60 + 7), "03:25:07")]
    #[case(Duration::from_secs(86_400 + 3600), "1.01:00:00")]
    fn test_timespan_format(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(timespan::format(duration), expected);
    }

    #[rstest]
    #[case("00:00:00.25", Duration::from_millis(250))]
    #[case("2.00:00:01", Duration::from_secs(2 * 86_400 + 1))]
    fn test_timespan_parse(#[case] text: &str, #[case] expected: Duration) {
        assert_eq!(timespan::parse(text), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("00:61:00")]
    #[case("00:00:00.12345678")]
    #[case("1:2")]
    fn test_timespan_rejects_malformed(#[case] text: &str) {
        assert_eq!(timespan::parse(text), None);
    }

    #[test]
    fn test_outcome_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&TestOutcome::CriticalError).unwrap(),
            "\"CRITICAL_ERROR\""
        );
        assert_eq!(TestOutcome::Pass.to_string(), "PASS");
    }

    #[test]
    fn test_case_serializes_pascal_case_without_empty_trace() {
        let case = TestCaseResult::passed("adds", "math::tests", Duration::from_millis(2));
        let json = serde_json::to_value(&case).unwrap();

        assert_eq!(json["TestName"], "adds");
        assert_eq!(json["ClassName"], "math::tests");
        assert_eq!(json["Duration"], "00:00:00.0020000");
        assert_eq!(json["Outcome"], "PASS");
        assert_eq!(json["Message"], "");
        assert!(json.get("StackTrace").is_none());
    }

    #[test]
    fn test_blank_stack_trace_is_dropped() {
        let case = TestCaseResult::failed("t", "c", Duration::ZERO, "boom")
            .with_stack_trace(Some("  ".to_string()));
        assert_eq!(case.stack_trace, None);
    }

    #[test]
    fn test_critical_has_zero_duration() {
        let case = TestCaseResult::critical("t", "c", "no instance");
        assert_eq!(case.duration, Duration::ZERO);
        assert_eq!(case.outcome, TestOutcome::CriticalError);
    }

    #[test]
    fn test_finish_clamps_backwards_clock() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 11, 59, 0).unwrap();

        let suite = TestSuiteResult::started_at(start).finished_at(earlier);

        assert_eq!(suite.finished_at, start);
        assert_eq!(suite.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_exit_code_precedence() {
        let mut suite = TestSuiteResult::start();
        assert_eq!(suite.exit_code(), 0);

        suite.push(TestCaseResult::passed("a", "c", Duration::ZERO));
        assert_eq!(suite.exit_code(), 0);

        suite.push(TestCaseResult::failed("b", "c", Duration::ZERO, "no"));
        assert_eq!(suite.exit_code(), 1);

        suite.push(TestCaseResult::critical("d", "c", "broken"));
        assert_eq!(suite.exit_code(), 2);

        assert_eq!(
            suite.summary(),
            RunSummary {
                total: 3,
                passed: 1,
                failed: 1,
                critical: 1
            }
        );
    }

    #[test]
    fn test_suite_json_shape() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut suite = TestSuiteResult::started_at(start);
        suite.push(TestCaseResult::critical("t", "c", "boom"));
        let suite = suite.finished_at(start);

        let json = serde_json::to_value(&suite).unwrap();
        assert_eq!(json["StartedAt"], "2026-03-01T12:00:00Z");
        assert_eq!(json["TestCases"][0]["Outcome"], "CRITICAL_ERROR");
    }

    proptest::proptest! {
        #[test]
        fn prop_timespan_keeps_tick_precision(secs in 0u64..400_000, ticks in 0u32..10_000_000) {
            let duration = Duration::new(secs, ticks * 100);
            proptest::prop_assert_eq!(timespan::parse(&timespan::format(duration)), Some(duration));
        }
    }
}
