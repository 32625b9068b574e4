//! JSON report output

use crate::model::TestSuiteResult;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes a finished suite as indented JSON
#[derive(Debug, Clone)]
pub struct JsonReportGenerator {
    path: PathBuf,
}

impl JsonReportGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render without writing
    pub fn render(suite: &TestSuiteResult) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(suite)?)
    }

    /// Write the report, creating missing parent directories
    pub fn write(&self, suite: &TestSuiteResult) -> Result<(), ReportError> {
        let json = Self::render(suite)?;
        let io_error = |source| ReportError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&self.path, json).map_err(io_error)?;

        info!(path = %self.path.display(), "Report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestCaseResult;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("nested").join("results.json");
        let mut suite = TestSuiteResult::start();
        suite.push(TestCaseResult::passed("adds", "math", Duration::from_millis(3)));
        let suite = suite.finish();

        JsonReportGenerator::new(&path).write(&suite).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"StartedAt\""));
        let decoded: TestSuiteResult = serde_json::from_str(&written).unwrap();
        assert_eq!(decoded, suite);
    }

    #[test]
    fn test_write_into_a_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let result = JsonReportGenerator::new(blocker.join("report.json")).write(&TestSuiteResult::start());

        assert!(matches!(result, Err(ReportError::Io { .. })));
    }
}
