//! Module locator
//!
//! Turns configuration into a list of candidate module paths. Nothing here
//! fails: unusable entries are logged and dropped.

use crate::glob::GlobPattern;
use harness_config::{module_extension, HarnessSettings};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which existing files a search path may name directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectFiles {
    /// Only files with this extension (compared case-insensitively)
    WithExtension(String),
    /// Any existing file
    Any,
}

/// Resolves candidate module paths
#[derive(Debug, Clone)]
pub struct ModuleLocator {
    modules: Vec<PathBuf>,
    search_paths: Vec<PathBuf>,
    pattern: String,
    direct: DirectFiles,
}

impl ModuleLocator {
    /// A locator for shared-library modules with the given scan pattern
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            modules: Vec::new(),
            search_paths: Vec::new(),
            pattern: pattern.into(),
            direct: DirectFiles::WithExtension(module_extension().to_string()),
        }
    }

    /// A locator configured from resolved settings
    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self::new(settings.effective_pattern())
            .with_modules(settings.modules.clone())
            .with_search_paths(settings.search_paths.clone())
    }

    pub fn with_modules(mut self, modules: Vec<PathBuf>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_search_paths(mut self, search_paths: Vec<PathBuf>) -> Self {
        self.search_paths = search_paths;
        self
    }

    pub fn with_direct_files(mut self, direct: DirectFiles) -> Self {
        self.direct = direct;
        self
    }

    /// Candidate paths, absolute and deduplicated, first occurrence winning
    pub fn locate(&self) -> Vec<PathBuf> {
        let candidates = if !self.modules.is_empty() {
            self.explicit_modules()
        } else if !self.search_paths.is_empty() {
            self.scan_search_paths()
        } else {
            warn!("No test modules or search paths configured");
            Vec::new()
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    fn explicit_modules(&self) -> Vec<PathBuf> {
        let found: Vec<PathBuf> = self
            .modules
            .iter()
            .filter_map(|entry| {
                let path = absolutize(entry);
                if path.is_file() {
                    Some(path)
                } else {
                    warn!(path = %path.display(), "Test module not found, skipping");
                    None
                }
            })
            .collect();

        if found.is_empty() {
            warn!("None of the configured test modules exist");
        }
        found
    }

    fn scan_search_paths(&self) -> Vec<PathBuf> {
        let glob = match GlobPattern::new(&self.pattern) {
            Ok(glob) => glob,
            Err(e) => {
                warn!(pattern = %self.pattern, error = %e, "Unusable module pattern");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for entry in &self.search_paths {
            let path = absolutize(entry);
            if path.is_file() {
                if self.accepts_direct(&path) {
                    found.push(path);
                } else {
                    warn!(path = %path.display(), "Search path is not a test module, skipping");
                }
            } else if path.is_dir() {
                found.extend(scan_directory(&path, &glob));
            } else {
                warn!(path = %path.display(), "Search path does not exist, skipping");
            }
        }
        found
    }

    fn accepts_direct(&self, path: &Path) -> bool {
        match &self.direct {
            DirectFiles::Any => true,
            DirectFiles::WithExtension(wanted) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted)),
        }
    }
}

/// Files directly inside `dir` whose names match `glob`, sorted by name
fn scan_directory(dir: &Path, glob: &GlobPattern) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to enumerate search path entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if glob.matches(&name) {
            debug!(path = %entry.path().display(), "Matched test module");
            found.push(entry.into_path());
        }
    }

    found
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
