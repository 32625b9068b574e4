//! Isolated module loading
//!
//! Every test module gets its own [`IsolationContext`]. The context opens the
//! module with local symbol binding, preloads the libraries it links against
//! from its own directory, resolves its declared dependencies from that
//! directory first, and closes everything when dropped.

mod context;
mod linked;
mod resolver;

pub use context::IsolationContext;
pub use linked::LinkedNames;
pub use resolver::DependencyResolver;

use harness_abi::{ConstructorFn, DestructorFn, TestFn};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Module loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Test module not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Symbol '{symbol}' not found in {path}")]
    SymbolNotFound { path: PathBuf, symbol: String },

    #[error("Unreadable manifest in {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Dependency '{dependency}' of {path} not found in {searched} search path(s)")]
    DependencyNotFound {
        path: PathBuf,
        dependency: String,
        searched: usize,
    },
}

/// A loaded module, as the discoverer and executor see it
///
/// Function pointers handed out stay valid for as long as the module itself
/// is alive.
pub trait TestModule {
    /// Where the module was loaded from
    fn path(&self) -> &Path;

    /// Raw manifest JSON, as published by the module
    fn manifest_json(&self) -> &str;

    /// Look up a test entry point
    fn test_entry(&self, symbol: &str) -> Result<TestFn, LoadError>;

    /// Look up an instance constructor
    fn constructor(&self, symbol: &str) -> Result<ConstructorFn, LoadError>;

    /// Look up an instance destructor
    fn destructor(&self, symbol: &str) -> Result<DestructorFn, LoadError>;

    /// Display name used in logs
    fn display_name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().display().to_string())
    }
}
