//! In-process stand-in for a loaded module

use crate::loader::{LoadError, TestModule};
use harness_abi::{ConstructorFn, DestructorFn, ModuleManifest, TestFn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub(crate) struct FakeModule {
    path: PathBuf,
    manifest: String,
    tests: HashMap<String, TestFn>,
    constructors: HashMap<String, ConstructorFn>,
    destructors: HashMap<String, DestructorFn>,
}

impl FakeModule {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            manifest: "{}".to_string(),
            tests: HashMap::new(),
            constructors: HashMap::new(),
            destructors: HashMap::new(),
        }
    }

    pub(crate) fn with_manifest(self, manifest: &ModuleManifest) -> Self {
        let json = serde_json::to_string(manifest).unwrap();
        self.with_manifest_json(&json)
    }

    pub(crate) fn with_manifest_json(mut self, json: &str) -> Self {
        self.manifest = json.to_string();
        self
    }

    pub(crate) fn with_test(mut self, symbol: &str, entry: TestFn) -> Self {
        self.tests.insert(symbol.to_string(), entry);
        self
    }

    pub(crate) fn with_constructor(mut self, symbol: &str, entry: ConstructorFn) -> Self {
        self.constructors.insert(symbol.to_string(), entry);
        self
    }

    pub(crate) fn with_destructor(mut self, symbol: &str, entry: DestructorFn) -> Self {
        self.destructors.insert(symbol.to_string(), entry);
        self
    }

    fn missing(&self, symbol: &str) -> LoadError {
        LoadError::SymbolNotFound {
            path: self.path.clone(),
            symbol: symbol.to_string(),
        }
    }
}

impl TestModule for FakeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn manifest_json(&self) -> &str {
        &self.manifest
    }

    fn test_entry(&self, symbol: &str) -> Result<TestFn, LoadError> {
        self.tests.get(symbol).copied().ok_or_else(|| self.missing(symbol))
    }

    fn constructor(&self, symbol: &str) -> Result<ConstructorFn, LoadError> {
        self.constructors
            .get(symbol)
            .copied()
            .ok_or_else(|| self.missing(symbol))
    }

    fn destructor(&self, symbol: &str) -> Result<DestructorFn, LoadError> {
        self.destructors
            .get(symbol)
            .copied()
            .ok_or_else(|| self.missing(symbol))
    }
}
