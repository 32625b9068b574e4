//! Test discovery
//!
//! A method is a test case when its manifest entry carries a marker from the
//! allow-list below. Markers are compared by their fully-qualified name only,
//! so the harness never links against the frameworks that define them.
//!
//! The manifest is decoded piece by piece: one malformed group or method is
//! logged and skipped without hiding the rest of the module.

use crate::loader::TestModule;
use harness_abi::{MethodEntry, Receiver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Framework family a marker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerFamily {
    Libtest,
    Rstest,
}

impl fmt::Display for MarkerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerFamily::Libtest => write!(f, "libtest"),
            MarkerFamily::Rstest => write!(f, "rstest"),
        }
    }
}

/// What a recognized marker says about the method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// A plain test
    Test,
    /// A test fed with data cases
    Parameterized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizedMarker {
    pub name: &'static str,
    pub family: MarkerFamily,
    pub kind: MarkerKind,
}

/// The marker allow-list
pub const RECOGNIZED_MARKERS: &[RecognizedMarker] = &[
    RecognizedMarker {
        name: "core::prelude::v1::test",
        family: MarkerFamily::Libtest,
        kind: MarkerKind::Test,
    },
    RecognizedMarker {
        name: "test_case::test_case",
        family: MarkerFamily::Libtest,
        kind: MarkerKind::Parameterized,
    },
    RecognizedMarker {
        name: "rstest::rstest",
        family: MarkerFamily::Rstest,
        kind: MarkerKind::Test,
    },
    RecognizedMarker {
        name: "rstest::case",
        family: MarkerFamily::Rstest,
        kind: MarkerKind::Parameterized,
    },
];

/// Look a single marker name up in the allow-list
pub fn classify_marker(name: &str) -> Option<&'static RecognizedMarker> {
    RECOGNIZED_MARKERS.iter().find(|marker| marker.name == name)
}

/// First allow-listed marker among `markers`, in attachment order
pub fn first_recognized<S: AsRef<str>>(markers: &[S]) -> Option<&'static RecognizedMarker> {
    markers.iter().find_map(|m| classify_marker(m.as_ref()))
}

/// A method found to be a test case
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredCase {
    pub module: PathBuf,
    pub type_name: String,
    pub constructor: Option<String>,
    pub destructor: Option<String>,
    pub method: MethodEntry,
    pub marker: &'static RecognizedMarker,
}

impl DiscoveredCase {
    pub fn test_name(&self) -> &str {
        &self.method.name
    }

    pub fn class_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_parameterized(&self) -> bool {
        self.method.is_parameterized()
    }

    pub fn needs_instance(&self) -> bool {
        self.method.receiver == Receiver::Instance
    }

    pub fn listing(&self) -> CaseListing {
        CaseListing {
            module: self.module.clone(),
            class_name: self.type_name.clone(),
            test_name: self.method.name.clone(),
            family: self.marker.family,
            kind: self.marker.kind,
            parameterized: self.is_parameterized(),
        }
    }
}

/// Printable view of a discovered case
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaseListing {
    pub module: PathBuf,
    pub class_name: String,
    pub test_name: String,
    pub family: MarkerFamily,
    pub kind: MarkerKind,
    pub parameterized: bool,
}

/// A group entry, with methods left undecoded
#[derive(Deserialize)]
struct GroupShell {
    name: String,
    #[serde(default)]
    constructor: Option<String>,
    #[serde(default)]
    destructor: Option<String>,
    #[serde(default)]
    load_error: Option<String>,
    #[serde(default)]
    methods: Vec<Value>,
}

/// Every test case the module declares, in declaration order
pub fn discover_module(module: &dyn TestModule) -> Vec<DiscoveredCase> {
    let module_name = module.display_name();

    let manifest: Value = match serde_json::from_str(module.manifest_json()) {
        Ok(value) => value,
        Err(e) => {
            warn!(module = %module_name, error = %e, "Manifest is not valid JSON, no tests discovered");
            return Vec::new();
        }
    };

    let Some(groups) = manifest.get("types").and_then(Value::as_array) else {
        debug!(module = %module_name, "Manifest declares no types");
        return Vec::new();
    };

    let mut cases = Vec::new();
    for (index, raw) in groups.iter().enumerate() {
        let group: GroupShell = match serde_json::from_value(raw.clone()) {
            Ok(group) => group,
            Err(e) => {
                warn!(module = %module_name, index, error = %e, "Skipping undecodable type entry");
                continue;
            }
        };
        if let Some(reason) = &group.load_error {
            warn!(module = %module_name, type_name = %group.name, reason = %reason, "Skipping type that failed to load");
            continue;
        }

        for raw_method in &group.methods {
            let method: MethodEntry = match serde_json::from_value(raw_method.clone()) {
                Ok(method) => method,
                Err(e) => {
                    warn!(module = %module_name, type_name = %group.name, error = %e, "Skipping undecodable method entry");
                    continue;
                }
            };
            if let Some(marker) = first_recognized(&method.markers) {
                cases.push(DiscoveredCase {
                    module: module.path().to_path_buf(),
                    type_name: group.name.clone(),
                    constructor: group.constructor.clone(),
                    destructor: group.destructor.clone(),
                    method,
                    marker,
                });
            }
        }
    }

    debug!(module = %module_name, count = cases.len(), "Discovered test cases");
    cases
}
