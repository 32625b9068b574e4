//! Module manifest schema
//!
//! The manifest is the module's marker metadata: which groups it declares,
//! which methods each group has, and the marker names attached to every method.
//! The host matches markers by name only and never links against whatever
//! framework defined them.

use serde::{Deserialize, Serialize};
use std::ffi::CString;

/// Top-level manifest returned by `harness_manifest`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModuleManifest {
    /// Human-readable module name
    pub name: String,

    /// Shared libraries the module needs, resolved from the module's own
    /// directory before the ambient search path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Declared groups, in declaration order
    #[serde(default)]
    pub types: Vec<TypeEntry>,
}

/// A group of methods (the declaring type)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TypeEntry {
    /// Fully-qualified group name
    pub name: String,

    /// Symbol of the instance constructor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<String>,

    /// Symbol of the instance destructor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructor: Option<String>,

    /// Set by the module when this group could not be described
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,

    /// Methods in declaration order
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

/// A single method and its markers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodEntry {
    pub name: String,

    /// Exported entry point symbol
    pub symbol: String,

    /// Fully-qualified marker names, in attachment order
    #[serde(default)]
    pub markers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterEntry>,

    #[serde(default)]
    pub receiver: Receiver,
}

/// A declared parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Whether a method needs an instance of its declaring type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Receiver {
    #[default]
    Static,
    Instance,
}

impl ModuleManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn with_type(mut self, entry: TypeEntry) -> Self {
        self.types.push(entry);
        self
    }
}

impl TypeEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn constructor(mut self, symbol: impl Into<String>) -> Self {
        self.constructor = Some(symbol.into());
        self
    }

    pub fn destructor(mut self, symbol: impl Into<String>) -> Self {
        self.destructor = Some(symbol.into());
        self
    }

    pub fn load_error(mut self, reason: impl Into<String>) -> Self {
        self.load_error = Some(reason.into());
        self
    }

    pub fn with_method(mut self, method: MethodEntry) -> Self {
        self.methods.push(method);
        self
    }
}

impl MethodEntry {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            markers: Vec::new(),
            parameters: Vec::new(),
            receiver: Receiver::Static,
        }
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.parameters.push(ParameterEntry {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn instance(mut self) -> Self {
        self.receiver = Receiver::Instance;
        self
    }

    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }
}

/// Encode a manifest for `harness_manifest`
///
/// Falls back to an empty string if the JSON contains an interior NUL, which
/// the host then reports as an unreadable manifest.
pub fn encode(manifest: &ModuleManifest) -> CString {
    serde_json::to_string(manifest)
        .ok()
        .and_then(|json| CString::new(json).ok())
        .unwrap_or_default()
}

/// Export `harness_manifest` returning the given manifest expression
///
/// The expression is evaluated once, on first call.
#[macro_export]
macro_rules! export_manifest {
    ($manifest:expr) => {
        #[no_mangle]
        pub extern "C" fn harness_manifest() -> *const ::std::os::raw::c_char {
            static MANIFEST: ::std::sync::OnceLock<::std::ffi::CString> =
                ::std::sync::OnceLock::new();
            MANIFEST
                .get_or_init(|| $crate::manifest::encode(&$manifest))
                .as_ptr()
        }
    };
}
