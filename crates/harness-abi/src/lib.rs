//! Harness module ABI
//!
//! The contract between the harness host and a test module compiled as a
//! shared library. A module publishes:
//! - `harness_manifest`: a JSON [`ModuleManifest`] describing its test groups,
//!   their methods and the marker names attached to each method
//! - one `extern "C"` entry point per test method ([`TestFn`])
//! - optional constructor/destructor entry points for instance methods
//!
//! Outcomes travel back through a host-owned [`OutcomeSink`]; the host copies
//! every string it receives, so no allocation ever crosses the boundary.
//!
//! # Example
//!
//! ```no_run
//! use harness_abi::{export_manifest, export_test, MethodEntry, ModuleManifest, TypeEntry};
//!
//! export_test!(math_adds, || assert_eq!(2 + 2, 4));
//!
//! export_manifest!(ModuleManifest::new("math.tests").with_type(
//!     TypeEntry::new("math::tests")
//!         .with_method(MethodEntry::new("adds", "math_adds").marker("core::prelude::v1::test")),
//! ));
//! ```

pub mod ffi;
pub mod manifest;
pub mod module;

pub use ffi::{
    ConstructorFn, DestructorFn, ManifestFn, OutcomeSink, PendingCall, RawInvocation, Status,
    StrRef, TestFn, WaitFn, MANIFEST_SYMBOL,
};
pub use manifest::{MethodEntry, ModuleManifest, ParameterEntry, Receiver, TypeEntry};
pub use module::{
    construct, construct_default, destroy, panic_message, report_fault, run_method, run_pending,
    run_sync, TestReturn,
};
