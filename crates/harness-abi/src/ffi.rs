//! Raw `extern "C"` types exchanged between host and module
//!
//! Everything here is `#[repr(C)]` and carries plain integers instead of Rust
//! enums, so a module built by a different compiler version can never hand the
//! host an invalid discriminant.

use std::ffi::c_void;
use std::os::raw::c_char;

/// Name of the exported manifest function
pub const MANIFEST_SYMBOL: &str = "harness_manifest";

/// `harness_manifest`: NUL-terminated UTF-8 JSON, valid while the module is loaded
pub type ManifestFn = unsafe extern "C" fn() -> *const c_char;

/// Instance constructor. Writes the new instance to `out` and returns
/// [`CONSTRUCT_OK`], or reports a failure through `sink` and returns any other
/// value.
pub type ConstructorFn = unsafe extern "C" fn(out: *mut *mut c_void, sink: *const OutcomeSink) -> u32;

/// Instance destructor
pub type DestructorFn = unsafe extern "C" fn(instance: *mut c_void);

/// Test entry point. `instance` is null for static methods.
pub type TestFn = unsafe extern "C" fn(instance: *mut c_void, sink: *const OutcomeSink) -> RawInvocation;

/// Blocks until a pending body settles, reports through `sink`, frees `data`
pub type WaitFn = unsafe extern "C" fn(data: *mut c_void, sink: *const OutcomeSink);

/// Host callback receiving the outcome of a call
pub type ReportFn =
    unsafe extern "C" fn(ctx: *mut c_void, status: u32, message: StrRef, trace: StrRef);

pub const CONSTRUCT_OK: u32 = 0;
pub const CONSTRUCT_FAILED: u32 = 1;

pub const INVOCATION_IMMEDIATE: u32 = 0;
pub const INVOCATION_PENDING: u32 = 1;

/// Outcome status reported through an [`OutcomeSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The body ran to completion
    Completed,
    /// The body signaled failure (assertion, error return, panic)
    Failed,
    /// Something outside the body's logic went wrong
    Fault,
}

impl Status {
    pub fn as_raw(self) -> u32 {
        match self {
            Status::Completed => 0,
            Status::Failed => 1,
            Status::Fault => 2,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Status::Completed),
            1 => Some(Status::Failed),
            2 => Some(Status::Fault),
            _ => None,
        }
    }
}

/// Borrowed UTF-8 bytes, only valid for the duration of the callback
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StrRef {
    pub ptr: *const u8,
    pub len: usize,
}

impl StrRef {
    pub const EMPTY: StrRef = StrRef {
        ptr: std::ptr::null(),
        len: 0,
    };

    pub fn new(text: &str) -> Self {
        Self {
            ptr: text.as_ptr(),
            len: text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    /// Copy the referenced bytes into an owned string, replacing invalid UTF-8
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to `len` readable bytes.
    pub unsafe fn to_string_lossy(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let bytes = std::slice::from_raw_parts(self.ptr, self.len);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Host-owned destination for a call's outcome
#[repr(C)]
pub struct OutcomeSink {
    pub ctx: *mut c_void,
    pub report: ReportFn,
}

impl OutcomeSink {
    /// Deliver an outcome to the host
    ///
    /// # Safety
    ///
    /// The sink must have been provided by the host for the current call.
    pub unsafe fn send(&self, status: Status, message: &str, trace: Option<&str>) {
        let trace = trace.map(StrRef::new).unwrap_or(StrRef::EMPTY);
        (self.report)(self.ctx, status.as_raw(), StrRef::new(message), trace);
    }
}

/// A test body that has not settled yet
#[repr(C)]
#[derive(Debug)]
pub struct PendingCall {
    pub data: *mut c_void,
    pub wait: Option<WaitFn>,
}

impl PendingCall {
    pub const NONE: PendingCall = PendingCall {
        data: std::ptr::null_mut(),
        wait: None,
    };
}

/// What a [`TestFn`] hands back
#[repr(C)]
#[derive(Debug)]
pub struct RawInvocation {
    /// [`INVOCATION_IMMEDIATE`] or [`INVOCATION_PENDING`]
    pub kind: u32,
    /// Only meaningful when `kind` is [`INVOCATION_PENDING`]
    pub pending: PendingCall,
}

impl RawInvocation {
    /// The outcome was already reported through the sink
    pub fn immediate() -> Self {
        Self {
            kind: INVOCATION_IMMEDIATE,
            pending: PendingCall::NONE,
        }
    }

    /// The outcome will be reported when the host waits on `pending`
    pub fn pending(pending: PendingCall) -> Self {
        Self {
            kind: INVOCATION_PENDING,
            pending,
        }
    }
}
