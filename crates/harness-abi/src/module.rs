//! Module-side helpers
//!
//! Test modules wrap every body with these so that nothing unwinds across the
//! `extern "C"` boundary. A panic is caught and its payload text becomes the
//! failure message; the host never sees the unwinding machinery, only the
//! original cause.

use crate::ffi::{
    OutcomeSink, PendingCall, RawInvocation, Status, CONSTRUCT_FAILED, CONSTRUCT_OK,
};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::ffi::c_void;
use std::fmt::Display;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;

/// Return types a test body may have
pub trait TestReturn {
    /// `None` when the body succeeded, otherwise the failure description
    fn into_failure(self) -> Option<String>;
}

impl TestReturn for () {
    fn into_failure(self) -> Option<String> {
        None
    }
}

impl<E: Display> TestReturn for Result<(), E> {
    fn into_failure(self) -> Option<String> {
        self.err().map(|e| e.to_string())
    }
}

enum Verdict {
    Completed,
    Failed {
        message: String,
        trace: Option<String>,
    },
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

static PANIC_HOOK: Once = Once::new();

/// Record the panic location (and backtrace, when enabled) for the failing
/// thread while a wrapped body runs; any other panic goes to the previous hook
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CAPTURING.with(Cell::get) {
                previous(info);
                return;
            }
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let backtrace = Backtrace::capture();
            let trace = if backtrace.status() == BacktraceStatus::Captured {
                format!("panicked at {}\n{}", location, backtrace)
            } else {
                format!("panicked at {}", location)
            };
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

/// Run `body` with panics captured instead of printed
fn capturing<T>(body: impl FnOnce() -> T) -> std::thread::Result<T> {
    install_panic_hook();
    let outer = CAPTURING.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(body));
    CAPTURING.with(|flag| flag.set(outer));
    result
}

/// Text carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "test panicked with a non-string payload".to_string()
    }
}

fn settle<R, F>(body: F) -> Verdict
where
    R: TestReturn,
    F: FnOnce() -> R,
{
    take_panic_trace();

    match capturing(body) {
        Ok(returned) => match returned.into_failure() {
            None => Verdict::Completed,
            Some(message) => Verdict::Failed {
                message,
                trace: None,
            },
        },
        Err(payload) => Verdict::Failed {
            message: panic_message(payload.as_ref()),
            trace: take_panic_trace(),
        },
    }
}

unsafe fn deliver(sink: *const OutcomeSink, verdict: Verdict) {
    let Some(sink) = sink.as_ref() else {
        return;
    };
    match verdict {
        Verdict::Completed => sink.send(Status::Completed, "", None),
        Verdict::Failed { message, trace } => sink.send(Status::Failed, &message, trace.as_deref()),
    }
}

/// Report an infrastructure fault that is not the test body's doing
///
/// # Safety
///
/// `sink` must be null or the sink the host passed to the current call.
pub unsafe fn report_fault(sink: *const OutcomeSink, message: &str) {
    if let Some(sink) = sink.as_ref() {
        sink.send(Status::Fault, message, None);
    }
}

/// Run a blocking body and report its outcome immediately
///
/// # Safety
///
/// `sink` must be null or the sink the host passed to the current call.
pub unsafe fn run_sync<R, F>(sink: *const OutcomeSink, body: F) -> RawInvocation
where
    R: TestReturn,
    F: FnOnce() -> R,
{
    let verdict = settle(body);
    deliver(sink, verdict);
    RawInvocation::immediate()
}

/// Run a blocking body against the instance the host constructed
///
/// # Safety
///
/// `instance` must be null or a pointer produced by [`construct`] for `T`;
/// `sink` as for [`run_sync`].
pub unsafe fn run_method<T, R, F>(instance: *mut c_void, sink: *const OutcomeSink, body: F) -> RawInvocation
where
    R: TestReturn,
    F: FnOnce(&mut T) -> R,
{
    let Some(this) = (instance as *mut T).as_mut() else {
        report_fault(sink, "instance method called without an instance");
        return RawInvocation::immediate();
    };
    run_sync(sink, move || body(this))
}

type PendingBody = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Hand an asynchronous body back to the host without running it
///
/// The host later calls the returned `wait` on a blocking thread; the future is
/// driven to completion there.
pub fn run_pending<F>(body: F) -> RawInvocation
where
    F: Future + Send + 'static,
    F::Output: TestReturn,
{
    let pending: PendingBody = Box::pin(async move {
        match body.await.into_failure() {
            None => Ok(()),
            Some(message) => Err(message),
        }
    });
    let data = Box::into_raw(Box::new(pending)) as *mut c_void;

    RawInvocation::pending(PendingCall {
        data,
        wait: Some(wait_pending),
    })
}

unsafe extern "C" fn wait_pending(data: *mut c_void, sink: *const OutcomeSink) {
    if data.is_null() {
        report_fault(sink, "pending test body was already consumed");
        return;
    }
    let body = Box::from_raw(data as *mut PendingBody);
    let verdict = settle(move || futures::executor::block_on(*body));
    deliver(sink, verdict);
}

/// Construct an instance with `make`, reporting a fault on failure
///
/// # Safety
///
/// `out` must be null or writable; `sink` as for [`run_sync`].
pub unsafe fn construct<T, E, F>(out: *mut *mut c_void, sink: *const OutcomeSink, make: F) -> u32
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let failure = match capturing(make) {
        Ok(Ok(instance)) if !out.is_null() => {
            *out = Box::into_raw(Box::new(instance)) as *mut c_void;
            None
        }
        Ok(Ok(_)) => Some("constructor called without an output slot".to_string()),
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    match failure {
        None => CONSTRUCT_OK,
        Some(message) => {
            report_fault(sink, &message);
            CONSTRUCT_FAILED
        }
    }
}

/// Construct `T` through its `Default` impl
///
/// # Safety
///
/// As for [`construct`].
pub unsafe fn construct_default<T: Default>(out: *mut *mut c_void, sink: *const OutcomeSink) -> u32 {
    construct(out, sink, || Ok::<T, Infallible>(T::default()))
}

/// Drop an instance produced by [`construct`]
///
/// # Safety
///
/// `instance` must be null or a pointer produced by [`construct`] for `T`,
/// not yet destroyed.
pub unsafe fn destroy<T>(instance: *mut c_void) {
    if instance.is_null() {
        return;
    }
    let boxed = Box::from_raw(instance as *mut T);
    let _ = panic::catch_unwind(AssertUnwindSafe(move || drop(boxed)));
}

/// Export a static test entry point
#[macro_export]
macro_rules! export_test {
    ($symbol:ident, $body:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            _instance: *mut ::std::ffi::c_void,
            sink: *const $crate::OutcomeSink,
        ) -> $crate::RawInvocation {
            $crate::run_sync(sink, $body)
        }
    };
}

/// Export a static entry point whose body is a future
#[macro_export]
macro_rules! export_async_test {
    ($symbol:ident, $future:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            _instance: *mut ::std::ffi::c_void,
            _sink: *const $crate::OutcomeSink,
        ) -> $crate::RawInvocation {
            $crate::run_pending($future)
        }
    };
}

/// Export an instance-method entry point
#[macro_export]
macro_rules! export_method {
    ($symbol:ident, $ty:ty, $body:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            instance: *mut ::std::ffi::c_void,
            sink: *const $crate::OutcomeSink,
        ) -> $crate::RawInvocation {
            $crate::run_method::<$ty, _, _>(instance, sink, $body)
        }
    };
}

/// Export a constructor, through `Default` or a fallible closure
#[macro_export]
macro_rules! export_constructor {
    ($symbol:ident, $ty:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            out: *mut *mut ::std::ffi::c_void,
            sink: *const $crate::OutcomeSink,
        ) -> u32 {
            $crate::construct_default::<$ty>(out, sink)
        }
    };
    ($symbol:ident, $ty:ty, $make:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            out: *mut *mut ::std::ffi::c_void,
            sink: *const $crate::OutcomeSink,
        ) -> u32 {
            $crate::construct::<$ty, _, _>(out, sink, $make)
        }
    };
}

/// Export a destructor for instances of `$ty`
#[macro_export]
macro_rules! export_destructor {
    ($symbol:ident, $ty:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(instance: *mut ::std::ffi::c_void) {
            $crate::destroy::<$ty>(instance)
        }
    };
}
