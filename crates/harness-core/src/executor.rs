//! Test execution
//!
//! Each discovered case produces exactly one [`TestCaseResult`]. The module
//! reports outcomes through a host-owned sink instead of unwinding, so timing
//! and recording always happen no matter how the body ends.

use crate::discovery::DiscoveredCase;
use crate::loader::TestModule;
use crate::model::{TestCaseResult, TestOutcome};
use harness_abi::ffi::{CONSTRUCT_OK, INVOCATION_IMMEDIATE, INVOCATION_PENDING};
use harness_abi::{OutcomeSink, PendingCall, Status, StrRef};
use std::ffi::c_void;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Message for cases that declare parameters
pub const PARAMETERIZED_MESSAGE: &str = "Parameterized tests are not executed by this runner.";

/// Prefix for instantiation failures
pub const INSTANCE_FAILURE_PREFIX: &str = "Failed to create test class instance: ";

/// What the module reported for one call
#[derive(Debug)]
struct Reported {
    status: u32,
    message: String,
    trace: Option<String>,
}

/// Receives the first outcome reported for a call
#[derive(Debug, Default)]
struct Collector {
    reported: Option<Reported>,
}

unsafe extern "C" fn collect(ctx: *mut c_void, status: u32, message: StrRef, trace: StrRef) {
    let Some(collector) = (ctx as *mut Collector).as_mut() else {
        return;
    };
    if collector.reported.is_some() {
        return;
    }
    collector.reported = Some(Reported {
        status,
        message: message.to_string_lossy(),
        trace: (!trace.is_empty()).then(|| trace.to_string_lossy()),
    });
}

impl Collector {
    fn boxed() -> Box<Self> {
        Box::default()
    }

    /// A sink writing into this collector; valid while the collector is alive
    fn sink(&mut self) -> OutcomeSink {
        OutcomeSink {
            ctx: self as *mut Collector as *mut c_void,
            report: collect,
        }
    }
}

/// A pending body moved onto the blocking pool together with its collector
struct PendingWait {
    call: PendingCall,
    collector: Box<Collector>,
}

// The module hands the pending body over for the host to wait on from any
// thread; the collector is only touched by whoever owns this value.
unsafe impl Send for PendingWait {}

impl PendingWait {
    fn wait(mut self) -> Box<Collector> {
        if let Some(wait) = self.call.wait {
            let sink = self.collector.sink();
            unsafe { wait(self.call.data, &sink) };
        }
        self.collector
    }
}

/// How a single invocation settled
enum Settled {
    Reported(Option<Reported>),
    TimedOut(Duration),
    Critical(String),
}

/// An instance created for one instance-method case
struct Instance<'m> {
    ptr: *mut c_void,
    destructor: Option<harness_abi::DestructorFn>,
    module: &'m dyn TestModule,
}

impl Instance<'_> {
    fn release(self) {
        if let Some(destroy) = self.destructor {
            unsafe { destroy(self.ptr) };
        } else {
            debug!(module = %self.module.display_name(), "No destructor declared, instance not released");
        }
    }
}

/// Runs discovered cases one at a time
#[derive(Debug, Default)]
pub struct TestExecutor {
    async_timeout: Option<Duration>,
    abandoned: Vec<PathBuf>,
}

impl TestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on a pending body after `timeout`
    pub fn with_async_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Modules with a body still running after a timeout
    ///
    /// Their code may execute at any later point, so they must stay loaded.
    pub fn abandoned_modules(&self) -> &[PathBuf] {
        &self.abandoned
    }

    /// Run every case in order
    pub async fn execute_all(
        &mut self,
        module: &dyn TestModule,
        cases: &[DiscoveredCase],
    ) -> Vec<TestCaseResult> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.execute(module, case).await);
        }
        results
    }

    /// Run one case and classify it
    pub async fn execute(&mut self, module: &dyn TestModule, case: &DiscoveredCase) -> TestCaseResult {
        let result = self.run_case(module, case).await;

        match result.outcome {
            TestOutcome::CriticalError => error!(
                test = %case.test_name(),
                class = %case.class_name(),
                reason = %result.message,
                "Test could not be run"
            ),
            outcome => debug!(
                test = %case.test_name(),
                class = %case.class_name(),
                %outcome,
                duration_ms = result.duration.as_millis() as u64,
                "Test finished"
            ),
        }
        result
    }

    async fn run_case(&mut self, module: &dyn TestModule, case: &DiscoveredCase) -> TestCaseResult {
        let test_name = case.test_name();
        let class_name = case.class_name();

        if case.is_parameterized() {
            return TestCaseResult::failed(test_name, class_name, Duration::ZERO, PARAMETERIZED_MESSAGE);
        }

        let entry = match module.test_entry(&case.method.symbol) {
            Ok(entry) => entry,
            Err(e) => return TestCaseResult::critical(test_name, class_name, e.to_string()),
        };

        let instance = if case.needs_instance() {
            match create_instance(module, case) {
                Ok(instance) => Some(instance),
                Err(cause) => {
                    return TestCaseResult::critical(
                        test_name,
                        class_name,
                        format!("{}{}", INSTANCE_FAILURE_PREFIX, cause),
                    )
                }
            }
        } else {
            None
        };
        let instance_ptr = instance.as_ref().map_or(std::ptr::null_mut(), |i| i.ptr);

        let started = Instant::now();
        let mut collector = Collector::boxed();
        let sink = collector.sink();
        let invocation = unsafe { entry(instance_ptr, &sink) };

        let settled = match invocation.kind {
            INVOCATION_IMMEDIATE => Settled::Reported(collector.reported.take()),
            INVOCATION_PENDING if invocation.pending.wait.is_some() => {
                self.await_pending(module, invocation.pending, collector).await
            }
            INVOCATION_PENDING => Settled::Critical("pending invocation has no wait function".to_string()),
            other => Settled::Critical(format!("unknown invocation kind {}", other)),
        };
        let duration = started.elapsed();

        if let Some(instance) = instance {
            if matches!(settled, Settled::TimedOut(_)) {
                warn!(test = %test_name, "Instance kept alive for a body that is still running");
            } else {
                instance.release();
            }
        }

        classify(settled, test_name, class_name, duration)
    }

    async fn await_pending(
        &mut self,
        module: &dyn TestModule,
        call: PendingCall,
        collector: Box<Collector>,
    ) -> Settled {
        let pending = PendingWait { call, collector };
        let handle = tokio::task::spawn_blocking(move || pending.wait());

        let joined = match self.async_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    let path = module.path().to_path_buf();
                    if !self.abandoned.contains(&path) {
                        self.abandoned.push(path);
                    }
                    return Settled::TimedOut(limit);
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(mut collector) => Settled::Reported(collector.reported.take()),
            Err(e) => Settled::Critical(format!("pending test body was lost: {}", e)),
        }
    }
}

fn create_instance<'m>(module: &'m dyn TestModule, case: &DiscoveredCase) -> Result<Instance<'m>, String> {
    let symbol = case
        .constructor
        .as_deref()
        .ok_or_else(|| format!("type '{}' declares no constructor", case.class_name()))?;
    let construct = module.constructor(symbol).map_err(|e| e.to_string())?;

    let destructor = match case.destructor.as_deref() {
        Some(symbol) => match module.destructor(symbol) {
            Ok(destroy) => Some(destroy),
            Err(e) => {
                warn!(error = %e, "Destructor unavailable, instances will not be released");
                None
            }
        },
        None => None,
    };

    let mut collector = Collector::boxed();
    let sink = collector.sink();
    let mut ptr: *mut c_void = std::ptr::null_mut();
    let status = unsafe { construct(&mut ptr, &sink) };

    if status != CONSTRUCT_OK {
        return Err(collector
            .reported
            .take()
            .map(|r| r.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("constructor returned status {}", status)));
    }
    if ptr.is_null() {
        return Err("constructor produced no instance".to_string());
    }

    Ok(Instance {
        ptr,
        destructor,
        module,
    })
}

fn classify(settled: Settled, test_name: &str, class_name: &str, duration: Duration) -> TestCaseResult {
    match settled {
        Settled::Reported(Some(reported)) => match Status::from_raw(reported.status) {
            Some(Status::Completed) => TestCaseResult::passed(test_name, class_name, duration),
            Some(Status::Failed) => TestCaseResult::failed(test_name, class_name, duration, reported.message)
                .with_stack_trace(reported.trace),
            Some(Status::Fault) => TestCaseResult::critical(test_name, class_name, reported.message)
                .with_stack_trace(reported.trace)
                .with_duration(duration),
            None => TestCaseResult::critical(
                test_name,
                class_name,
                format!("unknown outcome status {}", reported.status),
            )
            .with_duration(duration),
        },
        Settled::Reported(None) => {
            TestCaseResult::critical(test_name, class_name, "test reported no outcome").with_duration(duration)
        }
        Settled::TimedOut(limit) => TestCaseResult::critical(
            test_name,
            class_name,
            format!("Test did not complete within {}s", limit.as_secs_f64()),
        )
        .with_duration(duration),
        Settled::Critical(message) => {
            TestCaseResult::critical(test_name, class_name, message).with_duration(duration)
        }
    }
}
