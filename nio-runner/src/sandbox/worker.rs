// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker half of the sandbox protocol.
//!
//! A worker is a separate program started by [`SandboxBuilder`](super::SandboxBuilder). This
//! module provides everything a Rust-hosted worker needs: a guard that refuses to run outside a
//! sandbox, a registry of test functions, and the request/response loop.

use crate::errors::SandboxError;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use nio_metadata::protocol::{
    ExecutionFinished, ExecutionStatus, FailureDetail, MESSAGE_PREFIX, PROTOCOL_VERSION,
    SANDBOX_CLASSPATH_ENV, SANDBOX_TOKEN_ENV, SandboxRequest, SandboxResponse, TestSelector,
    UnresolvedClass,
};
use std::{
    cell::{Cell, RefCell},
    env,
    io::{BufRead, Write},
    panic::{self, PanicHookInfo},
    sync::Once,
};
use tracing::warn;

/// Proof that the current process was started inside a sandbox.
#[derive(Clone, Debug)]
pub struct SandboxContext {
    token: String,
    classpath: Vec<Utf8PathBuf>,
}

impl SandboxContext {
    /// Reads the sandbox context from the environment.
    ///
    /// Fails with [`SandboxError::NotInSandbox`] if this process was not started by a
    /// [`SandboxBuilder`](super::SandboxBuilder). Tests must never run in that case: results from
    /// an ambient, possibly polluted process are meaningless.
    pub fn from_env() -> Result<Self, SandboxError> {
        let token = env::var(SANDBOX_TOKEN_ENV).map_err(|_| SandboxError::NotInSandbox {
            env_var: SANDBOX_TOKEN_ENV,
        })?;
        let classpath = env::var_os(SANDBOX_CLASSPATH_ENV)
            .map(|value| {
                env::split_paths(&value)
                    .filter_map(|path| Utf8PathBuf::try_from(path).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { token, classpath })
    }

    /// Returns the classpath entries this worker may load from.
    pub fn classpath(&self) -> &[Utf8PathBuf] {
        &self.classpath
    }
}

/// A test function. Tests fail by returning `Err` or by panicking.
pub type TestFn = fn() -> Result<(), String>;

#[derive(Clone, Debug)]
struct RegisteredTest {
    method_name: String,
    run: TestFn,
}

/// The set of test classes and methods a worker can run.
#[derive(Clone, Debug, Default)]
pub struct TestRegistry {
    classes: IndexMap<String, Vec<RegisteredTest>>,
}

impl TestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a test method. Methods of a class run in registration order.
    pub fn register(
        &mut self,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        run: TestFn,
    ) -> &mut Self {
        self.classes
            .entry(class_name.into())
            .or_default()
            .push(RegisteredTest {
                method_name: method_name.into(),
                run,
            });
        self
    }

    fn contains_class(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    fn tests_for<'a>(&'a self, selector: &TestSelector) -> Vec<&'a RegisteredTest> {
        let Some(tests) = self.classes.get(selector.class_name()) else {
            return Vec::new();
        };
        match selector {
            TestSelector::Class { .. } => tests.iter().collect(),
            TestSelector::Method { method_name, .. } => tests
                .iter()
                .filter(|test| &test.method_name == method_name)
                .collect(),
        }
    }
}

/// Serves requests from `input` until a shutdown request or end of input.
///
/// Tests may print to the same stream as `output`: responses carry
/// [`MESSAGE_PREFIX`] so the orchestrator can tell them apart.
pub fn serve(
    context: &SandboxContext,
    registry: &TestRegistry,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<(), SandboxError> {
    send(
        &mut output,
        &SandboxResponse::Hello {
            protocol_version: PROTOCOL_VERSION,
            token: context.token.clone(),
            pid: std::process::id(),
        },
    )?;

    install_panic_hook();
    serve_requests(registry, input, &mut output)
}

fn serve_requests(
    registry: &TestRegistry,
    input: impl BufRead,
    output: &mut impl Write,
) -> Result<(), SandboxError> {
    for line in input.lines() {
        let line = line.map_err(SandboxError::Io)?;
        if line.trim().is_empty() {
            continue;
        }
        let request: SandboxRequest =
            serde_json::from_str(&line).map_err(|error| SandboxError::Protocol {
                line: line.clone(),
                error,
            })?;
        match request {
            SandboxRequest::Resolve { class_names } => {
                let (resolved, unresolved): (Vec<_>, Vec<_>) = class_names
                    .into_iter()
                    .partition(|class_name| registry.contains_class(class_name));
                let unresolved = unresolved
                    .into_iter()
                    .map(|class_name| UnresolvedClass {
                        class_name,
                        reason: "class not found on the sandbox classpath".to_owned(),
                    })
                    .collect();
                send(
                    output,
                    &SandboxResponse::Resolved {
                        resolved,
                        unresolved,
                    },
                )?;
            }
            SandboxRequest::Execute {
                run_index,
                selectors,
            } => {
                send(output, &SandboxResponse::PlanStarted { run_index })?;
                for selector in &selectors {
                    let tests = registry.tests_for(selector);
                    if tests.is_empty() {
                        warn!("no tests match selector {selector:?}");
                    }
                    for test in tests {
                        let event = run_test(selector.class_name(), test);
                        send(output, &SandboxResponse::ExecutionFinished(event))?;
                    }
                }
                send(output, &SandboxResponse::PlanFinished { run_index })?;
            }
            SandboxRequest::Shutdown => return Ok(()),
        }
    }
    Ok(())
}

fn send(output: &mut impl Write, response: &SandboxResponse) -> Result<(), SandboxError> {
    let line = serde_json::to_string(response).map_err(|error| SandboxError::Protocol {
        line: format!("{response:?}"),
        error,
    })?;
    // A test may have left a partial line; the prefix is found mid-line in that case.
    writeln!(output, "{MESSAGE_PREFIX}{line}").map_err(SandboxError::Io)?;
    output.flush().map_err(SandboxError::Io)
}

struct PanicRecord {
    message: String,
    file: Option<String>,
    line: Option<u32>,
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

static INSTALL_PANIC_HOOK: Once = Once::new();

/// Installs a panic hook that records panics raised by tests instead of printing them. Panics
/// outside a test go to the previously installed hook.
fn install_panic_hook() {
    INSTALL_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                record_panic(info);
            } else {
                previous(info);
            }
        }));
    });
}

fn record_panic(info: &PanicHookInfo<'_>) {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_owned());
    let (file, line) = match info.location() {
        Some(location) => (
            Utf8Path::new(location.file())
                .file_name()
                .map(ToOwned::to_owned),
            Some(location.line()),
        ),
        None => (None, None),
    };
    LAST_PANIC.with(|last| {
        *last.borrow_mut() = Some(PanicRecord {
            message,
            file,
            line,
        })
    });
}

fn run_test(class_name: &str, test: &RegisteredTest) -> ExecutionFinished {
    let unique_id = format!(
        "[engine:nio-sandbox]/[class:{class_name}]/[method:{}()]",
        test.method_name
    );
    let display_name = format!("{}()", test.method_name);
    let frame_prefix = format!("\tat {class_name}.{}", test.method_name);

    CAPTURING.with(|capturing| capturing.set(true));
    let result = panic::catch_unwind(test.run);
    CAPTURING.with(|capturing| capturing.set(false));

    let (status, failure) = match result {
        Ok(Ok(())) => (ExecutionStatus::Successful, None),
        Ok(Err(message)) => {
            let stack_trace = format!("test failed: {message}\n{frame_prefix}(Unknown Source)");
            (
                ExecutionStatus::Failed,
                Some(FailureDetail {
                    message: Some(message),
                    stack_trace: Some(stack_trace),
                }),
            )
        }
        Err(_) => {
            let record = LAST_PANIC.with(|last| last.borrow_mut().take());
            let (message, frame) = match record {
                Some(PanicRecord {
                    message,
                    file: Some(file),
                    line: Some(line),
                }) => (message, format!("{frame_prefix}({file}:{line})")),
                Some(PanicRecord { message, .. }) => {
                    (message, format!("{frame_prefix}(Unknown Source)"))
                }
                None => (
                    "test panicked".to_owned(),
                    format!("{frame_prefix}(Unknown Source)"),
                ),
            };
            (
                ExecutionStatus::Failed,
                Some(FailureDetail {
                    stack_trace: Some(format!("test panicked: {message}\n{frame}")),
                    message: Some(message),
                }),
            )
        }
    };

    ExecutionFinished {
        unique_id,
        display_name,
        status,
        failure,
    }
}
