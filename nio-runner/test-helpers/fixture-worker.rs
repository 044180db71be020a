// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A sandbox worker with a fixed set of fixture tests, used by the integration tests.
//!
//! The fixtures cover every classification: a test that pollutes its own static state, one
//! that alternates between passing and failing, one that always fails, one that always
//! passes and one that checks the environment was cleared. Two more tests print to standard
//! output, which the worker also uses for protocol messages.

use nio_metadata::NioInspectorExitCode;
use nio_runner::sandbox::worker::{SandboxContext, TestRegistry, serve};
use std::{
    process::exit,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

static POLLUTED: AtomicBool = AtomicBool::new(false);
static ALTERNATING_CALLS: AtomicU32 = AtomicU32::new(0);

fn main() {
    let context = match SandboxContext::from_env() {
        Ok(context) => context,
        Err(error) => {
            eprintln!("[fixture-worker] {error}");
            exit(NioInspectorExitCode::SANDBOX_ERROR);
        }
    };

    let mut registry = TestRegistry::new();
    registry
        .register(
            "fixtures.PollutingTest",
            "registryStartsEmpty",
            registry_starts_empty,
        )
        .register("fixtures.AlternatingTest", "flips", flips)
        .register("fixtures.AlwaysFailingTest", "fails", fails)
        .register("fixtures.StableTest", "passes", passes)
        .register("fixtures.EnvironmentTest", "pathIsUnset", path_is_unset)
        .register("fixtures.ChattyTest", "printsLines", prints_lines)
        .register("fixtures.ChattyTest", "printsPartialLine", prints_partial_line);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(error) = serve(&context, &registry, stdin.lock(), stdout.lock()) {
        eprintln!("[fixture-worker] error serving requests: {error}");
        exit(1);
    }
}

// Passes once per process, then fails because it left the registry dirty.
fn registry_starts_empty() -> Result<(), String> {
    if POLLUTED.swap(true, Ordering::SeqCst) {
        return Err("expected the registry to be empty".to_owned());
    }
    Ok(())
}

// Passes on even calls and fails on odd ones.
fn flips() -> Result<(), String> {
    let call = ALTERNATING_CALLS.fetch_add(1, Ordering::SeqCst);
    if call % 2 == 1 {
        return Err(format!("call {call} was odd"));
    }
    Ok(())
}

fn fails() -> Result<(), String> {
    let total: u32 = [1, 1].iter().sum();
    assert_eq!(total, 3, "sum was wrong");
    Ok(())
}

fn passes() -> Result<(), String> {
    Ok(())
}

fn path_is_unset() -> Result<(), String> {
    match std::env::var_os("PATH") {
        Some(path) => Err(format!("PATH leaked into the sandbox: {}", path.to_string_lossy())),
        None => Ok(()),
    }
}

fn prints_lines() -> Result<(), String> {
    println!("hello from a test");
    println!("{{\"type\":\"plan-finished\",\"run-index\":0}}");
    Ok(())
}

// Leaves a partial line in front of the next protocol message.
fn prints_partial_line() -> Result<(), String> {
    print!("no newline here");
    Ok(())
}
