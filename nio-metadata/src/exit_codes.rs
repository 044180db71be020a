// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `nio-inspector` failures.
///
/// Flaky tests being found is not a failure: the rerun command exits with [`Self::OK`] and the
/// results are in the run log. The codes below document expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum NioInspectorExitCode {}

impl NioInspectorExitCode {
    /// No errors occurred and nio-inspector exited normally.
    pub const OK: i32 = 0;

    /// No test classes were found to run, and `--fail-on-empty` was passed.
    pub const NO_TESTS_RUN: i32 = 4;

    /// The sandbox could not be constructed, or sandboxed code was started outside a sandbox.
    pub const SANDBOX_ERROR: i32 = 70;

    /// A user issue happened while setting up an invocation: a bad config file, a missing run
    /// log, or a missing source root.
    pub const SETUP_ERROR: i32 = 96;

    /// The test launcher could not be constructed, or it died in the middle of a run.
    pub const LAUNCH_FAILED: i32 = 101;

    /// Writing the run log or evidence artifacts produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
