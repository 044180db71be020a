// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for nio-inspector, a detector for tests whose outcome depends on state
//! left behind by earlier executions.
//!
//! The flow of an investigation:
//!
//! 1. [`rerun::RerunEngine`] runs the selected tests once, then reruns them inside the same
//!    [`sandbox::Sandbox`], and classifies every test that passed at first but failed later as
//!    possibly NIO (failed in every rerun) or non-deterministic (failed in some). The runs are
//!    written to a [`run_log::RunLog`].
//! 2. [`evidence::TestInfoCollector`] reads the run log back and writes per-test evidence: stack
//!    traces, the failing test source line, and the test reduced to the failing method.
//! 3. [`relevance::RelevantSourceCollector`] answers a downstream consumer's requests for the
//!    production source most relevant to each test.

pub mod clean;
pub mod config;
pub mod errors;
pub mod evidence;
pub mod helpers;
pub mod java;
pub mod launcher;
pub mod relevance;
pub mod rerun;
pub mod run_log;
pub mod sandbox;
pub mod selection;
pub mod test_id;
pub mod tracker;
