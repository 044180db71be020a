// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to nio-inspector's machine-readable contracts.
//!
//! This crate holds:
//!
//! * [`protocol`]: messages exchanged with a sandbox worker over its standard streams.
//! * [`run_record`]: the per-invocation structured run records (`rerun-results.jsonl`).
//! * [`NioInspectorExitCode`]: exit codes returned by the `nio-inspector` binary.

mod exit_codes;
pub mod protocol;
pub mod run_record;

pub use exit_codes::*;
