// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that run fixture tests in a real sandbox worker.

mod fixtures;
mod pipeline;
mod rerun;
mod sandbox;
