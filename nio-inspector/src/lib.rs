// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finds tests whose outcome depends on state left behind by an earlier execution in the same
//! process, and collects the evidence needed to fix them.
//!
//! This crate is the command-line front end. The logic lives in `nio-runner`.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, Styles};
