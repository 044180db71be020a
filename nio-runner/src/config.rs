// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for nio-inspector.
//!
//! Configuration is read from the defaults embedded in this crate, overlaid with
//! `.config/nio-inspector.toml` in the project root.

mod excludes;
mod imp;
mod sandbox_command;

pub use excludes::*;
pub use imp::*;
pub use sandbox_command::*;
