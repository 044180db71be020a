// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removing the output directory.

use crate::errors::CleanError;
use camino::Utf8Path;
use tracing::{info, warn};

/// The result of [`clean_output_dir`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CleanOutcome {
    /// The directory existed and was removed.
    Removed,

    /// There was no directory to remove.
    NotFound,
}

/// Removes `output_dir` and everything in it.
pub fn clean_output_dir(output_dir: &Utf8Path) -> Result<CleanOutcome, CleanError> {
    if !output_dir.is_dir() {
        warn!("output directory {output_dir} does not exist");
        return Ok(CleanOutcome::NotFound);
    }
    std::fs::remove_dir_all(output_dir).map_err(|error| CleanError::new(output_dir, error))?;
    info!("deleted output directory {output_dir}");
    Ok(CleanOutcome::Removed)
}
