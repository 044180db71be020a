// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for nio-runner.

use camino::Utf8Path;

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "class" if `count` is 1, otherwise "classes".
    pub fn classes_str(count: usize) -> &'static str {
        if count == 1 { "class" } else { "classes" }
    }

    /// Returns "rerun" if `count` is 1, otherwise "reruns".
    pub fn reruns_str(count: usize) -> &'static str {
        if count == 1 { "rerun" } else { "reruns" }
    }

    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }
}

/// Returns the file name of `path` with its extension removed, or the empty string.
pub(crate) fn file_stem(path: &Utf8Path) -> &str {
    path.file_stem().unwrap_or_default()
}

/// Splits text into lines. `\n`, `\r\n` and a lone `\r` all terminate a line, and a trailing
/// terminator does not produce an empty last line.
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
}
