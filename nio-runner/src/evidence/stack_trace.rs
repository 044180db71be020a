// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::helpers::split_lines;
use regex::Regex;

/// A frame of a stack trace that points into a test suite's own source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BugFrame {
    /// The method the frame is in. Lambdas carry `$` in their names.
    pub method: String,

    /// The source file name reported by the frame.
    pub file_name: String,

    /// The 1-based line number.
    pub line_number: usize,
}

/// Finds the first frame of `trace` of the form `at <suite>.<method>(<file>:<line>)`.
pub fn bug_frame(trace: &str, suite: &str) -> Option<BugFrame> {
    let pattern = format!(
        r"\s+at\s+{}\.([\w$]+)\(([^():\s]+):(\d+)\)",
        regex::escape(suite)
    );
    // The suite name is escaped, so the pattern always compiles.
    let regex = Regex::new(&pattern).ok()?;
    let captures = regex.captures(trace)?;
    Some(BugFrame {
        method: captures[1].to_owned(),
        file_name: captures[2].to_owned(),
        line_number: captures[3].parse().ok()?,
    })
}

/// Returns the 1-based line `line_number` of `source`, or `None` if there is no such line.
pub fn physical_line(source: &str, line_number: usize) -> Option<&str> {
    split_lines(source).nth(line_number.checked_sub(1)?)
}
