// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical test identities.
//!
//! Test frameworks report executions under native unique IDs that carry engine, runner and
//! parameter decoration, for example
//! `[engine:junit-jupiter]/[class:com.example.FooTest]/[method:testBar()]`. This module maps
//! those IDs to a stable `suite#case` identity so the same test lines up across runs.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A canonical `suite#case` test identity.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestIdentity {
    suite: String,
    case: String,
}

impl TestIdentity {
    /// Creates a new identity.
    ///
    /// Returns `None` if either part is empty or contains `#` or whitespace.
    pub fn new(suite: impl Into<String>, case: impl Into<String>) -> Option<Self> {
        let suite = suite.into();
        let case = case.into();
        (is_valid_part(&suite) && is_valid_part(&case)).then_some(Self { suite, case })
    }

    /// Returns the fully-qualified suite (class) name.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Returns the case (method) name.
    pub fn case(&self) -> &str {
        &self.case
    }

    /// Returns the suite name without its package, keeping nested class names.
    pub fn simple_suite_name(&self) -> &str {
        self.suite.rsplit('.').next().unwrap_or(&self.suite)
    }

    /// Returns the suite's top-level class name, without package or nested classes.
    pub fn top_level_class_name(&self) -> &str {
        let simple = self.simple_suite_name();
        simple.split('$').next().unwrap_or(simple)
    }

    /// Returns the name of the per-test evidence directory: `suite.case`.
    pub fn dir_name(&self) -> String {
        format!("{}.{}", self.suite, self.case)
    }

    /// Returns the path of the suite's source file, relative to a source root.
    ///
    /// Nested classes live in their top-level class's file.
    pub fn source_relative_path(&self) -> Utf8PathBuf {
        let top_level = self.suite.split('$').next().unwrap_or(&self.suite);
        let mut path: Utf8PathBuf = top_level.split('.').collect();
        path.set_extension("java");
        path
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty() && !part.contains('#') && !part.contains(char::is_whitespace)
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.suite, self.case)
    }
}

/// An error returned when a string is not of the form `suite#case`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseTestIdentityError(String);

impl fmt::Display for ParseTestIdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not of the form `suite#case`", self.0)
    }
}

impl std::error::Error for ParseTestIdentityError {}

impl FromStr for TestIdentity {
    type Err = ParseTestIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (suite, case) = s
            .split_once('#')
            .ok_or_else(|| ParseTestIdentityError(s.to_owned()))?;
        Self::new(suite, case).ok_or_else(|| ParseTestIdentityError(s.to_owned()))
    }
}

impl TryFrom<String> for TestIdentity {
    type Error = ParseTestIdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TestIdentity> for String {
    fn from(value: TestIdentity) -> Self {
        value.to_string()
    }
}

/// The result of normalizing a native unique ID.
///
/// Normalization is total: every native ID yields either an identity or the unparsable sentinel.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TestKey {
    /// The ID was normalized to a canonical identity.
    Identity(TestIdentity),

    /// The ID could not be normalized. The raw native ID is kept for display.
    Unparsable(String),
}

impl TestKey {
    /// Normalizes a native unique ID.
    pub fn from_native(unique_id: &str) -> Self {
        match normalize(unique_id) {
            Some(identity) => Self::Identity(identity),
            None => Self::Unparsable(unique_id.to_owned()),
        }
    }

    /// Returns the identity, if the ID could be normalized.
    pub fn identity(&self) -> Option<&TestIdentity> {
        match self {
            Self::Identity(identity) => Some(identity),
            Self::Unparsable(_) => None,
        }
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(identity) => write!(f, "{identity}"),
            Self::Unparsable(raw) => write!(f, "{raw}"),
        }
    }
}

fn normalize(unique_id: &str) -> Option<TestIdentity> {
    let unique_id = unique_id.trim();
    if !unique_id.starts_with('[') {
        return unique_id.parse().ok();
    }

    let segments = parse_segments(unique_id)?;

    // JUnit 4 style: [test:method(fully.qualified.Class)]
    if let Some((_, value)) = segments
        .iter()
        .rev()
        .find(|(kind, value)| *kind == "test" && value.contains('('))
    {
        let open = value.find('(')?;
        let suite = value[open + 1..].strip_suffix(')')?;
        let case = strip_decoration(&value[..open]);
        return TestIdentity::new(suite, case);
    }

    // JUnit 5 style: [class:C], optionally [nested-class:N], then a method-like segment.
    let mut suite: Option<String> = None;
    let mut case = None;
    for (kind, value) in &segments {
        match *kind {
            "class" => suite = Some((*value).to_owned()),
            "nested-class" => {
                let outer = suite.as_mut()?;
                outer.push('$');
                outer.push_str(value);
            }
            "method" | "test-template" | "test-factory" => {
                case = Some(strip_decoration(value));
            }
            _ => {}
        }
    }
    TestIdentity::new(suite?, case?)
}

/// Strips a parameter list or parameterized-run index from a method name.
fn strip_decoration(method: &str) -> &str {
    let end = method.find(['(', '[']).unwrap_or(method.len());
    &method[..end]
}

/// Splits `[kind:value]/[kind:value]` into pairs. Values may contain balanced brackets, as in
/// `[method:m(int[])]`.
fn parse_segments(unique_id: &str) -> Option<Vec<(&str, &str)>> {
    let mut segments = Vec::new();
    let mut rest = unique_id;
    loop {
        let body = rest.strip_prefix('[')?;
        let colon = body.find(':')?;
        let kind = &body[..colon];
        let value_start = colon + 1;

        let mut depth = 0usize;
        let mut end = None;
        for (index, c) in body[value_start..].char_indices() {
            match c {
                '[' => depth += 1,
                ']' if depth == 0 => {
                    end = Some(value_start + index);
                    break;
                }
                ']' => depth -= 1,
                _ => {}
            }
        }
        let end = end?;
        segments.push((kind, &body[value_start..end]));

        rest = &body[end + 1..];
        if rest.is_empty() {
            return Some(segments);
        }
        rest = rest.strip_prefix('/')?;
    }
}
