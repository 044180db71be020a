// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reducing a test class to the one test method that failed.
//!
//! The reduced source keeps everything from the `package` declaration onwards (fields, setup
//! methods, helpers and nested classes) except imports, comments and the other test methods.

use crate::{
    errors::TestReductionError,
    helpers::split_lines,
    java::{BraceTracker, java_files},
    test_id::TestIdentity,
};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::{collections::BTreeSet, sync::LazyLock};

static EXTENDS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+\w+(?:\s*<[^{]*?>)?\s+extends\s+([\w.]+)")
        .expect("extends pattern is valid")
});

/// Annotations that mark a method as a test.
const TEST_ANNOTATIONS: &[&str] = &[
    "Test",
    "ParameterizedTest",
    "RepeatedTest",
    "TestFactory",
    "TestTemplate",
];

/// Returns the reduced source of `test`, looked up under `test_source_dir`.
///
/// If the test class does not declare the method itself and extends another class, the parent's
/// source is searched for by file name and reduced instead.
pub fn reduce_test(
    test_source_dir: &Utf8Path,
    test: &TestIdentity,
) -> Result<String, TestReductionError> {
    let mut path = test_source_dir.join(test.source_relative_path());
    if !path.is_file() {
        return Err(TestReductionError::TestFileNotFound { path });
    }

    let mut visited = BTreeSet::new();
    loop {
        let source = std::fs::read_to_string(&path).map_err(|error| {
            TestReductionError::ReadFile {
                path: path.clone(),
                error,
            }
        })?;
        visited.insert(path);

        let reduction = reduce_source(&source, test.case());
        if reduction.found {
            return Ok(reduction.into_text());
        }
        let not_found = || TestReductionError::MethodNotFound {
            method: test.case().to_owned(),
            suite: test.suite().to_owned(),
        };
        let Some(parent) = reduction.parent else {
            return Err(not_found());
        };
        let parent_path = find_class_file(test_source_dir, &parent).ok_or_else(|| {
            TestReductionError::ParentNotFound {
                parent: parent.clone(),
                test_source_dir: test_source_dir.to_owned(),
            }
        })?;
        if visited.contains(&parent_path) {
            return Err(not_found());
        }
        path = parent_path;
    }
}

fn find_class_file(root: &Utf8Path, simple_name: &str) -> Option<Utf8PathBuf> {
    let file_name = format!("{simple_name}.java");
    java_files(root)
        .into_iter()
        .find(|path| path.file_name() == Some(file_name.as_str()))
}

#[derive(Debug, Default)]
struct SourceReduction<'a> {
    lines: Vec<&'a str>,
    found: bool,
    // Simple name of the class the first class declaration extends.
    parent: Option<String>,
}

impl SourceReduction<'_> {
    fn into_text(self) -> String {
        let mut text = String::new();
        for line in self.lines.into_iter().filter(|line| !line.trim().is_empty()) {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

fn reduce_source<'a>(source: &'a str, method: &str) -> SourceReduction<'a> {
    let mut reduction = SourceReduction::default();
    let mut lines = split_lines(source);
    let mut package_seen = false;
    let mut in_comment = false;
    // Annotation lines seen since the last declaration.
    let mut pending: Vec<&str> = Vec::new();
    let mut pending_is_test = false;

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.starts_with("package ") {
            package_seen = true;
        }
        if reduction.parent.is_none()
            && let Some(captures) = EXTENDS_REGEX.captures(line)
        {
            let parent = &captures[1];
            reduction.parent = Some(parent.rsplit('.').next().unwrap_or(parent).to_owned());
        }

        if is_comment_line(trimmed, &mut in_comment) {
            continue;
        }

        if trimmed.starts_with('@') {
            let annotations = LeadingAnnotations::parse(trimmed);
            pending_is_test |= annotations.is_test();
            if annotations.rest.is_empty() {
                pending.push(line);
                let mut depth = annotations.open_parens;
                while depth > 0
                    && let Some(next) = lines.next()
                {
                    pending.push(next);
                    depth = paren_depth(next, depth);
                }
                continue;
            }
        }

        if !pending_is_test {
            if package_seen {
                reduction.lines.append(&mut pending);
                if !trimmed.starts_with("import ") {
                    reduction.lines.push(line);
                }
            }
            pending.clear();
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        // The declaration of a test method: either the one we want or a sibling.
        let mut tracker = BraceTracker::new();
        let mut member = vec![line];
        let mut done = tracker.feed(line) || (!tracker.opened() && trimmed.ends_with(';'));
        while !done && let Some(next) = lines.next() {
            member.push(next);
            done = tracker.feed(next);
        }
        if !reduction.found && declares_method(line, method) {
            reduction.found = true;
            reduction.lines.append(&mut pending);
            let mut in_body_comment = false;
            reduction.lines.extend(
                member
                    .into_iter()
                    .filter(|line| !is_comment_line(line.trim(), &mut in_body_comment)),
            );
        }
        pending.clear();
        pending_is_test = false;
    }

    reduction
}

/// Returns true if `trimmed` is entirely comment, tracking block comments across lines.
fn is_comment_line(trimmed: &str, in_comment: &mut bool) -> bool {
    if *in_comment {
        *in_comment = !trimmed.contains("*/");
        return true;
    }
    if trimmed.starts_with("//") {
        return true;
    }
    if trimmed.starts_with("/*") {
        *in_comment = !trimmed.contains("*/");
        return true;
    }
    false
}

/// Returns true if `line` contains `method` as a whole word followed by `(`.
fn declares_method(line: &str, method: &str) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    line.match_indices(method).any(|(start, _)| {
        let before_ok = !line[..start].chars().next_back().is_some_and(is_ident);
        let after = line[start + method.len()..].trim_start();
        before_ok && after.starts_with('(')
    })
}

/// The annotations a line starts with.
#[derive(Debug)]
struct LeadingAnnotations<'a> {
    names: Vec<&'a str>,
    // What follows the annotations on the same line.
    rest: &'a str,
    // Parentheses left open at the end of the line by a multi-line annotation argument.
    open_parens: usize,
}

impl<'a> LeadingAnnotations<'a> {
    fn parse(line: &'a str) -> Self {
        let mut names = Vec::new();
        let mut rest = line.trim_start();
        while let Some(after_at) = rest.strip_prefix('@') {
            let name_len = after_at
                .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '$' | '.')))
                .unwrap_or(after_at.len());
            names.push(&after_at[..name_len]);
            rest = after_at[name_len..].trim_start();
            if rest.starts_with('(') {
                let depth = paren_depth(rest, 0);
                if depth > 0 {
                    return Self {
                        names,
                        rest: "",
                        open_parens: depth,
                    };
                }
                rest = rest[closing_paren(rest) + 1..].trim_start();
            }
        }
        Self {
            names,
            rest,
            open_parens: 0,
        }
    }

    fn is_test(&self) -> bool {
        self.names.iter().any(|name| {
            let simple = name.rsplit('.').next().unwrap_or(name);
            TEST_ANNOTATIONS.contains(&simple)
        })
    }
}

/// Returns the parenthesis depth after `text`, starting from `depth`. String literals are
/// skipped.
fn paren_depth(text: &str, mut depth: usize) -> usize {
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Returns the byte index of the parenthesis closing the one `text` starts with.
fn closing_paren(text: &str) -> usize {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return index;
                }
            }
            _ => {}
        }
    }
    text.len().saturating_sub(1)
}
