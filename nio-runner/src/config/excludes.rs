// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ConfigParseErrorKind;
use camino::Utf8Path;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Glob patterns for test sources that should not be run.
///
/// Patterns are matched against the path of a test's source file relative to the test source
/// directory, so `**/*IT.java` excludes every class whose name ends in `IT`.
#[derive(Clone, Debug)]
pub struct ExcludeMatcher {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExcludeMatcher {
    /// Compiles the given patterns.
    pub fn new(
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|error| ConfigParseErrorKind::InvalidExcludeGlob {
                    pattern: pattern.clone(),
                    error,
                })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::InvalidExcludeGlob {
                pattern: patterns.join(", "),
                error,
            })?;
        Ok(Self { patterns, set })
    }

    /// Returns the patterns this matcher was built from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if the relative source path matches any pattern.
    pub fn is_excluded(&self, relative_source: &Utf8Path) -> bool {
        self.set.is_match(relative_source.as_std_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("com/example/FooIT.java", true; "integration test excluded")]
    #[test_case("FooIT.java", true; "top level integration test excluded")]
    #[test_case("com/example/FooTest.java", false; "unit test kept")]
    #[test_case("com/example/slow/BarTest.java", true; "directory pattern")]
    fn matches(path: &str, expected: bool) {
        let matcher =
            ExcludeMatcher::new(["**/*IT.java", "**/slow/**"]).expect("patterns compile");
        assert_eq!(matcher.is_excluded(Utf8Path::new(path)), expected);
    }

    #[test]
    fn invalid_pattern() {
        let error = ExcludeMatcher::new(["a/[b"]).expect_err("unclosed class is invalid");
        assert!(matches!(
            error,
            ConfigParseErrorKind::InvalidExcludeGlob { pattern, .. } if pattern == "a/[b"
        ));
    }
}
