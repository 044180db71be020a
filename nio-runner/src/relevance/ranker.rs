// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::levenshtein::levenshtein;
use crate::{
    config::RelevanceLimits,
    errors::JavaParseError,
    helpers::{file_stem, split_lines},
    java::{DeclarationParser, extract_classes_with_code, extract_methods_with_code, java_files},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use swrite::{SWrite, swriteln};
use tracing::{debug, warn};

/// Declarations found in a set of source roots, in path order.
#[derive(Clone, Debug, Default)]
pub struct SourceCorpus {
    classes: Vec<(String, String)>,
    methods: Vec<(String, String)>,
}

impl SourceCorpus {
    /// Parses every `.java` file under `roots`. Files that fail to parse are skipped with a
    /// warning.
    pub fn load(roots: &[Utf8PathBuf], parser: &dyn DeclarationParser) -> Self {
        let mut corpus = Self::default();
        for path in roots.iter().flat_map(|root| java_files(root)) {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(error) => {
                    warn!("skipping unreadable source file {path}: {error}");
                    continue;
                }
            };
            if let Err(error) = corpus.add_source(&source, parser) {
                warn!("skipping {path}: failed to parse ({error})");
            }
        }
        debug!(
            "loaded {} classes and {} methods",
            corpus.classes.len(),
            corpus.methods.len()
        );
        corpus
    }

    /// Adds the declarations of one source file.
    pub fn add_source(
        &mut self,
        source: &str,
        parser: &dyn DeclarationParser,
    ) -> Result<(), JavaParseError> {
        let unit = parser.parse(source)?;
        self.classes.extend(extract_classes_with_code(source, &unit));
        self.methods.extend(extract_methods_with_code(source, &unit));
        Ok(())
    }
}

/// The kind of declaration an excerpt holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExcerptKind {
    /// A method or constructor, with any overloads.
    Method,

    /// A class, interface, enum, record or annotation type.
    Class,
}

/// The ranked declarations selected for a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selection {
    kind: ExcerptKind,
    exact: bool,
    entries: Vec<(String, String)>,
}

impl Selection {
    /// Returns true if every selected declaration matched the request exactly.
    ///
    /// When nothing matched exactly, the closest declarations are selected instead.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Returns the fully-qualified names of the selected declarations, best first.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Returns true if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ExcerptKind::Method => "method",
            ExcerptKind::Class => "class",
        };
        for (key, code) in &self.entries {
            writeln!(f, "// This is the {kind} code for {key}(): ")?;
            writeln!(f, "{code}")?;
        }
        Ok(())
    }
}

/// Ranks a corpus's declarations by edit distance to requested names.
#[derive(Clone, Debug)]
pub struct RelevanceRanker<'a> {
    corpus: &'a SourceCorpus,
    limits: RelevanceLimits,
}

impl<'a> RelevanceRanker<'a> {
    /// Creates a ranker over `corpus`.
    pub fn new(corpus: &'a SourceCorpus, limits: RelevanceLimits) -> Self {
        Self { corpus, limits }
    }

    /// Selects methods named `class_name.method_name`, compared against the last two segments of
    /// each method's key.
    pub fn methods_in_class(&self, class_name: &str, method_name: &str) -> Selection {
        let request = format!("{class_name}.{method_name}");
        rank(
            ExcerptKind::Method,
            &self.corpus.methods,
            &request,
            class_and_member,
            self.limits.max_methods,
            self.limits.max_methods,
        )
    }

    /// Selects methods named `method_name` in any class.
    pub fn hypothesized_methods(&self, method_name: &str) -> Selection {
        rank(
            ExcerptKind::Method,
            &self.corpus.methods,
            method_name,
            simple_name,
            self.limits.max_methods,
            self.limits.max_methods,
        )
    }

    /// Selects classes with the simple name `class_name`.
    ///
    /// Without an exact match, only the single closest class is selected.
    pub fn classes(&self, class_name: &str) -> Selection {
        rank(
            ExcerptKind::Class,
            &self.corpus.classes,
            class_name,
            simple_name,
            self.limits.max_classes,
            1,
        )
    }
}

fn rank(
    kind: ExcerptKind,
    entries: &[(String, String)],
    request: &str,
    comparable: fn(&str) -> &str,
    max_exact: usize,
    max_closest: usize,
) -> Selection {
    let mut scored: Vec<(usize, &(String, String))> = entries
        .iter()
        .map(|entry| (levenshtein(comparable(&entry.0), request), entry))
        .collect();
    // Stable, so ties keep corpus order.
    scored.sort_by_key(|(distance, _)| *distance);

    let exact = scored.first().is_some_and(|(distance, _)| *distance == 0);
    let selected = if exact {
        scored
            .iter()
            .take_while(|(distance, _)| *distance == 0)
            .take(max_exact)
            .collect::<Vec<_>>()
    } else {
        scored.iter().take(max_closest).collect()
    };
    Selection {
        kind,
        exact,
        entries: selected.into_iter().map(|(_, entry)| (*entry).clone()).collect(),
    }
}

/// `a.b.Foo.bar` -> `bar`
fn simple_name(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

/// `a.b.Foo.bar` -> `Foo.bar`
fn class_and_member(key: &str) -> &str {
    match key.rmatch_indices('.').nth(1) {
        Some((index, _)) => &key[index + 1..],
        None => key,
    }
}

/// Returns the production source file whose name is closest to `test_class_name`.
///
/// A `Test` suffix, then a `TestCase` suffix, is removed from the test class name before
/// comparing. Ties go to the first file in path order.
pub fn most_relevant_file<'f>(
    files: &'f [Utf8PathBuf],
    test_class_name: &str,
) -> Option<&'f Utf8Path> {
    let base = test_class_name.strip_suffix("Test").unwrap_or(test_class_name);
    let base = base.strip_suffix("TestCase").unwrap_or(base);

    let mut best: Option<(usize, &Utf8Path)> = None;
    for file in files {
        let distance = levenshtein(base, file_stem(file));
        if best.is_none_or(|(best_distance, _)| distance < best_distance) {
            best = Some((distance, file.as_path()));
        }
    }
    best.map(|(_, file)| file)
}

/// Returns the first `max_lines` lines of `source`, each terminated by a newline.
pub fn file_prefix(source: &str, max_lines: usize) -> String {
    let mut prefix = String::new();
    for line in split_lines(source).take(max_lines) {
        swriteln!(prefix, "{line}");
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java::JavaDeclarationParser;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn corpus(sources: &[&str]) -> SourceCorpus {
        let mut corpus = SourceCorpus::default();
        for source in sources {
            corpus
                .add_source(source, &JavaDeclarationParser)
                .expect("source parses");
        }
        corpus
    }

    const FOO: &str = indoc! {"
        package test;

        public class Foo {
            public int bar() {
                return 1;
            }

            public int baz() {
                return 2;
            }
        }
    "};

    const OTHER_FOO: &str = indoc! {"
        package other;

        public class Foo {
            public void bar(String s) {}
        }
    "};

    const CACHE: &str = indoc! {"
        package test.cache;

        public class Cache {
            public void reset() {}

            public static class Entry {
                public void reset() {}
            }
        }
    "};

    #[test_case("a.b.Foo.bar", "Foo.bar"; "qualified")]
    #[test_case("Foo.bar", "Foo.bar"; "two segments")]
    #[test_case("bar", "bar"; "one segment")]
    fn class_and_member_segments(key: &str, expected: &str) {
        assert_eq!(class_and_member(key), expected);
    }

    #[test]
    fn exact_method_excludes_near_miss() {
        let corpus = corpus(&[FOO]);
        let selection = RelevanceRanker::new(&corpus, RelevanceLimits::default())
            .methods_in_class("Foo", "bar");
        assert!(selection.is_exact());
        assert_eq!(selection.keys().collect::<Vec<_>>(), vec!["test.Foo.bar"]);
        assert_eq!(
            selection.to_string(),
            "// This is the method code for test.Foo.bar(): \n    \
             public int bar() {\n        return 1;\n    }\n"
        );
    }

    #[test]
    fn exact_ties_across_packages() {
        let corpus = corpus(&[FOO, OTHER_FOO]);
        let selection = RelevanceRanker::new(&corpus, RelevanceLimits::default())
            .methods_in_class("Foo", "bar");
        assert_eq!(
            selection.keys().collect::<Vec<_>>(),
            vec!["test.Foo.bar", "other.Foo.bar"]
        );
    }

    #[test]
    fn closest_methods_without_exact_match() {
        let corpus = corpus(&[FOO, CACHE]);
        let limits = RelevanceLimits {
            max_methods: 2,
            ..RelevanceLimits::default()
        };
        let selection = RelevanceRanker::new(&corpus, limits).methods_in_class("Foo", "bat");
        assert!(!selection.is_exact());
        assert_eq!(
            selection.keys().collect::<Vec<_>>(),
            vec!["test.Foo.bar", "test.Foo.baz"]
        );
    }

    #[test]
    fn hypothesized_methods_match_simple_names() {
        let corpus = corpus(&[FOO, CACHE]);
        let ranker = RelevanceRanker::new(&corpus, RelevanceLimits::default());
        let selection = ranker.hypothesized_methods("reset");
        assert!(selection.is_exact());
        assert_eq!(
            selection.keys().collect::<Vec<_>>(),
            vec!["test.cache.Cache.reset", "test.cache.Cache.Entry.reset"]
        );

        let limits = RelevanceLimits {
            max_methods: 1,
            ..RelevanceLimits::default()
        };
        let selection = RelevanceRanker::new(&corpus, limits).hypothesized_methods("reset");
        assert_eq!(selection.keys().count(), 1);
    }

    #[test]
    fn classes_by_simple_name() {
        let corpus = corpus(&[FOO, OTHER_FOO, CACHE]);
        let ranker = RelevanceRanker::new(&corpus, RelevanceLimits::default());

        let selection = ranker.classes("Entry");
        assert!(selection.is_exact());
        assert_eq!(
            selection.to_string(),
            "// This is the class code for test.cache.Cache.Entry(): \n\
             public static class Entry {\n        public void reset() {}\n    }\n"
        );

        let selection = ranker.classes("Fob");
        assert!(!selection.is_exact());
        assert_eq!(selection.keys().collect::<Vec<_>>(), vec!["test.Foo"]);

        let limits = RelevanceLimits {
            max_classes: 1,
            ..RelevanceLimits::default()
        };
        let selection = RelevanceRanker::new(&corpus, limits).classes("Foo");
        assert_eq!(selection.keys().collect::<Vec<_>>(), vec!["test.Foo"]);
    }

    #[test]
    fn empty_corpus_selects_nothing() {
        let corpus = SourceCorpus::default();
        let selection =
            RelevanceRanker::new(&corpus, RelevanceLimits::default()).classes("Anything");
        assert!(selection.is_empty());
        assert!(!selection.is_exact());
        assert_eq!(selection.to_string(), "");
    }

    #[test_case("FooTest", "src/Foo.java"; "test suffix")]
    #[test_case("FooTestCase", "src/Foo.java"; "test case suffix")]
    #[test_case("BarTest", "src/Bar.java"; "other file")]
    #[test_case("Fo", "src/Foo.java"; "first file wins ties")]
    fn relevant_file(test_class_name: &str, expected: &str) {
        let files: Vec<Utf8PathBuf> = ["src/Foo.java", "src/Bar.java", "src/Fox.java"]
            .into_iter()
            .map(Utf8PathBuf::from)
            .collect();
        assert_eq!(
            most_relevant_file(&files, test_class_name),
            Some(Utf8Path::new(expected))
        );
    }

    #[test]
    fn no_relevant_file_without_sources() {
        assert_eq!(most_relevant_file(&[], "FooTest"), None);
    }

    #[test]
    fn prefix_is_capped() {
        assert_eq!(file_prefix("a\nb\r\nc\n", 2), "a\nb\n");
        assert_eq!(file_prefix("a\nb", 5), "a\nb\n");
    }
}
