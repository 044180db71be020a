// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Choosing which test classes and methods to run.

use crate::{
    config::ExcludeMatcher,
    errors::{ConfigurationError, TestSelectorParseError},
    helpers::plural,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::str::FromStr;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The test classes to run, each with an optional method filter.
///
/// Classes keep the order they were first mentioned in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestSelection {
    // None means "every method in the class".
    classes: IndexMap<String, Option<Vec<String>>>,
}

impl TestSelection {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every method of a class.
    ///
    /// If methods of this class were already selected explicitly, the explicit filter is kept.
    pub fn add_class(&mut self, class_name: impl Into<String>) {
        self.classes.entry(class_name.into()).or_insert(None);
    }

    /// Adds a single method of a class.
    pub fn add_method(&mut self, class_name: impl Into<String>, method_name: impl Into<String>) {
        let method_name = method_name.into();
        let methods = self
            .classes
            .entry(class_name.into())
            .or_insert(None)
            .get_or_insert_with(Vec::new);
        if !methods.contains(&method_name) {
            methods.push(method_name);
        }
    }

    /// Returns the selected class names, in order.
    pub fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    /// Iterates over classes and their method filters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[String]>)> + '_ {
        self.classes
            .iter()
            .map(|(class_name, methods)| (class_name.as_str(), methods.as_deref()))
    }

    /// Returns the number of selected classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no classes are selected.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Discovers test classes from compiled `.class` files under `test_output_dir`.
    ///
    /// Nested and anonymous classes (names containing `$`) are run through their enclosing class
    /// and are not selected on their own. Classes whose source path matches `excludes` are
    /// skipped.
    pub fn discover(
        test_output_dir: &Utf8Path,
        excludes: &ExcludeMatcher,
    ) -> Result<Self, ConfigurationError> {
        if !test_output_dir.is_dir() {
            return Err(ConfigurationError::TestOutputDirMissing {
                path: test_output_dir.to_owned(),
            });
        }

        let mut selection = Self::new();
        let mut excluded = 0usize;
        let walker = WalkDir::new(test_output_dir)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("skipping unreadable entry under {test_output_dir}: {error}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(path) = Utf8PathBuf::try_from(entry.into_path()) else {
                warn!("skipping non-UTF-8 path under {test_output_dir}");
                continue;
            };
            let Ok(relative) = path.strip_prefix(test_output_dir) else {
                continue;
            };
            if relative.extension() != Some("class") || relative.as_str().contains('$') {
                continue;
            }

            let mut source_path = relative.to_owned();
            source_path.set_extension("java");
            if excludes.is_excluded(&source_path) {
                debug!("excluding {source_path}");
                excluded += 1;
                continue;
            }

            let mut class_path = relative.to_owned();
            class_path.set_extension("");
            let class_name = class_path
                .components()
                .map(|component| component.as_str())
                .collect::<Vec<_>>()
                .join(".");
            selection.add_class(class_name);
        }

        debug!(
            "discovered {} test {} under {test_output_dir} ({excluded} excluded)",
            selection.len(),
            plural::classes_str(selection.len()),
        );
        Ok(selection)
    }
}

impl FromStr for TestSelection {
    type Err = TestSelectorParseError;

    /// Parses a comma-separated list of `Class`, `Class#method` and `Class#m1+m2` entries.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut selection = Self::new();
        for entry in s.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            match entry.split_once('#') {
                Some((class_name, methods)) => {
                    let class_name = class_name.trim();
                    if class_name.is_empty() {
                        return Err(TestSelectorParseError::new(entry, "class name is empty"));
                    }
                    // `split` yields at least one item, so `a.B#` is caught here too.
                    for method in methods.split('+').map(str::trim) {
                        if method.is_empty() {
                            return Err(TestSelectorParseError::new(entry, "method name is empty"));
                        }
                        selection.add_method(class_name, method);
                    }
                }
                None => selection.add_class(entry),
            }
        }
        Ok(selection)
    }
}
