// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The seam between the rerun engine and whatever actually runs tests.
//!
//! The production launcher is [`Sandbox`](crate::sandbox::Sandbox), which runs tests in a
//! separate worker process. The rerun engine only depends on the traits here.

#[cfg(test)]
pub(crate) mod scripted;

use crate::{errors::LaunchError, selection::TestSelection};
use nio_metadata::protocol::{ExecutionFinished, TestSelector, UnresolvedClass};

/// Runs tests on behalf of the rerun engine.
pub trait TestLauncher {
    /// Resolves test class names to loadable classes.
    ///
    /// Classes that cannot be resolved are reported in [`ResolvedClasses::unresolved`]; they are
    /// not an error.
    fn resolve(&mut self, class_names: &[String]) -> Result<ResolvedClasses, LaunchError>;

    /// Executes one run over `request`, reporting events to `listener` as they happen.
    ///
    /// Failing tests are reported through the listener. An `Err` means tests could not be run at
    /// all.
    fn execute(
        &mut self,
        run_index: u32,
        request: &DiscoveryRequest,
        listener: &mut dyn ExecutionListener,
    ) -> Result<(), LaunchError>;
}

/// Receives events while a run is in progress.
pub trait ExecutionListener {
    /// Called when a run starts, before any test executes.
    fn plan_started(&mut self, run_index: u32);

    /// Called every time a test finishes executing.
    fn execution_finished(&mut self, event: &ExecutionFinished);

    /// Called after the last test of a run has finished.
    fn plan_finished(&mut self, _run_index: u32) {}
}

/// The result of [`TestLauncher::resolve`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolvedClasses {
    /// Classes that were resolved.
    pub resolved: Vec<String>,

    /// Classes that could not be resolved, with reasons.
    pub unresolved: Vec<UnresolvedClass>,
}

/// What to run in a single run: a list of class and method selectors.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiscoveryRequest {
    selectors: Vec<TestSelector>,
}

impl DiscoveryRequest {
    /// Builds a request for the resolved classes in `selection`, in selection order.
    ///
    /// Classes selected without a method filter get a class selector; classes with a method
    /// filter get one method selector per named method.
    pub fn new(selection: &TestSelection, resolved: &[String]) -> Self {
        let mut selectors = Vec::new();
        for (class_name, methods) in selection.iter() {
            if !resolved.iter().any(|resolved| resolved == class_name) {
                continue;
            }
            match methods {
                None => selectors.push(TestSelector::Class {
                    class_name: class_name.to_owned(),
                }),
                Some(methods) => {
                    selectors.extend(methods.iter().map(|method_name| TestSelector::Method {
                        class_name: class_name.to_owned(),
                        method_name: method_name.clone(),
                    }))
                }
            }
        }
        Self { selectors }
    }

    /// Returns the selectors in this request.
    pub fn selectors(&self) -> &[TestSelector] {
        &self.selectors
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_skips_unresolved_classes() {
        let selection: TestSelection = "a.B, a.C#m1, a.C#m2, a.Missing".parse().expect("parses");
        let request = DiscoveryRequest::new(&selection, &["a.B".to_owned(), "a.C".to_owned()]);
        assert_eq!(
            request.selectors(),
            [
                TestSelector::Class {
                    class_name: "a.B".to_owned()
                },
                TestSelector::Method {
                    class_name: "a.C".to_owned(),
                    method_name: "m1".to_owned()
                },
                TestSelector::Method {
                    class_name: "a.C".to_owned(),
                    method_name: "m2".to_owned()
                },
            ]
        );
    }
}
