// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory launcher that replays scripted outcome histories.

use super::{DiscoveryRequest, ExecutionListener, ResolvedClasses, TestLauncher};
use crate::{errors::LaunchError, test_id::TestKey};
use nio_metadata::protocol::{ExecutionFinished, ExecutionStatus, FailureDetail, UnresolvedClass};

#[derive(Clone, Debug, Default)]
pub(crate) struct ScriptedLauncher {
    known_classes: Vec<String>,
    // (native unique ID, status at run index i). Runs past the end of a history pass.
    histories: Vec<(String, Vec<ExecutionStatus>)>,
    fail_at_run: Option<u32>,
    pub(crate) executed_runs: Vec<u32>,
}

impl ScriptedLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_class(mut self, class_name: &str) -> Self {
        self.known_classes.push(class_name.to_owned());
        self
    }

    pub(crate) fn with_test(
        mut self,
        unique_id: &str,
        history: impl IntoIterator<Item = bool>,
    ) -> Self {
        let statuses = history.into_iter().map(|passed| {
            if passed {
                ExecutionStatus::Successful
            } else {
                ExecutionStatus::Failed
            }
        });
        self.with_statuses(unique_id, statuses)
    }

    pub(crate) fn with_statuses(
        mut self,
        unique_id: &str,
        history: impl IntoIterator<Item = ExecutionStatus>,
    ) -> Self {
        self.histories
            .push((unique_id.to_owned(), history.into_iter().collect()));
        self
    }

    pub(crate) fn failing_at(mut self, run_index: u32) -> Self {
        self.fail_at_run = Some(run_index);
        self
    }
}

pub(crate) fn scripted_failure(unique_id: &str, run_index: u32) -> FailureDetail {
    let frame = match TestKey::from_native(unique_id).identity() {
        Some(identity) => format!(
            "\tat {}.{}(Scripted.java:{})",
            identity.suite(),
            identity.case(),
            10 + run_index
        ),
        None => "\tat Unknown.unknown(Unknown Source)".to_owned(),
    };
    FailureDetail {
        message: Some(format!("expected to pass in run {run_index}")),
        stack_trace: Some(format!(
            "java.lang.AssertionError: expected to pass in run {run_index}\n{frame}"
        )),
    }
}

fn display_name(unique_id: &str) -> String {
    match TestKey::from_native(unique_id).identity() {
        Some(identity) => format!("{}()", identity.case()),
        None => unique_id.to_owned(),
    }
}

impl TestLauncher for ScriptedLauncher {
    fn resolve(&mut self, class_names: &[String]) -> Result<ResolvedClasses, LaunchError> {
        let mut resolved = ResolvedClasses::default();
        for class_name in class_names {
            if self.known_classes.contains(class_name) {
                resolved.resolved.push(class_name.clone());
            } else {
                resolved.unresolved.push(UnresolvedClass {
                    class_name: class_name.clone(),
                    reason: "class not found".to_owned(),
                });
            }
        }
        Ok(resolved)
    }

    fn execute(
        &mut self,
        run_index: u32,
        _request: &DiscoveryRequest,
        listener: &mut dyn ExecutionListener,
    ) -> Result<(), LaunchError> {
        if self.fail_at_run == Some(run_index) {
            return Err(LaunchError::Exited {
                during: format!("executing run {run_index}"),
            });
        }
        self.executed_runs.push(run_index);
        listener.plan_started(run_index);
        for (unique_id, history) in &self.histories {
            let status = history
                .get(run_index as usize)
                .copied()
                .unwrap_or(ExecutionStatus::Successful);
            listener.execution_finished(&ExecutionFinished {
                unique_id: unique_id.clone(),
                display_name: display_name(unique_id),
                status,
                failure: (!status.is_success()).then(|| scripted_failure(unique_id, run_index)),
            });
        }
        listener.plan_finished(run_index);
        Ok(())
    }
}
