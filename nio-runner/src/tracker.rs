// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-run outcome tracking.

use crate::{launcher::ExecutionListener, test_id::TestKey};
use indexmap::IndexMap;
use nio_metadata::{
    protocol::{ExecutionFinished, ExecutionStatus, FailureDetail},
    run_record::RunCounts,
};

/// Records the outcome of every test execution in the current run.
///
/// The first completion event for a native unique ID wins; later duplicates within the same run
/// are ignored. All state is cleared when a new run starts.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    run_index: u32,
    outcomes: IndexMap<String, RecordedExecution>,
}

/// A single recorded execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedExecution {
    /// The normalized key.
    pub key: TestKey,

    /// The native unique ID.
    pub unique_id: String,

    /// The display name reported by the test framework.
    pub display_name: String,

    /// The outcome.
    pub status: ExecutionStatus,

    /// The failure, if any.
    pub failure: Option<FailureDetail>,
}

impl RecordedExecution {
    /// Returns true if this execution passed.
    pub fn passed(&self) -> bool {
        self.status.is_success()
    }
}

impl OutcomeTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all per-run state. Snapshots taken earlier are unaffected.
    pub fn reset(&mut self, run_index: u32) {
        self.run_index = run_index;
        self.outcomes.clear();
    }

    /// Returns the index of the current run.
    pub fn run_index(&self) -> u32 {
        self.run_index
    }

    /// Returns the native unique ID → passed mapping for the current run, in completion order.
    pub fn snapshot(&self) -> IndexMap<String, bool> {
        self.outcomes
            .iter()
            .map(|(unique_id, execution)| (unique_id.clone(), execution.passed()))
            .collect()
    }

    /// Returns outcomes aggregated by normalized key.
    ///
    /// A key passed only if every execution that maps to it passed.
    pub fn outcomes_by_key(&self) -> IndexMap<TestKey, bool> {
        let mut by_key: IndexMap<TestKey, bool> = IndexMap::new();
        for execution in self.outcomes.values() {
            let passed = by_key.entry(execution.key.clone()).or_insert(true);
            *passed &= execution.passed();
        }
        by_key
    }

    /// Returns every recorded execution in completion order.
    pub fn executions(&self) -> impl Iterator<Item = &RecordedExecution> {
        self.outcomes.values()
    }

    /// Returns the executions that failed, in completion order. Aborted executions are not
    /// failures.
    pub fn failures(&self) -> impl Iterator<Item = &RecordedExecution> {
        self.outcomes
            .values()
            .filter(|execution| execution.status == ExecutionStatus::Failed)
    }

    /// Returns counts for the current run.
    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            found: self.outcomes.len(),
            ..RunCounts::default()
        };
        for execution in self.outcomes.values() {
            match execution.status {
                ExecutionStatus::Successful => counts.succeeded += 1,
                ExecutionStatus::Failed => counts.failed += 1,
                ExecutionStatus::Aborted => counts.aborted += 1,
            }
        }
        counts
    }
}

impl ExecutionListener for OutcomeTracker {
    fn plan_started(&mut self, run_index: u32) {
        self.reset(run_index);
    }

    fn execution_finished(&mut self, event: &ExecutionFinished) {
        self.outcomes
            .entry(event.unique_id.clone())
            .or_insert_with(|| RecordedExecution {
                key: TestKey::from_native(&event.unique_id),
                unique_id: event.unique_id.clone(),
                display_name: event.display_name.clone(),
                status: event.status,
                failure: event.failure.clone(),
            });
    }
}
