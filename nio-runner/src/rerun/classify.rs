// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{test_id::TestIdentity, tracker::OutcomeTracker};
use indexmap::{IndexMap, IndexSet};
use nio_metadata::run_record::RecordedClassification;
use std::fmt;

/// Which tests passed in run 0. Captured once and never modified afterwards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FirstRunBaseline {
    passed: IndexMap<TestIdentity, bool>,
}

impl FirstRunBaseline {
    /// Captures the baseline from the tracker state at the end of run 0.
    ///
    /// Executions whose native IDs could not be normalized have no identity and are left out.
    pub fn capture(tracker: &OutcomeTracker) -> Self {
        let passed = tracker
            .outcomes_by_key()
            .into_iter()
            .filter_map(|(key, passed)| key.identity().cloned().map(|identity| (identity, passed)))
            .collect();
        Self { passed }
    }

    /// Returns true if `identity` was executed in run 0 and passed.
    pub fn passed(&self, identity: &TestIdentity) -> bool {
        self.passed.get(identity).copied().unwrap_or(false)
    }

    /// Returns the number of identities in the baseline.
    pub fn len(&self) -> usize {
        self.passed.len()
    }

    /// Returns true if the baseline is empty.
    pub fn is_empty(&self) -> bool {
        self.passed.is_empty()
    }
}

/// For each test, the number of reruns it failed in after passing at baseline.
///
/// Only tests with a count of at least one are present, in the order they first failed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FailureTally {
    counts: IndexMap<TestIdentity, u32>,
}

impl FailureTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the tests that failed in one rerun.
    ///
    /// Tests that did not pass at baseline are ignored, and each identity is counted at most once
    /// per rerun.
    pub fn record_rerun<'a>(
        &mut self,
        baseline: &FirstRunBaseline,
        failing: impl IntoIterator<Item = &'a TestIdentity>,
    ) {
        let failing: IndexSet<&TestIdentity> = failing.into_iter().collect();
        for identity in failing {
            if baseline.passed(identity) {
                *self.counts.entry(identity.clone()).or_default() += 1;
            }
        }
    }

    /// Returns the tally for `identity`, or 0.
    pub fn get(&self, identity: &TestIdentity) -> u32 {
        self.counts.get(identity).copied().unwrap_or(0)
    }

    /// Iterates over tallied tests in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&TestIdentity, u32)> + '_ {
        self.counts.iter().map(|(identity, count)| (identity, *count))
    }

    /// Returns true if no test was tallied.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// How a test was classified at the end of an invocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Classification {
    /// Failed in every rerun after passing at baseline.
    Nio,

    /// Failed in some but not all reruns after passing at baseline.
    Nd,

    /// Never failed after passing at baseline.
    None,
}

impl Classification {
    /// Classifies a tally out of `rerun_count` reruns.
    pub fn from_tally(tally: u32, rerun_count: u32) -> Self {
        if tally == 0 {
            Self::None
        } else if tally >= rerun_count {
            Self::Nio
        } else {
            Self::Nd
        }
    }

    /// Returns the recorded form of this classification, or `None` for [`Classification::None`].
    pub fn recorded(self) -> Option<RecordedClassification> {
        match self {
            Self::Nio => Some(RecordedClassification::Nio),
            Self::Nd => Some(RecordedClassification::Nd),
            Self::None => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nio => write!(f, "NIO"),
            Self::Nd => write!(f, "ND"),
            Self::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::ExecutionListener;
    use nio_metadata::protocol::{ExecutionFinished, ExecutionStatus};
    use test_case::test_case;

    fn id(s: &str) -> TestIdentity {
        s.parse().expect("valid identity")
    }

    fn baseline(outcomes: &[(&str, bool)]) -> FirstRunBaseline {
        let mut tracker = OutcomeTracker::new();
        tracker.plan_started(0);
        for (unique_id, passed) in outcomes {
            tracker.execution_finished(&ExecutionFinished {
                unique_id: (*unique_id).to_owned(),
                display_name: (*unique_id).to_owned(),
                status: if *passed {
                    ExecutionStatus::Successful
                } else {
                    ExecutionStatus::Failed
                },
                failure: None,
            });
        }
        FirstRunBaseline::capture(&tracker)
    }

    #[test_case(0, 3 => Classification::None; "never failed")]
    #[test_case(1, 3 => Classification::Nd; "failed once")]
    #[test_case(2, 3 => Classification::Nd; "failed twice")]
    #[test_case(3, 3 => Classification::Nio; "failed every rerun")]
    #[test_case(1, 1 => Classification::Nio; "single rerun")]
    #[test_case(0, 0 => Classification::None; "no reruns")]
    fn classify(tally: u32, rerun_count: u32) -> Classification {
        Classification::from_tally(tally, rerun_count)
    }

    #[test]
    fn baseline_failures_are_never_tallied() {
        let baseline = baseline(&[("a.B#passes", true), ("a.B#fails", false), ("garbage", true)]);
        assert_eq!(baseline.len(), 2);

        let mut tally = FailureTally::new();
        let failing = [id("a.B#passes"), id("a.B#fails"), id("a.B#unknown")];
        tally.record_rerun(&baseline, &failing);
        tally.record_rerun(&baseline, &failing);

        assert_eq!(tally.get(&id("a.B#passes")), 2);
        assert_eq!(tally.get(&id("a.B#fails")), 0);
        assert_eq!(tally.get(&id("a.B#unknown")), 0);
        assert_eq!(tally.iter().count(), 1);
    }

    #[test]
    fn duplicates_count_once_per_rerun() {
        let baseline = baseline(&[("a.B#p", true)]);
        let mut tally = FailureTally::new();
        tally.record_rerun(&baseline, &[id("a.B#p"), id("a.B#p")]);
        assert_eq!(tally.get(&id("a.B#p")), 1);
    }
}
