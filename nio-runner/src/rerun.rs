// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rerun engine.
//!
//! One invocation executes a baseline run followed by `rerun_count` reruns of the same selection
//! through the same [`TestLauncher`]. A test that passed at baseline and then fails in every
//! rerun is a possible NIO test; one that fails in only some reruns is ND.
//!
//! Everything the engine observes is written to a [`RunLog`].

mod classify;

pub use classify::*;

use crate::{
    errors::RerunError,
    helpers::plural,
    launcher::{DiscoveryRequest, TestLauncher},
    run_log::{
        ND_COUNT_PREFIX, NIO_COUNT_PREFIX, NO_FLAKY_TESTS_FOUND, RunLog, classification_line,
        final_results_banner, initial_run_banner, rerun_banner,
    },
    selection::TestSelection,
    test_id::{TestIdentity, TestKey},
    tracker::OutcomeTracker,
};
use nio_metadata::run_record::{RunCounts, RunRecord};
use std::io::Write;
use tracing::{debug, info, warn};

/// Runs a baseline followed by a fixed number of reruns, and classifies the results.
#[derive(Clone, Debug)]
pub struct RerunEngine {
    rerun_count: u32,
}

impl RerunEngine {
    /// Creates an engine that performs `rerun_count` reruns after the baseline.
    pub fn new(rerun_count: u32) -> Self {
        Self { rerun_count }
    }

    /// Returns the number of reruns.
    pub fn rerun_count(&self) -> u32 {
        self.rerun_count
    }

    /// Executes the baseline and every rerun over `selection`.
    ///
    /// Classes the launcher cannot resolve are skipped with a warning. Failing tests are data.
    /// An error is only returned if tests could not be run at all or the log could not be
    /// written.
    pub fn execute<W: Write>(
        &self,
        launcher: &mut dyn TestLauncher,
        selection: &TestSelection,
        log: &mut RunLog<W>,
    ) -> Result<RerunReport, RerunError> {
        log.record(&RunRecord::InvocationStarted {
            rerun_count: self.rerun_count,
        })?;

        let resolved = launcher.resolve(&selection.class_names())?;
        for unresolved in &resolved.unresolved {
            log.warn(format_args!(
                "Skipping test class {}: {}",
                unresolved.class_name, unresolved.reason
            ))?;
            log.record(&RunRecord::ClassUnresolved {
                class_name: unresolved.class_name.clone(),
                reason: unresolved.reason.clone(),
            })?;
        }
        let request = DiscoveryRequest::new(selection, &resolved.resolved);
        debug!(
            "running {} {} ({} selectors) with {} {}",
            resolved.resolved.len(),
            plural::classes_str(resolved.resolved.len()),
            request.selectors().len(),
            self.rerun_count,
            plural::reruns_str(self.rerun_count as usize),
        );

        let mut tracker = OutcomeTracker::new();
        let mut run_counts = Vec::with_capacity(self.rerun_count as usize + 1);

        section(log, &initial_run_banner())?;
        run_counts.push(run_once(launcher, 0, &request, &mut tracker, log)?);
        let baseline = FirstRunBaseline::capture(&tracker);

        let mut tally = FailureTally::new();
        for run_index in 1..=self.rerun_count {
            section(log, &rerun_banner(run_index))?;
            run_counts.push(run_once(launcher, run_index, &request, &mut tracker, log)?);
            let failing: Vec<TestIdentity> = tracker
                .failures()
                .filter_map(|execution| execution.key.identity().cloned())
                .collect();
            tally.record_rerun(&baseline, &failing);
        }

        let report = RerunReport {
            rerun_count: self.rerun_count,
            baseline,
            tally,
            run_counts,
        };
        write_final_results(&report, log)?;
        Ok(report)
    }
}

fn section<W: Write>(log: &mut RunLog<W>, banner: &str) -> Result<(), RerunError> {
    log.info("")?;
    log.info(banner)?;
    log.info("")?;
    Ok(())
}

fn run_once<W: Write>(
    launcher: &mut dyn TestLauncher,
    run_index: u32,
    request: &DiscoveryRequest,
    tracker: &mut OutcomeTracker,
    log: &mut RunLog<W>,
) -> Result<RunCounts, RerunError> {
    log.record(&RunRecord::RunStarted { run_index })?;
    tracker.reset(run_index);
    launcher.execute(run_index, request, tracker)?;

    let counts = tracker.counts();
    log.info(format_args!(
        "Test run summary: {} {} found, {} succeeded, {} failed, {} aborted",
        counts.found,
        plural::tests_str(counts.found),
        counts.succeeded,
        counts.failed,
        counts.aborted,
    ))?;

    let mut any_failed = false;
    for execution in tracker.failures() {
        any_failed = true;
        log.warn(format_args!("Failing Test: {}", execution.key))?;
        let failure = execution.failure.clone().unwrap_or_default();
        if let Some(trace) = failure.stack_trace.as_deref().or(failure.message.as_deref()) {
            log.warn("Failure message:")?;
            log.raw(trace)?;
        }
        if let TestKey::Unparsable(raw) = &execution.key {
            warn!("could not derive a test identity from `{raw}`; it will not be classified");
        }
        log.record(&RunRecord::TestFailed {
            run_index,
            test: execution.key.to_string(),
            unique_id: execution.unique_id.clone(),
            message: failure.message,
            stack_trace: failure.stack_trace,
        })?;
    }
    if any_failed {
        log.warn("All Failed tests:")?;
        for execution in tracker.failures() {
            log.warn(format_args!(
                "{}: {}",
                execution.display_name, execution.unique_id
            ))?;
        }
    }

    log.record(&RunRecord::RunFinished { run_index, counts })?;
    Ok(counts)
}

fn write_final_results<W: Write>(
    report: &RerunReport,
    log: &mut RunLog<W>,
) -> Result<(), RerunError> {
    section(log, &final_results_banner())?;

    let nio: Vec<_> = report.classified(Classification::Nio).collect();
    let nd: Vec<_> = report.classified(Classification::Nd).collect();
    if nio.is_empty() && nd.is_empty() {
        log.info(NO_FLAKY_TESTS_FOUND)?;
        return Ok(());
    }

    let total = report.rerun_count;
    if !nio.is_empty() {
        log.error(format_args!("{NIO_COUNT_PREFIX}{}", nio.len()))?;
        for (identity, failed) in &nio {
            log.error(classification_line(identity, *failed, total))?;
        }
    }
    if !nd.is_empty() {
        log.warn(format_args!("{ND_COUNT_PREFIX}{}", nd.len()))?;
        for (identity, failed) in &nd {
            log.warn(classification_line(identity, *failed, total))?;
        }
    }

    for (classification, tests) in [(Classification::Nio, &nio), (Classification::Nd, &nd)] {
        let Some(recorded) = classification.recorded() else {
            continue;
        };
        for (identity, failed) in tests {
            log.record(&RunRecord::Classified {
                test: identity.to_string(),
                classification: recorded,
                failed_reruns: *failed,
                total_reruns: total,
            })?;
        }
    }

    info!(
        "found {} possible NIO {} and {} ND {}",
        nio.len(),
        plural::tests_str(nio.len()),
        nd.len(),
        plural::tests_str(nd.len()),
    );
    Ok(())
}

/// The outcome of a [`RerunEngine::execute`] call.
#[derive(Clone, Debug)]
pub struct RerunReport {
    rerun_count: u32,
    baseline: FirstRunBaseline,
    tally: FailureTally,
    run_counts: Vec<RunCounts>,
}

impl RerunReport {
    /// Returns the number of reruns that were performed.
    pub fn rerun_count(&self) -> u32 {
        self.rerun_count
    }

    /// Returns the baseline captured from run 0.
    pub fn baseline(&self) -> &FirstRunBaseline {
        &self.baseline
    }

    /// Returns the failure tally.
    pub fn tally(&self) -> &FailureTally {
        &self.tally
    }

    /// Returns per-run counts, baseline first.
    pub fn run_counts(&self) -> &[RunCounts] {
        &self.run_counts
    }

    /// Returns the classification of `identity`.
    pub fn classification(&self, identity: &TestIdentity) -> Classification {
        Classification::from_tally(self.tally.get(identity), self.rerun_count)
    }

    /// Iterates over tests with the given classification, with their tallies, in insertion order.
    pub fn classified(
        &self,
        classification: Classification,
    ) -> impl Iterator<Item = (&TestIdentity, u32)> + '_ {
        self.tally.iter().filter(move |(_, failed)| {
            Classification::from_tally(*failed, self.rerun_count) == classification
        })
    }

    /// Returns the number of tests run at baseline, across all classes.
    pub fn baseline_tests(&self) -> usize {
        self.run_counts.first().map_or(0, |counts| counts.found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::LaunchError, launcher::scripted::ScriptedLauncher};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use proptest::collection::{btree_map, vec};
    use test_strategy::proptest;

    const M: &str = "[engine:junit-jupiter]/[class:a.B]/[method:m()]";

    fn id(s: &str) -> TestIdentity {
        s.parse().expect("valid identity")
    }

    fn run(
        launcher: &mut ScriptedLauncher,
        selection: &str,
        rerun_count: u32,
    ) -> (RerunReport, String) {
        let selection: TestSelection = selection.parse().expect("valid selection");
        let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
        let report = RerunEngine::new(rerun_count)
            .execute(launcher, &selection, &mut log)
            .expect("engine succeeds");
        let (text, _) = log.finish().expect("flushes");
        (report, String::from_utf8(text).expect("utf-8"))
    }

    #[test]
    fn scenario_a_fails_every_rerun() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test(M, [true, false, false, false]);
        let (report, text) = run(&mut launcher, "a.B", 3);

        assert_eq!(report.tally().get(&id("a.B#m")), 3);
        assert_eq!(report.classification(&id("a.B#m")), Classification::Nio);
        assert_eq!(launcher.executed_runs, vec![0, 1, 2, 3]);
        assert!(text.contains(indoc! {"
            [ERROR] Number of Possible NIO Test(s) Found: 1
            [ERROR] a.B#m (passed in the initial run but failed in 3 out of 3 reruns)
        "}));
    }

    #[test]
    fn scenario_b_fails_some_reruns() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test(M, [true, false, true, false]);
        let (report, text) = run(&mut launcher, "a.B", 3);

        assert_eq!(report.tally().get(&id("a.B#m")), 2);
        assert_eq!(report.classification(&id("a.B#m")), Classification::Nd);
        assert!(text.contains(indoc! {"
            [WARN] Number of Non-deterministic Flaky Test(s) Found: 1
            [WARN] a.B#m (passed in the initial run but failed in 2 out of 3 reruns)
        "}));
        assert!(!text.contains("Possible NIO"));
    }

    #[test]
    fn scenario_c_fails_at_baseline() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test(M, [false, false, false, false]);
        let (report, text) = run(&mut launcher, "a.B", 3);

        assert!(report.tally().is_empty());
        assert_eq!(report.classification(&id("a.B#m")), Classification::None);
        assert!(text.ends_with("[INFO] No Flaky Tests Found\n"));
    }

    #[test]
    fn aborted_reruns_are_not_failures() {
        use nio_metadata::protocol::ExecutionStatus::{Aborted, Failed, Successful};

        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_statuses(M, [Successful, Aborted, Aborted, Aborted])
            .with_statuses(
                "[engine:junit-jupiter]/[class:a.B]/[method:n()]",
                [Successful, Aborted, Failed, Failed],
            );
        let (report, text) = run(&mut launcher, "a.B", 3);

        assert_eq!(report.tally().get(&id("a.B#m")), 0);
        assert_eq!(report.classification(&id("a.B#m")), Classification::None);
        assert!(!text.contains("Failing Test: a.B#m"), "{text}");
        assert!(text.contains("2 tests found, 0 succeeded, 0 failed, 2 aborted"), "{text}");

        assert_eq!(report.tally().get(&id("a.B#n")), 2);
        assert_eq!(report.classification(&id("a.B#n")), Classification::Nd);
    }

    #[test]
    fn zero_reruns_reports_no_flaky_tests() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test(M, [true]);
        let (report, text) = run(&mut launcher, "a.B", 0);

        assert_eq!(report.run_counts().len(), 1);
        assert_eq!(launcher.executed_runs, vec![0]);
        assert!(text.contains("Starting the Initial Run of Test"));
        assert!(!text.contains("Starting Rerun #"));
        assert!(text.ends_with("[INFO] No Flaky Tests Found\n"));
    }

    #[test]
    fn full_transcript() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test(M, [true, false]);
        let (_, text) = run(&mut launcher, "a.B, a.Missing", 1);

        assert_eq!(
            text,
            indoc! {"
                [WARN] Skipping test class a.Missing: class not found
                [INFO]
                [INFO] ====================Starting the Initial Run of Test====================
                [INFO]
                [INFO] Test run summary: 1 test found, 1 succeeded, 0 failed, 0 aborted
                [INFO]
                [INFO] =======================Starting Rerun #1=========================
                [INFO]
                [INFO] Test run summary: 1 test found, 0 succeeded, 1 failed, 0 aborted
                [WARN] Failing Test: a.B#m
                [WARN] Failure message:
                java.lang.AssertionError: expected to pass in run 1
                \tat a.B.m(Scripted.java:11)
                [WARN] All Failed tests:
                [WARN] m(): [engine:junit-jupiter]/[class:a.B]/[method:m()]
                [INFO]
                [INFO] =========================Final Results=========================
                [INFO]
                [ERROR] Number of Possible NIO Test(s) Found: 1
                [ERROR] a.B#m (passed in the initial run but failed in 1 out of 1 reruns)
            "}
        );
    }

    #[test]
    fn launch_failure_is_fatal() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test(M, [true, false])
            .failing_at(1);
        let selection: TestSelection = "a.B".parse().expect("valid selection");
        let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
        let error = RerunEngine::new(3)
            .execute(&mut launcher, &selection, &mut log)
            .expect_err("launch failure is fatal");
        assert!(matches!(
            error,
            RerunError::Launch(LaunchError::Exited { .. })
        ));
    }

    #[proptest(cases = 64)]
    fn classification_is_consistent(
        #[strategy(0u32..5)] rerun_count: u32,
        #[strategy(btree_map("[a-c]\\.T#m[0-4]", vec(proptest::bool::ANY, 5), 0..6))]
        histories: std::collections::BTreeMap<String, Vec<bool>>,
    ) {
        let mut launcher = ScriptedLauncher::new().with_class("a.T");
        for (test, history) in &histories {
            launcher = launcher.with_test(test, history.iter().copied());
        }
        let (report, _) = run(&mut launcher, "a.T", rerun_count);

        for (test, history) in &histories {
            let identity = id(test);
            let failed = report.tally().get(&identity);
            assert!(failed <= rerun_count);
            if !history[0] {
                assert_eq!(failed, 0);
            }
            let expected = if history[0] {
                history[1..=rerun_count as usize]
                    .iter()
                    .filter(|passed| !**passed)
                    .count() as u32
            } else {
                0
            };
            assert_eq!(failed, expected);

            let in_nio = report
                .classified(Classification::Nio)
                .any(|(tallied, _)| *tallied == identity);
            let in_nd = report
                .classified(Classification::Nd)
                .any(|(tallied, _)| *tallied == identity);
            assert!(!(in_nio && in_nd));
            if failed == 0 {
                assert!(!in_nio && !in_nd);
            }
        }
    }
}
