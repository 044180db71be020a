// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use nio_runner::{
    errors::{LaunchError, RerunError, SandboxError},
    rerun::{Classification, RerunEngine},
    run_log::RunLog,
    sandbox::SandboxBuilder,
    selection::TestSelection,
    test_id::TestIdentity,
};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn id(s: &str) -> TestIdentity {
    s.parse().expect("valid identity")
}

#[test]
fn classifies_fixture_tests() -> Result<()> {
    let selection: TestSelection = ALL_CLASSES.parse()?;
    let mut sandbox = fixture_sandbox()?;
    let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");

    let report = RerunEngine::new(3).execute(&mut sandbox, &selection, &mut log)?;
    sandbox.shutdown()?;

    assert_eq!(report.classification(&id(POLLUTING)), Classification::Nio);
    assert_eq!(report.classification(&id(ALTERNATING)), Classification::Nd);
    assert_eq!(report.tally().get(&id(ALTERNATING)), 2);
    assert_eq!(
        report.classification(&id(ALWAYS_FAILING)),
        Classification::None,
        "a test that failed at baseline is never classified"
    );
    assert_eq!(report.classification(&id(STABLE)), Classification::None);
    assert_eq!(report.baseline_tests(), 4);
    assert_eq!(report.run_counts().len(), 4);

    let (text, _) = log.finish()?;
    let text = String::from_utf8(text)?;
    ensure!(
        text.contains(&format!(
            "[ERROR] {POLLUTING} (passed in the initial run but failed in 3 out of 3 reruns)"
        )),
        "NIO line missing from:\n{text}"
    );
    ensure!(
        text.contains(&format!(
            "[WARN] {ALTERNATING} (passed in the initial run but failed in 2 out of 3 reruns)"
        )),
        "ND line missing from:\n{text}"
    );
    Ok(())
}

#[test_case(1, Classification::Nio; "single rerun")]
#[test_case(2, Classification::Nd; "two reruns")]
#[test_case(4, Classification::Nd; "four reruns")]
fn alternating_test_by_rerun_count(rerun_count: u32, expected: Classification) -> Result<()> {
    let selection: TestSelection = ALTERNATING.parse()?;
    let mut sandbox = fixture_sandbox()?;
    let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");

    let report = RerunEngine::new(rerun_count).execute(&mut sandbox, &selection, &mut log)?;
    assert_eq!(report.classification(&id(ALTERNATING)), expected);
    Ok(())
}

#[test]
fn every_invocation_starts_clean() -> Result<()> {
    // The polluting test dirties static state, so a worker reused across invocations would fail
    // it at baseline. Each invocation builds a fresh worker.
    for _ in 0..2 {
        let selection: TestSelection = POLLUTING.parse()?;
        let mut sandbox = fixture_sandbox()?;
        let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
        let report = RerunEngine::new(2).execute(&mut sandbox, &selection, &mut log)?;
        sandbox.shutdown()?;

        ensure!(report.baseline().passed(&id(POLLUTING)));
        assert_eq!(report.classification(&id(POLLUTING)), Classification::Nio);
    }
    Ok(())
}

#[test]
fn unresolved_class_is_skipped() -> Result<()> {
    let selection: TestSelection = "fixtures.DoesNotExist, fixtures.StableTest".parse()?;
    let mut sandbox = fixture_sandbox()?;
    let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");

    let report = RerunEngine::new(1).execute(&mut sandbox, &selection, &mut log)?;
    assert_eq!(report.baseline_tests(), 1);

    let (text, records) = log.finish()?;
    let text = String::from_utf8(text)?;
    ensure!(
        text.contains("[WARN] Skipping test class fixtures.DoesNotExist: "),
        "skip warning missing from:\n{text}"
    );
    ensure!(String::from_utf8(records)?.contains("class-unresolved"));
    Ok(())
}

#[test]
fn missing_worker_is_a_launch_error() {
    let error = SandboxBuilder::new("/nonexistent/nio-worker", Vec::<String>::new())
        .build()
        .expect_err("spawning a missing program fails");
    assert!(matches!(error, SandboxError::Spawn { .. }), "{error:?}");

    let error: RerunError = LaunchError::from(error).into();
    assert!(matches!(error, RerunError::Launch(_)));
}
