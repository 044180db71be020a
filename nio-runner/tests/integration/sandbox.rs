// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use nio_metadata::NioInspectorExitCode;
use nio_runner::{
    rerun::{Classification, RerunEngine},
    run_log::RunLog,
    sandbox::SandboxBuilder,
    selection::TestSelection,
    test_id::TestIdentity,
};
use std::process::{Command, Stdio};

#[test]
fn worker_refuses_to_run_outside_sandbox() -> Result<()> {
    let output = Command::new(FIXTURE_WORKER)
        .env_clear()
        .stdin(Stdio::null())
        .output()?;
    assert_eq!(
        output.status.code(),
        Some(NioInspectorExitCode::SANDBOX_ERROR),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        output.stdout.is_empty(),
        "no protocol messages are sent outside a sandbox"
    );
    Ok(())
}

#[test]
fn worker_runs_in_its_own_process() -> Result<()> {
    let sandbox = fixture_sandbox()?;
    assert_ne!(sandbox.pid(), std::process::id());
    sandbox.shutdown()?;
    Ok(())
}

#[test]
fn environment_is_cleared() -> Result<()> {
    ensure!(
        std::env::var_os("PATH").is_some(),
        "this test needs PATH to be set"
    );
    let selection: TestSelection = ENVIRONMENT.parse()?;

    let mut sandbox = fixture_sandbox()?;
    let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
    let report = RerunEngine::new(1).execute(&mut sandbox, &selection, &mut log)?;
    ensure!(report.baseline().passed(&ENVIRONMENT.parse()?));

    let mut sandbox = SandboxBuilder::new(FIXTURE_WORKER, Vec::<String>::new())
        .set_inherit_env(["PATH".to_owned()])
        .build()?;
    let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
    let report = RerunEngine::new(1).execute(&mut sandbox, &selection, &mut log)?;
    ensure!(
        !report.baseline().passed(&ENVIRONMENT.parse()?),
        "PATH was passed through explicitly"
    );
    Ok(())
}

#[test]
fn test_output_does_not_disturb_the_protocol() -> Result<()> {
    let selection: TestSelection = "fixtures.ChattyTest, fixtures.PollutingTest".parse()?;
    let mut sandbox = fixture_sandbox()?;
    let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
    let report = RerunEngine::new(2).execute(&mut sandbox, &selection, &mut log)?;
    sandbox.shutdown()?;

    assert_eq!(report.baseline_tests(), 3);
    for test in [PRINTS_LINES, PRINTS_PARTIAL_LINE] {
        let identity: TestIdentity = test.parse()?;
        ensure!(report.baseline().passed(&identity), "{test} did not pass at baseline");
        assert_eq!(report.tally().get(&identity), 0, "{test} was tallied as failing");
        assert_eq!(report.classification(&identity), Classification::None);
    }
    assert_eq!(
        report.classification(&POLLUTING.parse()?),
        Classification::Nio
    );
    Ok(())
}
