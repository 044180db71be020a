// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8Path;
use camino_tempfile::tempdir;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use nio_runner::{
    evidence::{EvidenceDir, TestInfoCollector, read_candidate_list},
    rerun::RerunEngine,
    run_log::{RunDir, RunLog},
    selection::TestSelection,
};
use pretty_assertions::assert_eq;

fn write(path: &Utf8Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

#[test]
fn rerun_then_collect_evidence() -> Result<()> {
    let project = tempdir()?;
    let source_dir = project.path().join("src/main/java");
    let test_source_dir = project.path().join("src/test/java");
    write(
        &source_dir.join("fixtures/Polluting.java"),
        "package fixtures;\n\npublic class Polluting {}\n",
    )?;
    write(
        &test_source_dir.join("fixtures/PollutingTest.java"),
        indoc! {"
            package fixtures;

            import org.junit.jupiter.api.Test;

            public class PollutingTest {
                @Test
                void registryStartsEmpty() {
                    assertTrue(Registry.isEmpty());
                    Registry.add(1);
                }

                @Test
                void unrelated() {
                    assertTrue(true);
                }
            }
        "},
    )?;

    let run_dir = RunDir::create(
        &project.path().join(".NIOInspector"),
        chrono::Local::now(),
    )?;
    let mut log = RunLog::create(&run_dir)?;
    let selection: TestSelection = ALL_CLASSES.parse()?;
    let mut sandbox = fixture_sandbox()?;
    RerunEngine::new(2).execute(&mut sandbox, &selection, &mut log)?;
    sandbox.shutdown()?;
    log.finish()?;

    let collector = TestInfoCollector::new(&source_dir, &test_source_dir, 100);
    let summary = collector.collect(&run_dir.log_path())?;
    assert_eq!(summary.candidates, vec![POLLUTING.to_owned()]);
    assert_eq!(read_candidate_list(run_dir.path())?, summary.candidates);

    let bundle = EvidenceDir::new(run_dir.path(), POLLUTING).read_bundle()?;
    assert_eq!(
        bundle.stack_traces.keys().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
    ensure!(
        bundle.stack_traces[&1].contains("expected the registry to be empty"),
        "unexpected trace: {}",
        bundle.stack_traces[&1]
    );
    let buggy = bundle.buggy_test_method.unwrap_or_default();
    ensure!(buggy.contains("void registryStartsEmpty()"), "{buggy}");
    ensure!(!buggy.contains("unrelated"), "{buggy}");
    assert_eq!(
        bundle.source_code.as_deref(),
        Some("package fixtures;\n\npublic class Polluting {}\n")
    );
    Ok(())
}
