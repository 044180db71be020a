// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracting evidence for possible NIO tests from a finished rerun.
//!
//! For every test the run classified as possibly NIO, [`TestInfoCollector`] writes:
//!
//! * the stack trace of each rerun the test failed in,
//! * the line of test source each of those reruns failed at,
//! * the test class reduced to the failing method, and
//! * the production file whose name is closest to the test class's.
//!
//! Candidates and stack traces come from the structured run records when they are present next
//! to the run log. Otherwise the text log is parsed.

mod bundle;
mod log_parser;
mod records;
mod reduce;
mod stack_trace;

pub use bundle::*;
pub use log_parser::{possible_nio_tests, stack_traces};
pub use records::RecordedRun;
pub use reduce::reduce_test;
pub use stack_trace::{BugFrame, bug_frame, physical_line};

use crate::{
    config::{NioConfig, RelevanceLimits},
    errors::{CollectError, ConfigurationError},
    helpers::plural,
    relevance::RelevantSourceCollector,
    test_id::TestIdentity,
};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use nio_metadata::run_record::RUN_RECORDS_FILE_NAME;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Collects evidence for the possible NIO tests of one run.
#[derive(Debug)]
pub struct TestInfoCollector {
    source_dir: Utf8PathBuf,
    test_source_dir: Utf8PathBuf,
    relevance: RelevantSourceCollector,
}

impl TestInfoCollector {
    /// Creates a collector from the project configuration.
    pub fn from_config(config: &NioConfig) -> Self {
        Self {
            source_dir: config.source_dir(),
            test_source_dir: config.test_source_dir(),
            relevance: RelevantSourceCollector::from_config(config),
        }
    }

    /// Creates a collector for the given source roots.
    pub fn new(
        source_dir: impl Into<Utf8PathBuf>,
        test_source_dir: impl Into<Utf8PathBuf>,
        max_file_lines: usize,
    ) -> Self {
        let source_dir = source_dir.into();
        let test_source_dir = test_source_dir.into();
        let limits = RelevanceLimits {
            max_file_lines,
            ..Default::default()
        };
        Self {
            relevance: RelevantSourceCollector::new(&source_dir, &test_source_dir, limits),
            source_dir,
            test_source_dir,
        }
    }

    /// Collects evidence for the run that wrote `log_path`.
    ///
    /// Artifacts are written next to the log. Running this again on the same log rewrites the
    /// same artifacts.
    pub fn collect(&self, log_path: &Utf8Path) -> Result<TestInfoSummary, CollectError> {
        if !log_path.is_file() {
            return Err(ConfigurationError::RunLogNotFound {
                path: log_path.to_owned(),
            }
            .into());
        }
        for root in [&self.source_dir, &self.test_source_dir] {
            if !root.is_dir() {
                return Err(ConfigurationError::SourceRootMissing { path: root.clone() }.into());
            }
        }
        let run_dir = log_path.parent().unwrap_or(Utf8Path::new("."));

        let source = FailureSource::load(log_path)?;
        let candidates = source.possible_nio_tests();
        write_candidate_list(run_dir, &candidates)?;
        if candidates.is_empty() {
            info!("no possible NIO tests found in {log_path}");
            return Ok(TestInfoSummary {
                run_dir: run_dir.to_owned(),
                candidates,
            });
        }
        info!(
            "found {} possible NIO {}: {}",
            candidates.len(),
            plural::tests_str(candidates.len()),
            candidates.iter().join(", ")
        );

        for candidate in &candidates {
            let identity: TestIdentity = match candidate.parse() {
                Ok(identity) => identity,
                Err(error) => {
                    warn!("skipping {candidate}: {error}");
                    continue;
                }
            };
            let evidence = EvidenceDir::new(run_dir, candidate);
            self.write_reduced_test(&identity, &evidence)?;
            if let Some(prefix) = self.relevance.relevant_file_prefix(candidate) {
                evidence.write_source_code(&prefix)?;
            }
            self.write_stack_traces(&identity, &evidence, source.stack_traces(candidate))?;
        }

        Ok(TestInfoSummary {
            run_dir: run_dir.to_owned(),
            candidates,
        })
    }

    fn write_reduced_test(
        &self,
        test: &TestIdentity,
        evidence: &EvidenceDir,
    ) -> Result<(), CollectError> {
        match reduce_test(&self.test_source_dir, test) {
            Ok(reduced) => {
                evidence.write_buggy_test_method(&reduced)?;
                info!("reduced test source for {test} written to {}", evidence.path());
            }
            Err(error) => warn!("could not reduce {test}: {error}"),
        }
        Ok(())
    }

    fn write_stack_traces(
        &self,
        test: &TestIdentity,
        evidence: &EvidenceDir,
        traces: BTreeMap<u32, String>,
    ) -> Result<(), CollectError> {
        let test_file = self.test_source_dir.join(test.source_relative_path());
        // Read lazily: only needed if some trace points into the test.
        let mut test_source: Option<Option<String>> = None;

        for (run_index, trace) in traces {
            evidence.write_stack_trace(run_index, &trace)?;
            debug!("stack trace of {test} in rerun #{run_index} written");

            let Some(frame) = bug_frame(&trace, test.suite()) else {
                debug!("no frame in {} in the rerun #{run_index} stack trace", test.suite());
                continue;
            };
            let read_test_file = || match std::fs::read_to_string(&test_file) {
                Ok(source) => Some(source),
                Err(error) => {
                    warn!("test file not found: {test_file} ({error})");
                    None
                }
            };
            let Some(source) = test_source.get_or_insert_with(read_test_file) else {
                continue;
            };
            match physical_line(source, frame.line_number) {
                Some(line) => evidence.write_error_line(run_index, line)?,
                None => warn!(
                    "{test_file} has no line {} (from the rerun #{run_index} stack trace)",
                    frame.line_number
                ),
            }
        }
        Ok(())
    }
}

/// What [`TestInfoCollector::collect`] found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestInfoSummary {
    /// The run directory artifacts were written to.
    pub run_dir: Utf8PathBuf,

    /// The possible NIO tests, in the order they were listed.
    pub candidates: Vec<String>,
}

/// Where candidates and stack traces are read from.
#[derive(Debug)]
enum FailureSource {
    Records(RecordedRun),
    TextLog(String),
}

impl FailureSource {
    fn load(log_path: &Utf8Path) -> Result<Self, ConfigurationError> {
        let records_path = log_path.with_file_name(RUN_RECORDS_FILE_NAME);
        if records_path.is_file() {
            debug!("reading run records from {records_path}");
            return Ok(Self::Records(RecordedRun::from_path(&records_path)?));
        }
        debug!("no run records at {records_path}, parsing the text log");
        let text = std::fs::read_to_string(log_path).map_err(|error| {
            ConfigurationError::ReadFile {
                path: log_path.to_owned(),
                error,
            }
        })?;
        Ok(Self::TextLog(text))
    }

    fn possible_nio_tests(&self) -> Vec<String> {
        match self {
            Self::Records(run) => run.possible_nio_tests().to_vec(),
            Self::TextLog(text) => possible_nio_tests(text),
        }
    }

    fn stack_traces(&self, test: &str) -> BTreeMap<u32, String> {
        match self {
            Self::Records(run) => run.stack_traces(test),
            Self::TextLog(text) => stack_traces(text, test),
        }
    }
}
