// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading candidates and stack traces from structured run records.

use crate::{errors::ConfigurationError, helpers::split_lines};
use camino::Utf8Path;
use indexmap::IndexMap;
use nio_metadata::run_record::{RecordedClassification, RunRecord};
use std::collections::BTreeMap;

/// Candidates and per-rerun stack traces recovered from `rerun-results.jsonl`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordedRun {
    candidates: Vec<String>,
    traces: IndexMap<String, BTreeMap<u32, String>>,
}

impl RecordedRun {
    /// Reads and parses a records file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigurationError> {
        let contents =
            std::fs::read_to_string(path).map_err(|error| ConfigurationError::ReadFile {
                path: path.to_owned(),
                error,
            })?;
        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|error| {
                ConfigurationError::MalformedRunRecord {
                    path: path.to_owned(),
                    line_number: index + 1,
                    error,
                }
            })?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    /// Builds the view from records in the order they were written.
    pub fn from_records(records: impl IntoIterator<Item = RunRecord>) -> Self {
        let mut run = Self::default();
        for record in records {
            match record {
                RunRecord::TestFailed {
                    run_index,
                    test,
                    message,
                    stack_trace,
                    ..
                } if run_index > 0 => {
                    let Some(text) = stack_trace.or(message) else {
                        continue;
                    };
                    // Matches what the text log preserves of the same trace.
                    let mut trace = String::new();
                    for line in split_lines(&text) {
                        trace.push_str(line);
                        trace.push('\n');
                    }
                    run.traces
                        .entry(test)
                        .or_default()
                        .entry(run_index)
                        .or_insert(trace);
                }
                RunRecord::Classified {
                    test,
                    classification: RecordedClassification::Nio,
                    ..
                } => run.candidates.push(test),
                _ => {}
            }
        }
        run
    }

    /// Returns the possible NIO tests, in the order they were classified.
    pub fn possible_nio_tests(&self) -> &[String] {
        &self.candidates
    }

    /// Returns the stack traces `test` failed with, keyed by rerun index.
    pub fn stack_traces(&self, test: &str) -> BTreeMap<u32, String> {
        self.traces.get(test).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::log_parser;
    use crate::{
        launcher::scripted::ScriptedLauncher, rerun::RerunEngine, run_log::RunLog,
        selection::TestSelection,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn records_agree_with_text_log() {
        let mut launcher = ScriptedLauncher::new()
            .with_class("a.B")
            .with_test("[engine:junit-jupiter]/[class:a.B]/[method:nio()]", [true, false, false])
            .with_test("[engine:junit-jupiter]/[class:a.B]/[method:nd()]", [true, true, false])
            .with_test("[engine:junit-jupiter]/[class:a.B]/[method:broken()]", [false; 3]);
        let selection: TestSelection = "a.B".parse().expect("valid selection");
        let mut log = RunLog::new(Vec::new(), "text", Vec::new(), "records");
        RerunEngine::new(2)
            .execute(&mut launcher, &selection, &mut log)
            .expect("engine succeeds");
        let (text, records) = log.finish().expect("flushes");
        let text = String::from_utf8(text).expect("utf-8");
        let records: Vec<RunRecord> = String::from_utf8(records)
            .expect("utf-8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid record"))
            .collect();
        let recorded = RecordedRun::from_records(records);

        assert_eq!(recorded.possible_nio_tests(), ["a.B#nio".to_owned()]);
        assert_eq!(
            recorded.possible_nio_tests(),
            log_parser::possible_nio_tests(&text).as_slice()
        );
        for test in ["a.B#nio", "a.B#nd", "a.B#broken"] {
            assert_eq!(
                recorded.stack_traces(test),
                log_parser::stack_traces(&text, test),
                "traces for {test}"
            );
        }
        assert_eq!(recorded.stack_traces("a.B#nio").len(), 2);
    }
}
