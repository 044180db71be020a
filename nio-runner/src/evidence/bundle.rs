// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence artifacts on disk.
//!
//! Evidence for a run lives next to its run log. The candidate list is written at the top of the
//! run directory, and every candidate `suite#case` gets a `suite.case/` directory holding its
//! artifacts.

use crate::errors::{ConfigurationError, EvidenceWriteError};
use atomicwrites::{AllowOverwrite, AtomicFile};
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, io, io::Write};

/// The name of the candidate list, one `suite#case` per line.
pub const POSSIBLE_NIO_LIST_FILE_NAME: &str = "possible-NIO-list.txt";

/// The name of the reduced test source artifact.
pub const BUGGY_TEST_METHOD_FILE_NAME: &str = "buggyTestMethod";

/// The name of the relevant production source artifact.
pub const SOURCE_CODE_FILE_NAME: &str = "sourceCode";

/// The name of the file a downstream consumer writes to request relevant source.
pub const AGENT_RESPONSE_FILE_NAME: &str = "agent_response";

const STACK_TRACE_PREFIX: &str = "stacktrace";
const ERROR_LINE_PREFIX: &str = "error_line";

/// Writes the candidate list into `run_dir`.
pub fn write_candidate_list(
    run_dir: &Utf8Path,
    candidates: &[String],
) -> Result<(), EvidenceWriteError> {
    let mut contents = String::new();
    for candidate in candidates {
        contents.push_str(candidate);
        contents.push('\n');
    }
    write_atomic(&run_dir.join(POSSIBLE_NIO_LIST_FILE_NAME), &contents)
}

/// Reads the candidate list from `run_dir`. Blank lines are skipped.
pub fn read_candidate_list(run_dir: &Utf8Path) -> Result<Vec<String>, ConfigurationError> {
    let path = run_dir.join(POSSIBLE_NIO_LIST_FILE_NAME);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigurationError::CandidateListMissing { path });
        }
        Err(error) => return Err(ConfigurationError::ReadFile { path, error }),
    };
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// The evidence directory of one candidate test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvidenceDir {
    path: Utf8PathBuf,
}

impl EvidenceDir {
    /// Returns the evidence directory for `test` (a `suite#case` string) under `run_dir`.
    pub fn new(run_dir: &Utf8Path, test: &str) -> Self {
        Self {
            path: run_dir.join(test.replace('#', ".")),
        }
    }

    /// Returns the path to the directory.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the path to the consumer's response file.
    pub fn agent_response_path(&self) -> Utf8PathBuf {
        self.path.join(AGENT_RESPONSE_FILE_NAME)
    }

    /// Writes the stack trace captured in rerun `run_index`.
    pub fn write_stack_trace(&self, run_index: u32, trace: &str) -> Result<(), EvidenceWriteError> {
        self.write(&format!("{STACK_TRACE_PREFIX}{run_index}"), trace)
    }

    /// Writes the test source line that rerun `run_index` failed at.
    pub fn write_error_line(&self, run_index: u32, line: &str) -> Result<(), EvidenceWriteError> {
        self.write(&format!("{ERROR_LINE_PREFIX}{run_index}"), line)
    }

    /// Writes the reduced test source.
    pub fn write_buggy_test_method(&self, source: &str) -> Result<(), EvidenceWriteError> {
        self.write(BUGGY_TEST_METHOD_FILE_NAME, source)
    }

    /// Writes the relevant production source, replacing any earlier selection.
    pub fn write_source_code(&self, source: &str) -> Result<(), EvidenceWriteError> {
        self.write(SOURCE_CODE_FILE_NAME, source)
    }

    /// Reads every artifact in the directory.
    pub fn read_bundle(&self) -> io::Result<EvidenceBundle> {
        let mut bundle = EvidenceBundle::default();
        if !self.path.is_dir() {
            return Ok(bundle);
        }
        for entry in self.path.read_dir_utf8()? {
            let entry = entry?;
            let name = entry.file_name();
            let contents = || std::fs::read_to_string(entry.path());
            if let Some(index) = indexed(name, STACK_TRACE_PREFIX) {
                bundle.stack_traces.insert(index, contents()?);
            } else if let Some(index) = indexed(name, ERROR_LINE_PREFIX) {
                bundle.error_lines.insert(index, contents()?);
            } else if name == BUGGY_TEST_METHOD_FILE_NAME {
                bundle.buggy_test_method = Some(contents()?);
            } else if name == SOURCE_CODE_FILE_NAME {
                bundle.source_code = Some(contents()?);
            }
        }
        Ok(bundle)
    }

    fn write(&self, file_name: &str, contents: &str) -> Result<(), EvidenceWriteError> {
        std::fs::create_dir_all(&self.path).map_err(|error| {
            EvidenceWriteError::new(&self.path, atomicwrites::Error::Internal(error))
        })?;
        write_atomic(&self.path.join(file_name), contents)
    }
}

fn indexed(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?.parse().ok()
}

fn write_atomic(path: &Utf8Path, contents: &str) -> Result<(), EvidenceWriteError> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|file| file.write_all(contents.as_bytes()))
        .map_err(|error| EvidenceWriteError::new(path, error))
}

/// The artifacts collected for one candidate test.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EvidenceBundle {
    /// The stack trace of each rerun the test failed in, keyed by rerun index.
    pub stack_traces: BTreeMap<u32, String>,

    /// The test source line each rerun failed at, keyed by rerun index.
    pub error_lines: BTreeMap<u32, String>,

    /// The reduced test source.
    pub buggy_test_method: Option<String>,

    /// The relevant production source.
    pub source_code: Option<String>,
}
