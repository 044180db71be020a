// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run log: a line-oriented transcript of one rerun invocation.
//!
//! Every tagged line starts with `[INFO] `, `[WARN] ` or `[ERROR] `. Raw exception text follows a
//! `Failure message:` line with no tag at all, and the only way to tell where it ends is that a
//! tagged line resumes. Section banners, the `Failing Test: ` prefix and the classification
//! suffix are the structural contract that [`evidence`](crate::evidence) parses back.
//!
//! Alongside the text log, [`RunRecord`]s are written to `rerun-results.jsonl`.

use crate::errors::{ConfigurationError, RunLogWriteError};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, NaiveDateTime};
use nio_metadata::run_record::{RUN_RECORDS_FILE_NAME, RunRecord};
use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
};
use tracing::{debug, error, info, warn};

/// The file name of the text run log.
pub const RUN_LOG_FILE_NAME: &str = "rerun-results.log";

/// Marks the start of the baseline run.
pub const INITIAL_RUN_MARKER: &str = "Starting the Initial Run of Test";

/// Marks the start of a rerun; followed by the rerun index.
pub const RERUN_MARKER: &str = "Starting Rerun #";

/// Marks the start of the final results.
pub const FINAL_RESULTS_MARKER: &str = "Final Results";

/// Prefix of the line that names a failing test.
pub const FAILING_TEST_PREFIX: &str = "Failing Test: ";

/// The line after which raw exception text follows.
pub const FAILURE_MESSAGE_LINE: &str = "Failure message:";

/// Separates a classified test from its tally in the final results.
pub const CLASSIFICATION_SUFFIX: &str = " (passed in the initial run but failed in ";

/// Reported when no test was classified.
pub const NO_FLAKY_TESTS_FOUND: &str = "No Flaky Tests Found";

/// Precedes the number of NIO tests.
pub const NIO_COUNT_PREFIX: &str = "Number of Possible NIO Test(s) Found: ";

/// Precedes the number of ND tests.
pub const ND_COUNT_PREFIX: &str = "Number of Non-deterministic Flaky Test(s) Found: ";

/// Returns the banner line for the baseline run.
pub fn initial_run_banner() -> String {
    format!("===================={INITIAL_RUN_MARKER}====================")
}

/// Returns the banner line for rerun `index`.
pub fn rerun_banner(index: u32) -> String {
    format!("======================={RERUN_MARKER}{index}=========================")
}

/// Returns the banner line for the final results.
pub fn final_results_banner() -> String {
    format!("========================={FINAL_RESULTS_MARKER}=========================")
}

/// Returns the final-results line for a classified test.
pub fn classification_line(test: impl fmt::Display, failed: u32, total: u32) -> String {
    format!("{test}{CLASSIFICATION_SUFFIX}{failed} out of {total} reruns)")
}

/// The level a run log line is tagged with.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LogLevel {
    /// Progress and summaries.
    Info,

    /// Failures and degraded conditions.
    Warn,

    /// Possible NIO tests.
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 3] = [LogLevel::Info, LogLevel::Warn, LogLevel::Error];

    /// Returns the tag this level's lines start with, including the trailing space.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Info => "[INFO] ",
            Self::Warn => "[WARN] ",
            Self::Error => "[ERROR] ",
        }
    }

    /// Splits a tagged line into its level and message.
    pub fn split_line(line: &str) -> Option<(Self, &str)> {
        Self::ALL.into_iter().find_map(|level| {
            let prefix = level.prefix();
            // An empty message is written as the bare tag.
            if line.trim_end() == prefix.trim_end() {
                return Some((level, ""));
            }
            line.strip_prefix(prefix).map(|rest| (level, rest))
        })
    }

    /// Returns true if `line` starts with any level tag.
    pub fn is_tagged(line: &str) -> bool {
        Self::split_line(line).is_some()
    }
}

/// A time-stamped directory holding the artifacts of one rerun invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunDir {
    path: Utf8PathBuf,
}

impl RunDir {
    /// The format of run directory names.
    pub const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d-%H-%M-%S";

    /// Creates the run directory for an invocation started at `now`.
    pub fn create(output_dir: &Utf8Path, now: DateTime<Local>) -> Result<Self, RunLogWriteError> {
        let path = output_dir.join(now.format(Self::TIMESTAMP_FORMAT).to_string());
        std::fs::create_dir_all(&path).map_err(|error| RunLogWriteError::CreateDir {
            path: path.clone(),
            error,
        })?;
        Ok(Self { path })
    }

    /// Wraps an existing directory.
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Finds the most recent run directory under `output_dir`, judged by the timestamp in its
    /// name, and checks that it contains a run log.
    pub fn most_recent(output_dir: &Utf8Path) -> Result<Self, ConfigurationError> {
        let no_runs = || ConfigurationError::NoRunDirectories {
            output_dir: output_dir.to_owned(),
        };
        let entries = match output_dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Err(no_runs()),
            Err(error) => {
                return Err(ConfigurationError::ReadFile {
                    path: output_dir.to_owned(),
                    error,
                });
            }
        };

        let mut newest: Option<(NaiveDateTime, Utf8PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|error| ConfigurationError::ReadFile {
                path: output_dir.to_owned(),
                error,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(timestamp) =
                NaiveDateTime::parse_from_str(entry.file_name(), Self::TIMESTAMP_FORMAT)
            else {
                warn!(
                    "ignoring directory {} in {output_dir}: name is not a run timestamp",
                    entry.file_name()
                );
                continue;
            };
            if newest.as_ref().is_none_or(|(current, _)| timestamp > *current) {
                newest = Some((timestamp, entry.into_path()));
            }
        }

        let (_, path) = newest.ok_or_else(no_runs)?;
        let run_dir = Self { path };
        let log_path = run_dir.log_path();
        if !log_path.is_file() {
            return Err(ConfigurationError::RunLogNotFound { path: log_path });
        }
        debug!("using most recent run log at {log_path}");
        Ok(run_dir)
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the path of the text run log.
    pub fn log_path(&self) -> Utf8PathBuf {
        self.path.join(RUN_LOG_FILE_NAME)
    }

    /// Returns the path of the structured run records.
    pub fn records_path(&self) -> Utf8PathBuf {
        self.path.join(RUN_RECORDS_FILE_NAME)
    }
}

/// Writes the text run log and the structured run records.
///
/// Every text line is mirrored to `tracing` at the matching level.
#[derive(Debug)]
pub struct RunLog<W = BufWriter<File>> {
    text: W,
    text_path: Utf8PathBuf,
    records: W,
    records_path: Utf8PathBuf,
}

impl RunLog<BufWriter<File>> {
    /// Creates the run log files inside `run_dir`, truncating existing ones.
    pub fn create(run_dir: &RunDir) -> Result<Self, RunLogWriteError> {
        let open = |path: Utf8PathBuf| {
            File::create(&path)
                .map(|file| (BufWriter::new(file), path.clone()))
                .map_err(|error| RunLogWriteError::Write { path, error })
        };
        let (text, text_path) = open(run_dir.log_path())?;
        let (records, records_path) = open(run_dir.records_path())?;
        Ok(Self {
            text,
            text_path,
            records,
            records_path,
        })
    }
}

impl<W: Write> RunLog<W> {
    /// Creates a run log over arbitrary writers. The paths are only used in error messages.
    pub fn new(
        text: W,
        text_path: impl Into<Utf8PathBuf>,
        records: W,
        records_path: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            text,
            text_path: text_path.into(),
            records,
            records_path: records_path.into(),
        }
    }

    /// Writes a tagged line.
    pub fn line(
        &mut self,
        level: LogLevel,
        message: impl fmt::Display,
    ) -> Result<(), RunLogWriteError> {
        let message = message.to_string();
        match level {
            LogLevel::Info => info!(target: "nio_runner::run_log", "{message}"),
            LogLevel::Warn => warn!(target: "nio_runner::run_log", "{message}"),
            LogLevel::Error => error!(target: "nio_runner::run_log", "{message}"),
        }
        let result = if message.is_empty() {
            writeln!(self.text, "{}", level.prefix().trim_end())
        } else {
            writeln!(self.text, "{}{message}", level.prefix())
        };
        result.map_err(|error| self.text_error(error))
    }

    /// Writes an `[INFO]` line.
    pub fn info(&mut self, message: impl fmt::Display) -> Result<(), RunLogWriteError> {
        self.line(LogLevel::Info, message)
    }

    /// Writes a `[WARN]` line.
    pub fn warn(&mut self, message: impl fmt::Display) -> Result<(), RunLogWriteError> {
        self.line(LogLevel::Warn, message)
    }

    /// Writes an `[ERROR]` line.
    pub fn error(&mut self, message: impl fmt::Display) -> Result<(), RunLogWriteError> {
        self.line(LogLevel::Error, message)
    }

    /// Writes untagged text, such as an exception and its stack trace.
    pub fn raw(&mut self, text: &str) -> Result<(), RunLogWriteError> {
        for line in text.lines() {
            debug!(target: "nio_runner::run_log", "{line}");
            writeln!(self.text, "{line}").map_err(|error| self.text_error(error))?;
        }
        Ok(())
    }

    /// Writes a structured record.
    pub fn record(&mut self, record: &RunRecord) -> Result<(), RunLogWriteError> {
        let line = serde_json::to_string(record).map_err(RunLogWriteError::Serialize)?;
        writeln!(self.records, "{line}").map_err(|error| RunLogWriteError::Write {
            path: self.records_path.clone(),
            error,
        })
    }

    /// Flushes both outputs and returns the underlying writers.
    pub fn finish(mut self) -> Result<(W, W), RunLogWriteError> {
        self.text.flush().map_err(|error| self.text_error(error))?;
        self.records
            .flush()
            .map_err(|error| RunLogWriteError::Write {
                path: self.records_path.clone(),
                error,
            })?;
        Ok((self.text, self.records))
    }

    fn text_error(&self, error: io::Error) -> RunLogWriteError {
        RunLogWriteError::Write {
            path: self.text_path.clone(),
            error,
        }
    }
}
