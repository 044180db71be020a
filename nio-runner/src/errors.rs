// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by nio-inspector.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{env::JoinPathsError, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse nio-inspector config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that produced this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while combining the config layers.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the combined config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// An exclude pattern was not a valid glob.
    #[error("invalid exclude glob `{pattern}`")]
    InvalidExcludeGlob {
        /// The pattern.
        pattern: String,

        /// The underlying error.
        #[source]
        error: globset::Error,
    },
}

/// A sandbox command string could not be split into arguments.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SandboxCommandParseError {
    /// The command had unbalanced quotes.
    #[error("invalid sandbox command `{command}`")]
    Split {
        /// The command string.
        command: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },

    /// The command was empty.
    #[error("sandbox command is empty")]
    Empty,
}

/// An input that an invocation needs is missing or unreadable.
///
/// These errors are fatal for the current command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The run log does not exist.
    #[error("run log not found at `{path}`")]
    RunLogNotFound {
        /// The expected path.
        path: Utf8PathBuf,
    },

    /// The output directory has no invocation directories in it.
    #[error("no rerun results found under `{output_dir}` (run `nio-inspector rerun` first)")]
    NoRunDirectories {
        /// The output directory.
        output_dir: Utf8PathBuf,
    },

    /// A source root does not exist.
    #[error("source root `{path}` does not exist")]
    SourceRootMissing {
        /// The source root.
        path: Utf8PathBuf,
    },

    /// The test output directory does not exist.
    #[error("test output directory `{path}` does not exist (were the tests compiled?)")]
    TestOutputDirMissing {
        /// The test output directory.
        path: Utf8PathBuf,
    },

    /// The candidate list written by test info collection is missing.
    #[error("candidate list not found at `{path}` (run `nio-inspector collect-test-info` first)")]
    CandidateListMissing {
        /// The expected path.
        path: Utf8PathBuf,
    },

    /// A required file could not be read.
    #[error("error reading `{path}`")]
    ReadFile {
        /// The path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A structured run record could not be parsed.
    #[error("malformed run record at `{path}` line {line_number}")]
    MalformedRunRecord {
        /// The records file.
        path: Utf8PathBuf,

        /// The 1-based line number.
        line_number: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error parsing a `--test` selector.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid test selector `{input}`: {reason}")]
pub struct TestSelectorParseError {
    input: String,
    reason: &'static str,
}

impl TestSelectorParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// An error that occurred while setting up or talking to a sandbox.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SandboxError {
    /// Sandboxed code was started outside a sandbox.
    #[error(
        "not running inside a nio-inspector sandbox (environment variable `{env_var}` is not set)"
    )]
    NotInSandbox {
        /// The environment variable that was expected.
        env_var: &'static str,
    },

    /// No sandbox worker command was configured.
    #[error("sandbox worker command is empty (set `sandbox.command` or pass `--worker`)")]
    EmptyCommand,

    /// The classpath entries could not be joined into a single environment variable.
    #[error("error joining classpath entries")]
    JoinClasspath(#[source] JoinPathsError),

    /// The worker process could not be spawned.
    #[error("failed to spawn sandbox worker `{program}`")]
    Spawn {
        /// The program that was spawned.
        program: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The worker closed its output before saying hello.
    #[error("sandbox worker exited before completing the handshake")]
    NoHello,

    /// The worker's first message was not a hello.
    #[error("sandbox worker sent `{received}` instead of a hello message")]
    UnexpectedHandshake {
        /// A description of what was received.
        received: String,
    },

    /// The worker speaks a different protocol version.
    #[error("sandbox worker speaks protocol version {actual}, expected {expected}")]
    ProtocolVersion {
        /// The version this build speaks.
        expected: u32,

        /// The version the worker announced.
        actual: u32,
    },

    /// The worker echoed the wrong token.
    #[error("sandbox worker echoed an unexpected token")]
    TokenMismatch,

    /// The worker claims to be this process.
    #[error("sandbox worker reported pid {pid}, which is the orchestrator's own process")]
    SameProcess {
        /// The reported process ID.
        pid: u32,
    },

    /// Reading from or writing to the worker failed.
    #[error("error communicating with sandbox worker")]
    Io(#[source] io::Error),

    /// The worker sent a line that is not a valid protocol message.
    #[error("sandbox worker sent a malformed message: {line}")]
    Protocol {
        /// The offending line.
        line: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// The test launcher could not be constructed, or could not finish a run.
///
/// No results are trustworthy after this error, so it aborts the invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The sandbox could not be constructed or failed while in use.
    #[error("test launcher failed")]
    Sandbox(#[from] SandboxError),

    /// The launcher exited before finishing.
    #[error("test launcher exited unexpectedly while {during}")]
    Exited {
        /// What the launcher was doing.
        during: String,
    },

    /// The launcher reported a fatal error of its own.
    #[error("test launcher reported an error: {message}")]
    Reported {
        /// The reported message.
        message: String,
    },

    /// The launcher sent a message that makes no sense at this point.
    #[error("test launcher sent an unexpected message while {during}: {received}")]
    UnexpectedMessage {
        /// What the launcher was doing.
        during: String,

        /// A description of the message.
        received: String,
    },
}

/// An error writing the run log or structured run records.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunLogWriteError {
    /// The invocation directory could not be created.
    #[error("error creating run directory `{path}`")]
    CreateDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A write failed.
    #[error("error writing to `{path}`")]
    Write {
        /// The file being written.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A structured record could not be serialized.
    #[error("error serializing run record")]
    Serialize(#[source] serde_json::Error),
}

/// An error that aborts a rerun invocation.
#[derive(Debug, Error)]
pub enum RerunError {
    /// Tests could not be run at all.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The run log could not be written.
    #[error(transparent)]
    RunLog(#[from] RunLogWriteError),
}

/// An error writing an evidence artifact.
#[derive(Debug, Error)]
#[error("error writing evidence artifact `{path}`")]
pub struct EvidenceWriteError {
    path: Utf8PathBuf,
    #[source]
    error: atomicwrites::Error<io::Error>,
}

impl EvidenceWriteError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: atomicwrites::Error<io::Error>) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// Returns the artifact path.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// A test method could not be reduced.
///
/// Evidence collection logs these as warnings and carries on with the next artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestReductionError {
    /// The test's source file does not exist.
    #[error("test file not found: `{path}`")]
    TestFileNotFound {
        /// The expected path.
        path: Utf8PathBuf,
    },

    /// A source file could not be read.
    #[error("error reading `{path}`")]
    ReadFile {
        /// The path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Neither the test class nor any of its parents declares the method.
    #[error("test method not found: {method} in {suite}")]
    MethodNotFound {
        /// The test method.
        method: String,

        /// The test class.
        suite: String,
    },

    /// The test class extends a class whose source is not under the test source directory.
    #[error("parent test class `{parent}` not found under `{test_source_dir}`")]
    ParentNotFound {
        /// The simple name of the parent class.
        parent: String,

        /// The directory that was searched.
        test_source_dir: Utf8PathBuf,
    },
}

/// An error that aborts evidence collection or relevant source collection.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A required input is missing.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// An artifact could not be written.
    #[error(transparent)]
    Write(#[from] EvidenceWriteError),
}

/// A Java source file could not be parsed structurally.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("line {line}: {message}")]
pub struct JavaParseError {
    line: usize,
    message: String,
}

impl JavaParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Returns the 1-based line the error was detected at.
    pub fn line(&self) -> usize {
        self.line
    }
}

/// An error removing the output directory.
#[derive(Debug, Error)]
#[error("error removing output directory `{path}`")]
pub struct CleanError {
    path: Utf8PathBuf,
    #[source]
    error: io::Error,
}

impl CleanError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}
