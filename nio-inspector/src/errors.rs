// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::NO_HEADING_TARGET;
use camino::Utf8PathBuf;
use nio_metadata::NioInspectorExitCode;
use nio_runner::errors::*;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are meant to be printed with
// display_to_stderr, which colorizes them and walks the source chain.

/// An expected failure, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("project directory is not valid UTF-8")]
    ProjectDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("project directory not found")]
    ProjectDirNotFound { path: Utf8PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("configuration error")]
    ConfigurationError {
        #[from]
        err: ConfigurationError,
    },
    #[error("test selector parse error")]
    TestSelectorParseError {
        #[from]
        err: TestSelectorParseError,
    },
    #[error("invalid worker command")]
    WorkerCommandParseError {
        #[from]
        err: SandboxCommandParseError,
    },
    #[error("no sandbox worker configured")]
    NoWorkerCommand,
    #[error("sandbox error")]
    SandboxError {
        #[from]
        err: SandboxError,
    },
    #[error("launch error")]
    LaunchError {
        #[source]
        err: LaunchError,
    },
    #[error("run log write error")]
    RunLogWriteError {
        #[from]
        err: RunLogWriteError,
    },
    #[error("evidence write error")]
    EvidenceWriteError {
        #[from]
        err: EvidenceWriteError,
    },
    #[error("clean error")]
    CleanError {
        #[from]
        err: CleanError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("no tests to run")]
    NoTestsRun,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::ProjectDirInvalidUtf8 { .. }
            | Self::ProjectDirNotFound { .. }
            | Self::ConfigParseError { .. }
            | Self::ConfigurationError { .. }
            | Self::TestSelectorParseError { .. }
            | Self::WorkerCommandParseError { .. }
            | Self::NoWorkerCommand => NioInspectorExitCode::SETUP_ERROR,
            Self::SandboxError { .. } => NioInspectorExitCode::SANDBOX_ERROR,
            Self::LaunchError { .. } => NioInspectorExitCode::LAUNCH_FAILED,
            Self::RunLogWriteError { .. }
            | Self::EvidenceWriteError { .. }
            | Self::CleanError { .. }
            | Self::WriteOutputError { .. } => NioInspectorExitCode::WRITE_OUTPUT_ERROR,
            Self::NoTestsRun => NioInspectorExitCode::NO_TESTS_RUN,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &crate::output::Styles) {
        let bold = styles.bold;
        let mut next_error = match self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::ProjectDirInvalidUtf8 { path } => {
                error!(
                    "project directory `{}` is not valid UTF-8",
                    path.display().style(bold)
                );
                None
            }
            Self::ProjectDirNotFound { path } => {
                error!("project directory `{}` does not exist", path.style(bold));
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(bold)
                );
                err.source()
            }
            Self::ConfigurationError { err } => {
                error!("{err}");
                err.source()
            }
            Self::TestSelectorParseError { err } => {
                error!("{err}");
                None
            }
            Self::WorkerCommandParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::NoWorkerCommand => {
                error!(
                    "no sandbox worker configured (set `{}` in {} or pass `{}`)",
                    "sandbox.command".style(bold),
                    nio_runner::config::NioConfig::CONFIG_PATH,
                    "--worker".style(bold),
                );
                None
            }
            Self::SandboxError { err } => {
                error!("failed to set up the sandbox: {err}");
                err.source()
            }
            Self::LaunchError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunLogWriteError { err } => {
                error!("{err}");
                err.source()
            }
            Self::EvidenceWriteError { err } => {
                error!("error writing evidence to `{}`", err.path().style(bold));
                err.source()
            }
            Self::CleanError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::NoTestsRun => {
                error!("no test classes were selected to run (--fail-on-empty was passed)");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

impl From<RerunError> for ExpectedError {
    fn from(err: RerunError) -> Self {
        match err {
            RerunError::Launch(err) => Self::LaunchError { err },
            RerunError::RunLog(err) => Self::RunLogWriteError { err },
        }
    }
}

impl From<CollectError> for ExpectedError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Configuration(err) => Self::ConfigurationError { err },
            CollectError::Write(err) => Self::EvidenceWriteError { err },
        }
    }
}
