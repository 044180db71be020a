// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line parsing and dispatch.

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter, Styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use nio_runner::{
    clean::{CleanOutcome, clean_output_dir},
    config::{DefaultConfigWarnings, NioConfig, SandboxCommand},
    errors::{ConfigurationError, RerunError},
    evidence::TestInfoCollector,
    helpers::plural,
    relevance::RelevantSourceCollector,
    rerun::{Classification, RerunEngine, RerunReport},
    run_log::{RunDir, RunLog},
    sandbox::SandboxBuilder,
    selection::TestSelection,
};
use owo_colors::OwoColorize;
use std::io::Write;
use tracing::{info, warn};

/// Finds tests that pass on their own but fail when rerun in the same process, and collects
/// evidence for fixing them.
///
/// A typical session runs `rerun`, then `collect-test-info` on the newest run, then (once
/// `agent_response` files have been written for each candidate) `collect-relevant-source-code`.
#[derive(Debug, Parser)]
#[command(
    name = "nio-inspector",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct NioInspectorApp {
    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl NioInspectorApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.common.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let project_root = self.common.project_root()?;
        let config = self.common.make_config(&project_root)?;

        match self.command {
            Command::Rerun(opts) => opts.exec(&config, output, output_writer),
            Command::CollectTestInfo(opts) => {
                let log_path = opts.log_path(&config)?;
                let summary = TestInfoCollector::from_config(&config).collect(&log_path)?;

                let styles = output.stdout_styles();
                let mut writer = output_writer.stdout_writer();
                write_output(|| {
                    writeln!(
                        writer,
                        "{} possible NIO {} in {}",
                        summary.candidates.len().style(styles.bold),
                        plural::tests_str(summary.candidates.len()),
                        summary.run_dir,
                    )?;
                    for candidate in &summary.candidates {
                        writeln!(writer, "  {}", candidate.style(styles.nio))?;
                    }
                    writer.flush()
                })?;
                Ok(0)
            }
            Command::CollectRelevantSourceCode(opts) => {
                let log_path = opts.log_path(&config)?;
                let run_dir = run_dir_of(&log_path)?;
                let summary = RelevantSourceCollector::from_config(&config).collect(run_dir)?;

                let styles = output.stdout_styles();
                let mut writer = output_writer.stdout_writer();
                write_output(|| {
                    writeln!(
                        writer,
                        "wrote relevant source for {} {} in {}",
                        summary.written.style(styles.bold),
                        plural::tests_str(summary.written),
                        run_dir,
                    )?;
                    if summary.directly_fixable > 0 {
                        writeln!(
                            writer,
                            "  {} directly fixable",
                            summary.directly_fixable.style(styles.bold)
                        )?;
                    }
                    if summary.skipped > 0 {
                        writeln!(
                            writer,
                            "  {} skipped",
                            summary.skipped.style(styles.nd)
                        )?;
                    }
                    writer.flush()
                })?;
                Ok(0)
            }
            Command::Clean => {
                let output_dir = config.output_dir();
                if clean_output_dir(&output_dir)? == CleanOutcome::Removed {
                    let mut writer = output_writer.stdout_writer();
                    write_output(|| {
                        writeln!(writer, "removed {output_dir}")?;
                        writer.flush()
                    })?;
                }
                Ok(0)
            }
        }
    }
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// The project to inspect [default: the current directory]
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "NIO_INSPECTOR_PROJECT_DIR"
    )]
    project_dir: Option<Utf8PathBuf>,

    /// Config file [default: <project-dir>/.config/nio-inspector.toml]
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "NIO_INSPECTOR_CONFIG_FILE"
    )]
    config_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,
}

impl CommonOpts {
    fn project_root(&self) -> Result<Utf8PathBuf> {
        let project_root = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => {
                let current_dir = std::env::current_dir()
                    .map_err(|error| ExpectedError::CurrentDirFailed { error })?;
                Utf8PathBuf::try_from(current_dir).map_err(|error| {
                    ExpectedError::ProjectDirInvalidUtf8 {
                        path: error.into_path_buf(),
                    }
                })?
            }
        };
        if !project_root.is_dir() {
            return Err(ExpectedError::ProjectDirNotFound { path: project_root });
        }
        Ok(project_root)
    }

    fn make_config(&self, project_root: &Utf8Path) -> Result<NioConfig> {
        let config = NioConfig::from_sources(
            project_root,
            self.config_file.as_deref(),
            &mut DefaultConfigWarnings,
        )?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run tests once, rerun them in the same sandbox, and classify the flaky ones
    ///
    /// A test that passes in the initial run and then fails in every rerun is a possible NIO
    /// (non-idempotent-outcome) test. One that fails in only some reruns is non-deterministic.
    /// Results are written to a new time-stamped directory under the output directory.
    Rerun(RerunOpts),

    /// Extract stack traces, failing lines and reduced test sources for possible NIO tests
    CollectTestInfo(LogFileOpts),

    /// Answer each candidate's agent_response with the most relevant production source
    CollectRelevantSourceCode(LogFileOpts),

    /// Delete the output directory
    Clean,
}

#[derive(Debug, Args)]
struct RerunOpts {
    /// Tests to run: a comma-separated list of `Class`, `Class#method` or `Class#m1+m2`
    /// [default: every class under the test output directory]
    #[arg(long, short = 't', value_name = "LIST", env = "NIO_INSPECTOR_TEST")]
    test: Option<String>,

    /// Number of reruns after the initial run [default: rerun.count from config]
    #[arg(
        long,
        value_name = "N",
        env = "NIO_INSPECTOR_NUM_RERUNS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    num_reruns: Option<u32>,

    /// Sandbox worker command [default: sandbox.command from config]
    #[arg(long, value_name = "CMD", env = "NIO_INSPECTOR_WORKER")]
    worker: Option<String>,

    /// Exit with an error if no test classes are selected
    #[arg(long)]
    fail_on_empty: bool,
}

impl RerunOpts {
    fn exec(
        self,
        config: &NioConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let selection = match &self.test {
            Some(test) => test.parse::<TestSelection>()?,
            None => TestSelection::discover(&config.test_output_dir(), config.excludes())?,
        };
        if selection.is_empty() {
            if self.fail_on_empty {
                return Err(ExpectedError::NoTestsRun);
            }
            warn!("no test classes selected");
        }

        let command = match &self.worker {
            Some(worker) => worker.parse::<SandboxCommand>()?,
            None => config
                .sandbox_command()
                .cloned()
                .ok_or(ExpectedError::NoWorkerCommand)?,
        };
        let rerun_count = self.num_reruns.unwrap_or_else(|| config.rerun_count());

        let run_dir = RunDir::create(&config.output_dir(), chrono::Local::now())?;
        let mut log = RunLog::create(&run_dir)?;
        let mut sandbox = SandboxBuilder::from_config(config, &command).build()?;
        info!(
            "running {} test {} with {rerun_count} {}",
            selection.len(),
            plural::classes_str(selection.len()),
            plural::reruns_str(rerun_count as usize),
        );

        let report = RerunEngine::new(rerun_count).execute(&mut sandbox, &selection, &mut log);
        // Shut the worker down even if the run failed; the run error is the one to report.
        if let Err(error) = sandbox.shutdown() {
            warn!("error shutting down sandbox worker: {error}");
        }
        let report = finish_run(report, log)?;

        let styles = output.stdout_styles();
        let mut writer = output_writer.stdout_writer();
        write_output(|| {
            write_report(&report, run_dir.path(), &styles, output.verbose, &mut writer)?;
            writer.flush()
        })?;
        Ok(0)
    }
}

/// Flushes the run log, keeping whatever the engine wrote before an error.
///
/// An engine error takes precedence over a failure to flush.
fn finish_run<W: Write>(
    report: std::result::Result<RerunReport, RerunError>,
    log: RunLog<W>,
) -> Result<RerunReport> {
    match report {
        Ok(report) => {
            log.finish()?;
            Ok(report)
        }
        Err(error) => {
            if let Err(flush_error) = log.finish() {
                warn!("error flushing run log: {flush_error}");
            }
            Err(error.into())
        }
    }
}

fn write_report(
    report: &RerunReport,
    run_dir: &Utf8Path,
    styles: &Styles,
    verbose: bool,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(writer, "results written to {}", run_dir.style(styles.bold))?;
    if verbose {
        let per_run = report
            .run_counts()
            .iter()
            .map(|counts| format!("{}/{}", counts.failed, counts.found))
            .join(", ");
        writeln!(writer, "failed per run: {per_run}")?;
    }

    let total = report.rerun_count();
    for (classification, label, style) in [
        (Classification::Nio, "possible NIO", styles.nio),
        (Classification::Nd, "non-deterministic", styles.nd),
    ] {
        let tests: Vec<_> = report.classified(classification).collect();
        if tests.is_empty() {
            continue;
        }
        writeln!(
            writer,
            "{} {label} {}:",
            tests.len().style(style),
            plural::tests_str(tests.len())
        )?;
        for (identity, failed) in tests {
            writeln!(writer, "  {identity} (failed in {failed} of {total} reruns)")?;
        }
    }
    if report.classified(Classification::Nio).next().is_none()
        && report.classified(Classification::Nd).next().is_none()
    {
        writeln!(writer, "no flaky tests found")?;
    }
    Ok(())
}

#[derive(Debug, Args)]
struct LogFileOpts {
    /// Run log to read [default: the newest run under the output directory]
    #[arg(long, value_name = "PATH", env = "NIO_INSPECTOR_LOG_FILE")]
    log_file: Option<Utf8PathBuf>,
}

impl LogFileOpts {
    fn log_path(&self, config: &NioConfig) -> Result<Utf8PathBuf> {
        match &self.log_file {
            Some(log_file) => Ok(log_file.clone()),
            None => Ok(RunDir::most_recent(&config.output_dir())?.log_path()),
        }
    }
}

fn run_dir_of(log_path: &Utf8Path) -> Result<&Utf8Path> {
    match log_path.parent() {
        Some(parent) if log_path.is_file() => Ok(parent),
        _ => Err(ConfigurationError::RunLogNotFound {
            path: log_path.to_owned(),
        }
        .into()),
    }
}

fn write_output(f: impl FnOnce() -> std::io::Result<()>) -> Result<()> {
    f().map_err(|err| ExpectedError::WriteOutputError { err })
}
