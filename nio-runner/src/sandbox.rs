// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The isolation boundary.
//!
//! Tests never run in the orchestrator's process. Instead, [`SandboxBuilder::build`] spawns a
//! worker process that:
//!
//! * starts from a cleared environment, with only an explicit allowlist of variables, the closed
//!   set of classpath entries and a fresh per-invocation token passed through;
//! * proves it was started by this mechanism by echoing the token back in its hello message.
//!
//! Tests share the worker's standard output with the protocol. Output that is not a prefixed
//! protocol message is logged at debug level and otherwise ignored.
//!
//! A fresh process has no static state left over from any earlier invocation. Within one
//! invocation, the baseline and every rerun share the same worker, so state that a test corrupts
//! stays corrupted for the runs that follow.
//!
//! The worker side of the protocol lives in [`worker`].

pub mod worker;

use crate::{
    config::{NioConfig, SandboxCommand},
    errors::{LaunchError, SandboxError},
    launcher::{DiscoveryRequest, ExecutionListener, ResolvedClasses, TestLauncher},
};
use camino::Utf8PathBuf;
use debug_ignore::DebugIgnore;
use nio_metadata::protocol::{
    PROTOCOL_VERSION, SANDBOX_CLASSPATH_ENV, SANDBOX_TOKEN_ENV, SandboxRequest, SandboxResponse,
    split_message_line,
};
use std::{
    env,
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};
use tracing::{debug, warn};

/// Builds a [`Sandbox`].
#[derive(Clone, Debug)]
pub struct SandboxBuilder {
    program: Utf8PathBuf,
    args: Vec<String>,
    classpath: Vec<Utf8PathBuf>,
    inherit_env: Vec<String>,
    current_dir: Option<Utf8PathBuf>,
}

impl SandboxBuilder {
    /// Creates a builder for a worker started with `program` and `args`.
    pub fn new(
        program: impl Into<Utf8PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            classpath: Vec::new(),
            inherit_env: Vec::new(),
            current_dir: None,
        }
    }

    /// Creates a builder from the project config and the worker command to use.
    pub fn from_config(config: &NioConfig, command: &SandboxCommand) -> Self {
        let mut builder = Self::new(
            command.resolve_program(config.project_root()),
            command.args().iter().cloned(),
        );
        builder
            .set_classpath(config.classpath())
            .set_inherit_env(config.inherit_env().iter().cloned())
            .set_current_dir(config.project_root());
        builder
    }

    /// Sets the classpath entries visible inside the sandbox.
    pub fn set_classpath(&mut self, entries: impl IntoIterator<Item = Utf8PathBuf>) -> &mut Self {
        self.classpath = entries.into_iter().collect();
        self
    }

    /// Sets the environment variables passed through to the sandbox.
    pub fn set_inherit_env(&mut self, names: impl IntoIterator<Item = String>) -> &mut Self {
        self.inherit_env = names.into_iter().collect();
        self
    }

    /// Sets the worker's working directory.
    pub fn set_current_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Spawns the worker and completes the handshake.
    pub fn build(&self) -> Result<Sandbox, SandboxError> {
        if self.program.as_str().is_empty() {
            return Err(SandboxError::EmptyCommand);
        }

        let token = generate_token();
        let classpath = env::join_paths(&self.classpath).map_err(SandboxError::JoinClasspath)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        for name in &self.inherit_env {
            if let Some(value) = env::var_os(name) {
                command.env(name, value);
            }
        }
        command
            .env(SANDBOX_CLASSPATH_ENV, classpath)
            .env(SANDBOX_TOKEN_ENV, &token);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        debug!(
            "spawning sandbox worker: {}",
            shell_words::join(
                std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
            )
        );
        let mut child = command.spawn().map_err(|error| SandboxError::Spawn {
            program: self.program.to_string(),
            error,
        })?;

        // Both are present because they were configured as piped above.
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SandboxError::NoHello);
        };

        let mut sandbox = Sandbox {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            token: DebugIgnore(token),
            finished: false,
        };
        // On failure, dropping the sandbox kills the worker.
        sandbox.handshake()?;
        Ok(sandbox)
    }
}

fn generate_token() -> String {
    format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

/// A running sandbox worker.
///
/// Dropping a sandbox without calling [`Sandbox::shutdown`] kills the worker.
#[derive(Debug)]
pub struct Sandbox {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    token: DebugIgnore<String>,
    finished: bool,
}

impl Sandbox {
    /// Returns the worker's process ID.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Asks the worker to exit and waits for it.
    pub fn shutdown(mut self) -> Result<(), SandboxError> {
        self.send(&SandboxRequest::Shutdown)?;
        // Closing stdin lets workers that ignore the request exit on end of input.
        self.stdin.take();
        let status = self.child.wait().map_err(SandboxError::Io)?;
        self.finished = true;
        if !status.success() {
            warn!("sandbox worker exited with {status}");
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), SandboxError> {
        let response = loop {
            let Some(line) = self.read_line()? else {
                return Err(SandboxError::NoHello);
            };
            if let Some(response) = parse_line(&line)? {
                break response;
            }
            // Workers speaking version 1 send an unprefixed hello and then wait for requests.
            if let Ok(SandboxResponse::Hello {
                protocol_version, ..
            }) = serde_json::from_str(line.trim())
            {
                return Err(SandboxError::ProtocolVersion {
                    expected: PROTOCOL_VERSION,
                    actual: protocol_version,
                });
            }
        };
        match response {
            SandboxResponse::Hello {
                protocol_version,
                token,
                pid,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(SandboxError::ProtocolVersion {
                        expected: PROTOCOL_VERSION,
                        actual: protocol_version,
                    });
                }
                if token != *self.token {
                    return Err(SandboxError::TokenMismatch);
                }
                if pid == std::process::id() {
                    return Err(SandboxError::SameProcess { pid });
                }
                debug!("sandbox worker {pid} is ready");
                Ok(())
            }
            other => Err(SandboxError::UnexpectedHandshake {
                received: response_kind(&other).to_owned(),
            }),
        }
    }

    fn send(&mut self, request: &SandboxRequest) -> Result<(), SandboxError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sandbox worker input is closed",
            ))
        })?;
        let mut line = serde_json::to_string(request).map_err(|error| SandboxError::Protocol {
            line: format!("{request:?}"),
            error,
        })?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).map_err(SandboxError::Io)?;
        stdin.flush().map_err(SandboxError::Io)
    }

    /// Reads the next message, skipping test output. Returns `Ok(None)` when the worker closes
    /// its output.
    fn recv(&mut self) -> Result<Option<SandboxResponse>, SandboxError> {
        while let Some(line) = self.read_line()? {
            if let Some(response) = parse_line(&line)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    // Returns the next line without its terminator, or `None` at end of output.
    fn read_line(&mut self) -> Result<Option<String>, SandboxError> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).map_err(SandboxError::Io)?;
        if read == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(len);
        Ok(Some(line))
    }

    fn send_or_exited(
        &mut self,
        request: &SandboxRequest,
        during: &str,
    ) -> Result<(), LaunchError> {
        match self.send(request) {
            Ok(()) => Ok(()),
            Err(SandboxError::Io(error)) if error.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(LaunchError::Exited {
                    during: during.to_owned(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl TestLauncher for Sandbox {
    fn resolve(&mut self, class_names: &[String]) -> Result<ResolvedClasses, LaunchError> {
        const DURING: &str = "resolving test classes";
        self.send_or_exited(
            &SandboxRequest::Resolve {
                class_names: class_names.to_vec(),
            },
            DURING,
        )?;
        match self.recv()? {
            Some(SandboxResponse::Resolved {
                resolved,
                unresolved,
            }) => Ok(ResolvedClasses {
                resolved,
                unresolved,
            }),
            Some(SandboxResponse::Error { message }) => Err(LaunchError::Reported { message }),
            Some(other) => Err(LaunchError::UnexpectedMessage {
                during: DURING.to_owned(),
                received: response_kind(&other).to_owned(),
            }),
            None => Err(LaunchError::Exited {
                during: DURING.to_owned(),
            }),
        }
    }

    fn execute(
        &mut self,
        run_index: u32,
        request: &DiscoveryRequest,
        listener: &mut dyn ExecutionListener,
    ) -> Result<(), LaunchError> {
        let during = format!("executing run {run_index}");
        self.send_or_exited(
            &SandboxRequest::Execute {
                run_index,
                selectors: request.selectors().to_vec(),
            },
            &during,
        )?;
        loop {
            match self.recv()? {
                Some(SandboxResponse::PlanStarted { run_index }) => listener.plan_started(run_index),
                Some(SandboxResponse::ExecutionFinished(event)) => {
                    listener.execution_finished(&event)
                }
                Some(SandboxResponse::PlanFinished { run_index }) => {
                    listener.plan_finished(run_index);
                    return Ok(());
                }
                Some(SandboxResponse::Error { message }) => {
                    return Err(LaunchError::Reported { message });
                }
                Some(other) => {
                    return Err(LaunchError::UnexpectedMessage {
                        during,
                        received: response_kind(&other).to_owned(),
                    });
                }
                None => return Err(LaunchError::Exited { during }),
            }
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.stdin.take();
        // Dropped without shutdown: there is no protocol-level guarantee the worker will exit.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Parses the protocol message on `line`, if there is one. Test output on the line is logged.
fn parse_line(line: &str) -> Result<Option<SandboxResponse>, SandboxError> {
    let (output, message) = split_message_line(line);
    if !output.trim().is_empty() {
        debug!("sandbox worker output: {output}");
    }
    let Some(message) = message.map(str::trim).filter(|message| !message.is_empty()) else {
        return Ok(None);
    };
    serde_json::from_str(message)
        .map(Some)
        .map_err(|error| SandboxError::Protocol {
            line: message.to_owned(),
            error,
        })
}

fn response_kind(response: &SandboxResponse) -> &'static str {
    match response {
        SandboxResponse::Hello { .. } => "hello",
        SandboxResponse::Resolved { .. } => "resolved",
        SandboxResponse::PlanStarted { .. } => "plan-started",
        SandboxResponse::ExecutionFinished(_) => "execution-finished",
        SandboxResponse::PlanFinished { .. } => "plan-finished",
        SandboxResponse::Error { .. } => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nio_metadata::protocol::MESSAGE_PREFIX;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_are_fresh() {
        let first = generate_token();
        let second = generate_token();
        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
    }

    #[test]
    fn test_output_is_not_protocol() {
        assert_eq!(parse_line("hello from a test").expect("not an error"), None);
        assert_eq!(parse_line("{\"type\":\"shutdown\"}").expect("not an error"), None);
        assert_eq!(
            parse_line(&format!(
                "no newline{MESSAGE_PREFIX}{{\"type\":\"plan-started\",\"run-index\":3}}"
            ))
            .expect("parses"),
            Some(SandboxResponse::PlanStarted { run_index: 3 })
        );
        assert!(matches!(
            parse_line(&format!("{MESSAGE_PREFIX}not json")),
            Err(SandboxError::Protocol { .. })
        ));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let builder =
            SandboxBuilder::new("/nonexistent/nio-inspector-worker", Vec::<String>::new());
        assert!(matches!(builder.build(), Err(SandboxError::Spawn { .. })));
    }

    #[test]
    fn empty_program_is_rejected() {
        let builder = SandboxBuilder::new("", Vec::<String>::new());
        assert!(matches!(builder.build(), Err(SandboxError::EmptyCommand)));
    }
}
