// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The protocol spoken between the orchestrator and a sandbox worker.
//!
//! Each message is a single JSON object on its own line. Requests flow from the orchestrator to
//! the worker over the worker's standard input; responses flow back over its standard output.
//!
//! Test code shares the worker's standard output, so every response is preceded by
//! [`MESSAGE_PREFIX`]. Text that does not follow the prefix is test output, not protocol.
//! Anything the worker prints to standard error is passed through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The current protocol version. Workers announce the version they speak in
/// [`SandboxResponse::Hello`], and the orchestrator refuses to talk to mismatched workers.
pub const PROTOCOL_VERSION: u32 = 2;

/// Marks the start of a response on the worker's standard output.
///
/// The prefix need not start the line: a test that prints without a trailing newline leaves its
/// text in front of the next response.
pub const MESSAGE_PREFIX: &str = "@@nio-inspector@@ ";

/// Environment variable carrying the per-invocation sandbox token.
///
/// Sandboxed code refuses to start unless this is set, and echoes it back in its hello message.
pub const SANDBOX_TOKEN_ENV: &str = "NIO_INSPECTOR_SANDBOX_TOKEN";

/// Environment variable carrying the closed set of classpath entries the worker may load from,
/// joined with the platform path separator.
pub const SANDBOX_CLASSPATH_ENV: &str = "NIO_INSPECTOR_CLASSPATH";

/// Splits a line of worker output into the test output before [`MESSAGE_PREFIX`] and the
/// response text after it.
///
/// A line without the prefix is all test output.
pub fn split_message_line(line: &str) -> (&str, Option<&str>) {
    match line.find(MESSAGE_PREFIX) {
        Some(index) => (&line[..index], Some(&line[index + MESSAGE_PREFIX.len()..])),
        None => (line, None),
    }
}

/// A message sent from the orchestrator to a sandbox worker.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxRequest {
    /// Resolve the given test classes to loadable handles.
    #[serde(rename_all = "kebab-case")]
    Resolve {
        /// Fully-qualified class names.
        class_names: Vec<String>,
    },

    /// Execute one run over the given selection.
    #[serde(rename_all = "kebab-case")]
    Execute {
        /// The run index: 0 for the baseline, 1..=N for reruns.
        run_index: u32,

        /// What to run, in order.
        selectors: Vec<TestSelector>,
    },

    /// Stop serving and exit.
    Shutdown,
}

/// A single element of a discovery request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TestSelector {
    /// Every test method in a class.
    #[serde(rename_all = "kebab-case")]
    Class {
        /// The fully-qualified class name.
        class_name: String,
    },

    /// A single test method.
    #[serde(rename_all = "kebab-case")]
    Method {
        /// The fully-qualified class name.
        class_name: String,

        /// The method name, without a parameter list.
        method_name: String,
    },
}

impl TestSelector {
    /// Returns the class this selector refers to.
    pub fn class_name(&self) -> &str {
        match self {
            Self::Class { class_name } | Self::Method { class_name, .. } => class_name,
        }
    }
}

/// A message sent from a sandbox worker to the orchestrator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxResponse {
    /// The first message a worker sends after starting up.
    #[serde(rename_all = "kebab-case")]
    Hello {
        /// The protocol version the worker speaks.
        protocol_version: u32,

        /// The token read from [`SANDBOX_TOKEN_ENV`].
        token: String,

        /// The worker's process ID.
        pid: u32,
    },

    /// The answer to [`SandboxRequest::Resolve`].
    Resolved {
        /// Classes that were resolved, in request order.
        resolved: Vec<String>,

        /// Classes that could not be resolved, in request order.
        unresolved: Vec<UnresolvedClass>,
    },

    /// A run has started.
    #[serde(rename_all = "kebab-case")]
    PlanStarted {
        /// The run index from the request.
        run_index: u32,
    },

    /// A single test finished executing.
    ExecutionFinished(ExecutionFinished),

    /// A run has finished.
    #[serde(rename_all = "kebab-case")]
    PlanFinished {
        /// The run index from the request.
        run_index: u32,
    },

    /// The worker hit an error that prevents it from running tests at all.
    Error {
        /// A description of the error.
        message: String,
    },
}

/// A class that a worker could not resolve.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedClass {
    /// The fully-qualified class name.
    pub class_name: String,

    /// Why the class could not be resolved.
    pub reason: String,
}

/// Reports that a single test finished executing.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionFinished {
    /// The test framework's native unique ID for this execution.
    pub unique_id: String,

    /// A human-readable name for the test.
    pub display_name: String,

    /// The outcome.
    pub status: ExecutionStatus,

    /// Details about the failure, if the test did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

/// The outcome of a single test execution.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    /// The test passed.
    Successful,

    /// The test failed.
    Failed,

    /// The test was aborted, for example because an assumption did not hold.
    Aborted,
}

impl ExecutionStatus {
    /// Returns true if this status counts as a pass.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Successful)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Successful => write!(f, "SUCCESSFUL"),
            Self::Failed => write!(f, "FAILED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// The failure reported for a test execution.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailureDetail {
    /// The exception message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The full stack trace, one frame per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(
        r#"{"type":"resolve","class-names":["a.B"]}"#,
        SandboxRequest::Resolve { class_names: vec!["a.B".to_owned()] }
        ; "resolve"
    )]
    #[test_case(
        r#"{"type":"execute","run-index":2,"selectors":[{"kind":"class","class-name":"a.B"},{"kind":"method","class-name":"a.C","method-name":"m"}]}"#,
        SandboxRequest::Execute {
            run_index: 2,
            selectors: vec![
                TestSelector::Class { class_name: "a.B".to_owned() },
                TestSelector::Method { class_name: "a.C".to_owned(), method_name: "m".to_owned() },
            ],
        }
        ; "execute"
    )]
    #[test_case(r#"{"type":"shutdown"}"#, SandboxRequest::Shutdown; "shutdown")]
    fn parse_request(input: &str, expected: SandboxRequest) {
        let parsed: SandboxRequest = serde_json::from_str(input).expect("request parses");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn execution_finished_wire_shape() {
        let response = SandboxResponse::ExecutionFinished(ExecutionFinished {
            unique_id: "[engine:junit-jupiter]/[class:a.B]/[method:m()]".to_owned(),
            display_name: "m()".to_owned(),
            status: ExecutionStatus::Failed,
            failure: Some(FailureDetail {
                message: Some("boom".to_owned()),
                stack_trace: None,
            }),
        });
        let json = serde_json::to_string(&response).expect("serializes");
        assert_eq!(
            json,
            r#"{"type":"execution-finished","unique-id":"[engine:junit-jupiter]/[class:a.B]/[method:m()]","display-name":"m()","status":"failed","failure":{"message":"boom"}}"#
        );
    }

    #[test_case("@@nio-inspector@@ {}", "", Some("{}"); "message only")]
    #[test_case("hello from a test", "hello from a test", None; "output only")]
    #[test_case("partial@@nio-inspector@@ {}", "partial", Some("{}"); "output before message")]
    #[test_case("", "", None; "empty")]
    fn split_lines_of_worker_output(line: &str, output: &str, message: Option<&str>) {
        assert_eq!(split_message_line(line), (output, message));
    }

    #[test]
    fn hello_uses_kebab_case_fields() {
        let parsed: SandboxResponse =
            serde_json::from_str(r#"{"type":"hello","protocol-version":2,"token":"abc","pid":7}"#)
                .expect("hello parses");
        assert_eq!(
            parsed,
            SandboxResponse::Hello {
                protocol_version: PROTOCOL_VERSION,
                token: "abc".to_owned(),
                pid: 7,
            }
        );
    }
}
