// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured run records.
//!
//! Alongside the human-readable run log, every rerun invocation writes one [`RunRecord`] per line
//! to `rerun-results.jsonl`. Evidence collection prefers these records over parsing the text log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The file name that structured run records are written to.
pub const RUN_RECORDS_FILE_NAME: &str = "rerun-results.jsonl";

/// A single structured record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunRecord {
    /// An invocation started.
    #[serde(rename_all = "kebab-case")]
    InvocationStarted {
        /// The number of reruns that follow the baseline.
        rerun_count: u32,
    },

    /// A requested test class could not be resolved and was excluded.
    #[serde(rename_all = "kebab-case")]
    ClassUnresolved {
        /// The fully-qualified class name.
        class_name: String,

        /// Why the class could not be resolved.
        reason: String,
    },

    /// A run started. Run 0 is the baseline.
    #[serde(rename_all = "kebab-case")]
    RunStarted {
        /// The run index.
        run_index: u32,
    },

    /// A test failed during a run.
    #[serde(rename_all = "kebab-case")]
    TestFailed {
        /// The run index.
        run_index: u32,

        /// The canonical `suite#case` identity, or the native ID if it could not be normalized.
        test: String,

        /// The native unique ID reported by the test framework.
        unique_id: String,

        /// The exception message, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,

        /// The stack trace, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack_trace: Option<String>,
    },

    /// A run finished.
    #[serde(rename_all = "kebab-case")]
    RunFinished {
        /// The run index.
        run_index: u32,

        /// Counts for this run.
        counts: RunCounts,
    },

    /// A test was classified at the end of the invocation.
    #[serde(rename_all = "kebab-case")]
    Classified {
        /// The canonical `suite#case` identity.
        test: String,

        /// The classification.
        classification: RecordedClassification,

        /// The number of reruns the test failed in, after passing at baseline.
        failed_reruns: u32,

        /// The total number of reruns.
        total_reruns: u32,
    },
}

/// Per-run counts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunCounts {
    /// Tests that were found, including ones that were aborted.
    pub found: usize,

    /// Tests that passed.
    pub succeeded: usize,

    /// Tests that failed.
    pub failed: usize,

    /// Tests that were aborted.
    pub aborted: usize,
}

/// A classification, as recorded in [`RunRecord::Classified`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordedClassification {
    /// Non-idempotent outcome: failed in every rerun after passing at baseline.
    Nio,

    /// Non-deterministic: failed in some but not all reruns after passing at baseline.
    Nd,
}

impl fmt::Display for RecordedClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nio => write!(f, "NIO"),
            Self::Nd => write!(f, "ND"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classified_wire_shape() {
        let record = RunRecord::Classified {
            test: "a.B#m".to_owned(),
            classification: RecordedClassification::Nio,
            failed_reruns: 3,
            total_reruns: 3,
        };
        assert_eq!(
            serde_json::to_string(&record).expect("serializes"),
            r#"{"type":"classified","test":"a.B#m","classification":"nio","failed-reruns":3,"total-reruns":3}"#
        );
    }

    #[test]
    fn test_failed_optional_fields() {
        let record: RunRecord = serde_json::from_str(
            r#"{"type":"test-failed","run-index":1,"test":"a.B#m","unique-id":"x"}"#,
        )
        .expect("parses without optional fields");
        assert_eq!(
            record,
            RunRecord::TestFailed {
                run_index: 1,
                test: "a.B#m".to_owned(),
                unique_id: "x".to_owned(),
                message: None,
                stack_trace: None,
            }
        );
    }
}
