// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading candidates and stack traces back out of a text run log.

use crate::{
    helpers::split_lines,
    run_log::{
        CLASSIFICATION_SUFFIX, FAILING_TEST_PREFIX, FAILURE_MESSAGE_LINE, FINAL_RESULTS_MARKER,
        INITIAL_RUN_MARKER, LogLevel, NIO_COUNT_PREFIX, RERUN_MARKER,
    },
};
use std::collections::BTreeMap;

/// Returns the possible NIO tests listed in the final results, in log order.
///
/// Only `[ERROR]` lines ending in the classification suffix count. The scan stops at the first
/// line after the final results banner that is neither a candidate nor part of the header.
pub fn possible_nio_tests(log: &str) -> Vec<String> {
    let mut lines = split_lines(log);
    if !lines.by_ref().any(|line| is_banner(line, FINAL_RESULTS_MARKER)) {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for line in lines {
        let Some((level, message)) = LogLevel::split_line(line) else {
            break;
        };
        if level == LogLevel::Error
            && let Some((test, _)) = message.split_once(CLASSIFICATION_SUFFIX)
        {
            candidates.push(test.trim().to_owned());
            continue;
        }
        let is_header = message.trim().is_empty()
            || (level == LogLevel::Error && message.starts_with(NIO_COUNT_PREFIX));
        if !candidates.is_empty() || !is_header {
            break;
        }
    }
    candidates
}

/// Returns the stack trace `test` failed with in each rerun, keyed by rerun index.
///
/// Within a rerun section, the trace is the block of untagged lines that follows the
/// `Failing Test: <test>` line and its `Failure message:` line. It ends at the next tagged line.
/// If another tagged line intervenes before any untagged line, that rerun has no trace.
pub fn stack_traces(log: &str, test: &str) -> BTreeMap<u32, String> {
    let failing_line = format!("{FAILING_TEST_PREFIX}{test}");
    let mut traces = BTreeMap::new();
    let mut rerun: Option<u32> = None;
    let mut state = TraceState::Searching;

    for line in split_lines(log) {
        let Some((_, message)) = LogLevel::split_line(line) else {
            state = match state {
                TraceState::AwaitingTrace => TraceState::Capturing(vec![line]),
                TraceState::Capturing(mut lines) => {
                    lines.push(line);
                    TraceState::Capturing(lines)
                }
                other => other,
            };
            continue;
        };

        if let TraceState::Capturing(lines) = &state
            && let Some(index) = rerun
        {
            traces.insert(index, join_trace(lines));
            state = TraceState::Done;
        }

        if message.contains(RERUN_MARKER) {
            rerun = rerun_index(message);
            state = TraceState::Searching;
            continue;
        }
        if message.contains(INITIAL_RUN_MARKER) || message.contains(FINAL_RESULTS_MARKER) {
            rerun = None;
            state = TraceState::Searching;
            continue;
        }

        state = match state {
            TraceState::Searching if rerun.is_some() && message == failing_line => {
                TraceState::AwaitingTrace
            }
            TraceState::AwaitingTrace if message.trim_end() == FAILURE_MESSAGE_LINE => {
                TraceState::AwaitingTrace
            }
            TraceState::AwaitingTrace => TraceState::Done,
            other => other,
        };
    }

    if let (TraceState::Capturing(lines), Some(index)) = (&state, rerun) {
        traces.insert(index, join_trace(lines));
    }
    traces
}

#[derive(Debug)]
enum TraceState<'a> {
    Searching,
    AwaitingTrace,
    Capturing(Vec<&'a str>),
    // A trace was captured or ruled out for the current rerun.
    Done,
}

fn is_banner(line: &str, marker: &str) -> bool {
    LogLevel::split_line(line).is_some_and(|(_, message)| message.contains(marker))
}

fn rerun_index(message: &str) -> Option<u32> {
    let (_, rest) = message.split_once(RERUN_MARKER)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn join_trace(lines: &[&str]) -> String {
    let mut trace = String::new();
    for line in lines {
        trace.push_str(line);
        trace.push('\n');
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const LOG: &str = indoc! {"
        [INFO]
        [INFO] ====================Starting the Initial Run of Test====================
        [INFO]
        [INFO] Test run summary: 2 tests found, 1 succeeded, 1 failed, 0 aborted
        [WARN] Failing Test: a.B#broken
        [WARN] Failure message:
        java.lang.AssertionError: baseline
        \tat a.B.broken(B.java:40)
        [WARN] All Failed tests:
        [WARN] broken(): [engine:junit-jupiter]/[class:a.B]/[method:broken()]
        [INFO]
        [INFO] =======================Starting Rerun #1=========================
        [INFO]
        [INFO] Test run summary: 2 tests found, 0 succeeded, 2 failed, 0 aborted
        [WARN] Failing Test: a.B#m
        [WARN] Failure message:
        java.lang.AssertionError: first
        \tat a.B.m(B.java:10)
        [WARN] Failing Test: a.B#mm
        [WARN] Failure message:
        java.lang.AssertionError: other
        [WARN] All Failed tests:
        [INFO]
        [INFO] =======================Starting Rerun #2=========================
        [INFO]
        [WARN] Failing Test: a.B#m
        [WARN] Failing Test: a.B#mm
        [WARN] Failure message:
        java.lang.AssertionError: no trace for m here
        [INFO]
        [INFO] =======================Starting Rerun #3=========================
        [INFO]
        [WARN] Failing Test: a.B#m
        [WARN] Failure message:
        java.lang.IllegalStateException: third

        \tat a.B.m(B.java:12)
        [INFO]
        [INFO] =========================Final Results=========================
        [INFO]
        [ERROR] Number of Possible NIO Test(s) Found: 2
        [ERROR] a.B#m (passed in the initial run but failed in 3 out of 3 reruns)
        [ERROR] a.C#n (passed in the initial run but failed in 3 out of 3 reruns)
        [WARN] Number of Non-deterministic Flaky Test(s) Found: 1
        [WARN] a.B#mm (passed in the initial run but failed in 2 out of 3 reruns)
    "};

    #[test]
    fn candidates_from_final_results() {
        assert_eq!(possible_nio_tests(LOG), vec!["a.B#m", "a.C#n"]);
    }

    #[test]
    fn no_candidates_without_final_results() {
        assert!(possible_nio_tests("[INFO] hello\n").is_empty());
        assert!(
            possible_nio_tests(indoc! {"
                [INFO] =========================Final Results=========================
                [INFO]
                [INFO] No Flaky Tests Found
            "})
            .is_empty()
        );
    }

    #[test]
    fn traces_per_rerun() {
        let traces = stack_traces(LOG, "a.B#m");
        assert_eq!(
            traces,
            BTreeMap::from([
                (
                    1,
                    "java.lang.AssertionError: first\n\tat a.B.m(B.java:10)\n".to_owned()
                ),
                (
                    3,
                    "java.lang.IllegalStateException: third\n\n\tat a.B.m(B.java:12)\n".to_owned()
                ),
            ])
        );
    }

    #[test]
    fn failing_test_match_is_exact() {
        let traces = stack_traces(LOG, "a.B#mm");
        assert_eq!(
            traces,
            BTreeMap::from([
                (1, "java.lang.AssertionError: other\n".to_owned()),
                (2, "java.lang.AssertionError: no trace for m here\n".to_owned()),
            ])
        );
        assert!(stack_traces(LOG, "a.B#broken").is_empty());
    }
}
