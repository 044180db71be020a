// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt, str::FromStr};

const DIRECTLY_FIXABLE: &str = "Directly Fixable";
const FIND_METHOD_CODE: &str = "Find Method Code";
const FIND_CLASS_CODE: &str = "Find Class Code";
const FIND_HYPOTHESIZED_METHOD: &str = "Find Hypothesized Method";
const FIND_RELEVANT_FILE: &str = "Find Relevant File";

/// What a downstream consumer asked for in a test's `agent_response` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceRequest {
    /// The test can be fixed without any production source.
    DirectlyFixable,

    /// A method, optionally qualified by its simple class name.
    Method {
        /// The simple class name, if one was given.
        class_name: Option<String>,

        /// The method name.
        method_name: String,
    },

    /// A class, by simple name.
    Class {
        /// The simple class name.
        class_name: String,
    },

    /// A method name that the consumer guessed without knowing its class.
    HypothesizedMethod {
        /// The method name.
        method_name: String,
    },

    /// The production file whose name is closest to the test class's.
    RelevantFile,
}

impl FromStr for SourceRequest {
    type Err = ParseSourceRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == DIRECTLY_FIXABLE {
            return Ok(Self::DirectlyFixable);
        }
        if s.starts_with(FIND_RELEVANT_FILE) {
            return Ok(Self::RelevantFile);
        }

        let error = || ParseSourceRequestError(s.to_owned());
        if s.starts_with(FIND_METHOD_CODE) {
            let argument = argument(s).ok_or_else(error)?;
            match argument.rsplit_once('.') {
                Some((class_name, method_name)) if !method_name.is_empty() => Ok(Self::Method {
                    class_name: (!class_name.is_empty()).then(|| class_name.to_owned()),
                    method_name: method_name.to_owned(),
                }),
                Some(_) => Err(error()),
                None => Ok(Self::Method {
                    class_name: None,
                    method_name: argument,
                }),
            }
        } else if s.starts_with(FIND_CLASS_CODE) {
            Ok(Self::Class {
                class_name: argument(s).ok_or_else(error)?,
            })
        } else if s.starts_with(FIND_HYPOTHESIZED_METHOD) {
            Ok(Self::HypothesizedMethod {
                method_name: argument(s).ok_or_else(error)?,
            })
        } else {
            Err(error())
        }
    }
}

/// Returns what follows the first `:`, with braces and whitespace removed.
fn argument(s: &str) -> Option<String> {
    let (_, argument) = s.split_once(':')?;
    let argument: String = argument
        .chars()
        .filter(|c| !matches!(c, '{' | '}') && !c.is_whitespace())
        .collect();
    (!argument.is_empty()).then_some(argument)
}

/// An `agent_response` that is not one of the recognized shapes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseSourceRequestError(String);

impl fmt::Display for ParseSourceRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparsable agent response `{}`", self.0)
    }
}

impl std::error::Error for ParseSourceRequestError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn method(class_name: Option<&str>, method_name: &str) -> SourceRequest {
        SourceRequest::Method {
            class_name: class_name.map(str::to_owned),
            method_name: method_name.to_owned(),
        }
    }

    #[test_case("Directly Fixable", SourceRequest::DirectlyFixable; "directly fixable")]
    #[test_case("  Directly Fixable\n", SourceRequest::DirectlyFixable; "surrounding whitespace")]
    #[test_case("Find Method Code: {Foo.bar}", method(Some("Foo"), "bar"); "method")]
    #[test_case("Find Method Code: { Foo . bar }", method(Some("Foo"), "bar"); "method with spaces")]
    #[test_case("Find Method Code: {a.b.Foo.bar}", method(Some("a.b.Foo"), "bar"); "qualified class")]
    #[test_case("Find Method Code: {bar}", method(None, "bar"); "method without class")]
    #[test_case(
        "Find Class Code: {Foo}",
        SourceRequest::Class { class_name: "Foo".to_owned() };
        "class"
    )]
    #[test_case(
        "Find Hypothesized Method: {resetCache}",
        SourceRequest::HypothesizedMethod { method_name: "resetCache".to_owned() };
        "hypothesized"
    )]
    #[test_case("Find Relevant File", SourceRequest::RelevantFile; "relevant file")]
    fn parse(input: &str, expected: SourceRequest) {
        assert_eq!(input.parse::<SourceRequest>(), Ok(expected));
    }

    #[test_case(""; "empty")]
    #[test_case("Maybe Fixable"; "unknown shape")]
    #[test_case("Find Class Code"; "missing argument")]
    #[test_case("Find Class Code: {}"; "empty argument")]
    #[test_case("Find Method Code: {Foo.}"; "empty method")]
    fn parse_errors(input: &str) {
        assert_eq!(
            input.parse::<SourceRequest>(),
            Err(ParseSourceRequestError(input.trim().to_owned()))
        );
    }
}
