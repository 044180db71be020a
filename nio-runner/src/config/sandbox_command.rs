// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::SandboxCommandParseError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, de::Error as _};
use std::{fmt, str::FromStr};

/// The command used to start a sandbox worker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SandboxCommand {
    program: String,
    args: Vec<String>,
}

impl SandboxCommand {
    /// Creates a new command from a program and its arguments.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the program to execute.
    ///
    /// Relative programs that contain a path separator are resolved against `project_root`; bare
    /// names are left for `PATH` lookup.
    pub fn resolve_program(&self, project_root: &Utf8Path) -> Utf8PathBuf {
        let program = Utf8Path::new(&self.program);
        if program.is_relative() && program.components().count() > 1 {
            project_root.join(program)
        } else {
            program.to_owned()
        }
    }
}

impl FromStr for SandboxCommand {
    type Err = SandboxCommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = shell_words::split(s).map_err(|error| SandboxCommandParseError::Split {
            command: s.to_owned(),
            error,
        })?;
        if args.is_empty() {
            return Err(SandboxCommandParseError::Empty);
        }
        let program = args.remove(0);
        Ok(Self { program, args })
    }
}

impl fmt::Display for SandboxCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(
            std::iter::once(&self.program).chain(&self.args),
        ))
    }
}

impl<'de> Deserialize<'de> for SandboxCommand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct CommandVisitor;

        impl<'de> serde::de::Visitor<'de> for CommandVisitor {
            type Value = SandboxCommand;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a Unix shell command or a list of arguments")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(|error: SandboxCommandParseError| match error {
                    SandboxCommandParseError::Empty => {
                        E::invalid_value(serde::de::Unexpected::Str(value), &self)
                    }
                    other => E::custom(other),
                })
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let Some(program) = seq.next_element::<String>()? else {
                    return Err(A::Error::invalid_length(0, &self));
                };
                let mut args = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    args.push(value);
                }
                Ok(SandboxCommand { program, args })
            }
        }

        deserializer.deserialize_any(CommandVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_shell_words() {
        let command: SandboxCommand = "java -cp 'a b.jar' Worker".parse().expect("parses");
        assert_eq!(command, SandboxCommand::new("java", ["-cp", "a b.jar", "Worker"]));
        assert_eq!(command.to_string(), "java -cp 'a b.jar' Worker");
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "".parse::<SandboxCommand>(),
            Err(SandboxCommandParseError::Empty)
        ));
        assert!(matches!(
            "java 'unterminated".parse::<SandboxCommand>(),
            Err(SandboxCommandParseError::Split { .. })
        ));
    }

    #[test]
    fn resolve_program() {
        let root = Utf8Path::new("/project");
        assert_eq!(
            SandboxCommand::new("bin/worker", Vec::<String>::new()).resolve_program(root),
            Utf8PathBuf::from("/project/bin/worker")
        );
        assert_eq!(
            SandboxCommand::new("java", Vec::<String>::new()).resolve_program(root),
            Utf8PathBuf::from("java")
        );
    }
}
