// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ExcludeMatcher, SandboxCommand};
use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// Lets callers decide how to surface warnings (log them, collect them in tests, and so on).
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        project_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    );
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using `tracing`.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        project_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    ) {
        let mut unknown_str = String::new();
        if let [single] = unknown.iter().collect::<Vec<_>>().as_slice() {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.push_str(single);
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!(
            "in config file {}, ignoring unknown configuration {unknown_str}",
            config_file
                .strip_prefix(project_root)
                .unwrap_or(config_file),
        )
    }
}

/// Overall configuration for nio-inspector.
///
/// This is the root data structure for nio-inspector configuration. It is built from the defaults
/// shipped with this crate, overlaid with the project's `.config/nio-inspector.toml` (or an
/// explicitly provided file). Relative paths are resolved against the project root.
#[derive(Clone, Debug)]
pub struct NioConfig {
    project_root: Utf8PathBuf,
    inner: NioConfigDeserialize,
    excludes: ExcludeMatcher,
}

impl NioConfig {
    /// The default location of the config within the project root: `.config/nio-inspector.toml`.
    pub const CONFIG_PATH: &'static str = ".config/nio-inspector.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the nio-inspector config from the given file, or if not specified from
    /// `.config/nio-inspector.toml` in the project root.
    ///
    /// If the file isn't specified and the project root doesn't have
    /// `.config/nio-inspector.toml`, uses the default config options.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &project_root, &unknown);
        }

        let excludes = ExcludeMatcher::new(&inner.rerun.excludes)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        Ok(Self {
            project_root,
            inner,
            excludes,
        })
    }

    /// Returns the default nio-inspector config for the given project root.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        let (inner, unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        // The default config is embedded in this binary, so it must not have unknown keys.
        assert!(
            unknown.is_empty(),
            "unknown keys in default config: {unknown:?}"
        );
        let excludes =
            ExcludeMatcher::new(&inner.rerun.excludes).expect("default excludes are valid");
        Self {
            project_root: project_root.into(),
            inner,
            excludes,
        }
    }

    /// Returns the project root.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the number of reruns that follow the baseline run.
    pub fn rerun_count(&self) -> u32 {
        self.inner.rerun.count
    }

    /// Returns the compiled exclude patterns.
    pub fn excludes(&self) -> &ExcludeMatcher {
        &self.excludes
    }

    /// Returns the absolute production source directory.
    pub fn source_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.project.source_dir)
    }

    /// Returns the absolute test source directory.
    pub fn test_source_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.project.test_source_dir)
    }

    /// Returns the absolute directory containing compiled test classes.
    pub fn test_output_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.project.test_output_dir)
    }

    /// Returns the absolute classpath entries visible inside the sandbox.
    ///
    /// Configured entries come first, in order. The test output directory is appended unless it
    /// is already listed.
    pub fn classpath(&self) -> Vec<Utf8PathBuf> {
        let mut entries: Vec<Utf8PathBuf> = self
            .inner
            .project
            .classpath
            .iter()
            .map(|entry| self.project_root.join(entry))
            .collect();
        let test_output_dir = self.test_output_dir();
        if !entries.contains(&test_output_dir) {
            entries.push(test_output_dir);
        }
        entries
    }

    /// Returns the configured sandbox command, if any.
    pub fn sandbox_command(&self) -> Option<&SandboxCommand> {
        self.inner.sandbox.command.as_ref()
    }

    /// Returns the environment variables that are passed through to the sandbox.
    pub fn inherit_env(&self) -> &[String] {
        &self.inner.sandbox.inherit_env
    }

    /// Returns the absolute output directory.
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.output.dir)
    }

    /// Returns limits for relevant source selection.
    pub fn relevance(&self) -> RelevanceLimits {
        self.inner.relevance
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(NioConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: NioConfigDeserialize =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // serde_path_to_error already carries the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// Limits applied when selecting relevant production source.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelevanceLimits {
    /// The maximum number of methods emitted for a method request.
    pub max_methods: usize,

    /// The maximum number of classes emitted for a class request.
    pub max_classes: usize,

    /// The maximum number of lines emitted for a file request.
    pub max_file_lines: usize,
}

impl Default for RelevanceLimits {
    fn default() -> Self {
        Self {
            max_methods: 5,
            max_classes: 2,
            max_file_lines: 500,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct NioConfigDeserialize {
    rerun: RerunConfig,
    project: ProjectConfig,
    sandbox: SandboxConfig,
    output: OutputConfig,
    relevance: RelevanceLimits,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RerunConfig {
    count: u32,
    #[serde(default)]
    excludes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProjectConfig {
    source_dir: Utf8PathBuf,
    test_source_dir: Utf8PathBuf,
    test_output_dir: Utf8PathBuf,
    #[serde(default)]
    classpath: Vec<Utf8PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SandboxConfig {
    #[serde(default)]
    command: Option<SandboxCommand>,
    #[serde(default)]
    inherit_env: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct OutputConfig {
    dir: Utf8PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct TestConfigWarnings {
        unknown_keys: Vec<BTreeSet<String>>,
    }

    impl ConfigWarnings for TestConfigWarnings {
        fn unknown_config_keys(
            &mut self,
            _config_file: &Utf8Path,
            _project_root: &Utf8Path,
            unknown: &BTreeSet<String>,
        ) {
            self.unknown_keys.push(unknown.clone());
        }
    }

    #[test]
    fn defaults_without_config_file() {
        let dir = tempdir().expect("created temp dir");
        let mut warnings = TestConfigWarnings::default();
        let config =
            NioConfig::from_sources(dir.path(), None, &mut warnings).expect("defaults parse");

        assert_eq!(config.rerun_count(), 3);
        assert_eq!(config.output_dir(), dir.path().join(".NIOInspector"));
        assert_eq!(config.source_dir(), dir.path().join("src/main/java"));
        assert_eq!(config.relevance(), RelevanceLimits::default());
        assert_eq!(config.classpath(), vec![dir.path().join("target/test-classes")]);
        assert!(config.sandbox_command().is_none());
        assert!(warnings.unknown_keys.is_empty());
    }

    #[test]
    fn test_output_dir_is_appended_to_classpath() {
        let dir = tempdir().expect("created temp dir");
        std::fs::create_dir_all(dir.path().join(".config")).expect("created .config");
        std::fs::write(
            dir.path().join(NioConfig::CONFIG_PATH),
            indoc! {r#"
                [project]
                test-output-dir = "build/classes/test"
                classpath = ["lib/junit.jar", "lib/hamcrest.jar"]
            "#},
        )
        .expect("wrote config");

        let config = NioConfig::from_sources(dir.path(), None, &mut TestConfigWarnings::default())
            .expect("config parses");
        assert_eq!(
            config.classpath(),
            vec![
                dir.path().join("lib/junit.jar"),
                dir.path().join("lib/hamcrest.jar"),
                dir.path().join("build/classes/test"),
            ]
        );
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = tempdir().expect("created temp dir");
        std::fs::create_dir_all(dir.path().join(".config")).expect("created .config");
        std::fs::write(
            dir.path().join(NioConfig::CONFIG_PATH),
            indoc! {r#"
                [rerun]
                count = 5
                excludes = ["**/*IT.java"]

                [project]
                classpath = ["lib/junit.jar", "target/test-classes"]

                [sandbox]
                command = "bin/worker --quiet"

                [relevance]
                max-methods = 2

                [mystery]
                key = 1
            "#},
        )
        .expect("wrote config");

        let mut warnings = TestConfigWarnings::default();
        let config =
            NioConfig::from_sources(dir.path(), None, &mut warnings).expect("config parses");

        assert_eq!(config.rerun_count(), 5);
        assert_eq!(config.relevance().max_methods, 2);
        assert_eq!(config.relevance().max_classes, 2);
        assert_eq!(
            config.classpath(),
            vec![
                dir.path().join("lib/junit.jar"),
                dir.path().join("target/test-classes"),
            ]
        );
        let command = config.sandbox_command().expect("command is set");
        assert_eq!(command.program(), "bin/worker");
        assert_eq!(command.args(), ["--quiet"]);
        assert!(config.excludes().is_excluded("com/example/FooIT.java".as_ref()));
        assert!(!config.excludes().is_excluded("com/example/FooTest.java".as_ref()));
        assert_eq!(
            warnings.unknown_keys,
            vec![BTreeSet::from(["mystery".to_owned()])]
        );
    }

    #[test]
    fn bad_value_reports_path() {
        let dir = tempdir().expect("created temp dir");
        let config_file = dir.path().join("custom.toml");
        std::fs::write(&config_file, "[rerun]\ncount = \"many\"\n").expect("wrote config");

        let error = NioConfig::from_sources(
            dir.path(),
            Some(&config_file),
            &mut TestConfigWarnings::default(),
        )
        .expect_err("string count is rejected");
        assert_eq!(error.config_file(), &config_file);
        match error.kind() {
            ConfigParseErrorKind::DeserializeError(error) => {
                assert_eq!(error.path().to_string(), "rerun.count");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().expect("created temp dir");
        let config_file = dir.path().join("does-not-exist.toml");
        let error = NioConfig::from_sources(
            dir.path(),
            Some(&config_file),
            &mut TestConfigWarnings::default(),
        )
        .expect_err("required file is missing");
        assert!(matches!(error.kind(), ConfigParseErrorKind::BuildError(_)));
    }
}
