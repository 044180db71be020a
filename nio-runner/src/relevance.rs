// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting the production source most relevant to each candidate test.
//!
//! A downstream consumer reads each candidate's evidence and writes an `agent_response` file
//! saying what source it needs (see [`SourceRequest`]). [`RelevantSourceCollector`] answers every
//! request by ranking declarations by edit distance, and writes the result to the candidate's
//! `sourceCode` artifact.

mod levenshtein;
mod ranker;
mod request;

pub use levenshtein::levenshtein;
pub use ranker::*;
pub use request::*;

use crate::{
    config::{NioConfig, RelevanceLimits},
    errors::{CollectError, ConfigurationError},
    evidence::{EvidenceDir, read_candidate_list},
    java::{DeclarationParser, JavaDeclarationParser, java_files},
    test_id::TestIdentity,
};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use std::io;
use tracing::{info, warn};

/// Answers source requests for the candidates of one run.
#[derive(Debug)]
pub struct RelevantSourceCollector {
    source_dir: Utf8PathBuf,
    test_source_dir: Utf8PathBuf,
    limits: RelevanceLimits,
    parser: DebugIgnore<Box<dyn DeclarationParser>>,
}

impl RelevantSourceCollector {
    /// Creates a collector that reads production sources from `source_dir` and test sources from
    /// `test_source_dir`.
    pub fn new(
        source_dir: impl Into<Utf8PathBuf>,
        test_source_dir: impl Into<Utf8PathBuf>,
        limits: RelevanceLimits,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            test_source_dir: test_source_dir.into(),
            limits,
            parser: DebugIgnore(Box::new(JavaDeclarationParser)),
        }
    }

    /// Creates a collector from the project configuration.
    pub fn from_config(config: &NioConfig) -> Self {
        Self::new(
            config.source_dir(),
            config.test_source_dir(),
            config.relevance(),
        )
    }

    /// Replaces the parser used to find declarations.
    pub fn set_parser(&mut self, parser: Box<dyn DeclarationParser>) -> &mut Self {
        self.parser = DebugIgnore(parser);
        self
    }

    /// Answers the source request of every candidate listed in `run_dir`.
    ///
    /// Candidates without a response, or with one that can't be parsed, are skipped with a
    /// warning.
    pub fn collect(&self, run_dir: &Utf8Path) -> Result<RelevanceSummary, CollectError> {
        for root in [&self.source_dir, &self.test_source_dir] {
            if !root.is_dir() {
                return Err(ConfigurationError::SourceRootMissing { path: root.clone() }.into());
            }
        }
        let candidates = read_candidate_list(run_dir)?;

        let mut summary = RelevanceSummary::default();
        // Parsing every source file is expensive, so only do it once a request needs it.
        let mut corpus: Option<SourceCorpus> = None;
        for candidate in &candidates {
            let evidence = EvidenceDir::new(run_dir, candidate);
            let request = match read_request(&evidence) {
                Ok(request) => request,
                Err(message) => {
                    warn!("skipping {candidate}: {message}");
                    summary.skipped += 1;
                    continue;
                }
            };

            let source_code = match request {
                SourceRequest::DirectlyFixable => {
                    info!("{candidate} can be fixed without production source");
                    summary.directly_fixable += 1;
                    continue;
                }
                SourceRequest::RelevantFile => {
                    let Some(prefix) = self.relevant_file_prefix(candidate) else {
                        summary.skipped += 1;
                        continue;
                    };
                    prefix
                }
                SourceRequest::Method {
                    class_name: Some(class_name),
                    method_name,
                } => self.ranked(&mut corpus, candidate, |ranker| {
                    ranker.methods_in_class(&class_name, &method_name)
                }),
                SourceRequest::Method {
                    class_name: None,
                    method_name,
                }
                | SourceRequest::HypothesizedMethod { method_name } => {
                    self.ranked(&mut corpus, candidate, |ranker| {
                        ranker.hypothesized_methods(&method_name)
                    })
                }
                SourceRequest::Class { class_name } => {
                    self.ranked(&mut corpus, candidate, |ranker| ranker.classes(&class_name))
                }
            };
            evidence.write_source_code(&source_code)?;
            info!("wrote relevant source for {candidate} to {}", evidence.path());
            summary.written += 1;
        }
        Ok(summary)
    }

    fn ranked(
        &self,
        corpus: &mut Option<SourceCorpus>,
        candidate: &str,
        select: impl FnOnce(&RelevanceRanker<'_>) -> Selection,
    ) -> String {
        let corpus = corpus.get_or_insert_with(|| {
            SourceCorpus::load(
                &[self.source_dir.clone(), self.test_source_dir.clone()],
                &**self.parser,
            )
        });
        let selection = select(&RelevanceRanker::new(corpus, self.limits));
        if !selection.is_exact() {
            warn!(
                "{candidate}: no exact match for the requested source, \
                 using the most similarly named declarations"
            );
        }
        selection.to_string()
    }

    /// Returns the capped text of the production file most relevant to `candidate`.
    pub fn relevant_file_prefix(&self, candidate: &str) -> Option<String> {
        let identity: TestIdentity = match candidate.parse() {
            Ok(identity) => identity,
            Err(error) => {
                warn!("skipping relevant file for {candidate}: {error}");
                return None;
            }
        };
        let files = java_files(&self.source_dir);
        let Some(file) = most_relevant_file(&files, identity.top_level_class_name()) else {
            warn!(
                "no production source files under {} for {candidate}",
                self.source_dir
            );
            return None;
        };
        match std::fs::read_to_string(file) {
            Ok(source) => Some(file_prefix(&source, self.limits.max_file_lines)),
            Err(error) => {
                warn!("error reading most relevant file {file}: {error}");
                None
            }
        }
    }
}

fn read_request(evidence: &EvidenceDir) -> Result<SourceRequest, String> {
    let path = evidence.agent_response_path();
    let response = match std::fs::read_to_string(&path) {
        Ok(response) => response,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(format!("no agent response at {path}"));
        }
        Err(error) => return Err(format!("error reading {path}: {error}")),
    };
    response.parse().map_err(|error| format!("{error}"))
}

/// What [`RelevantSourceCollector::collect`] did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RelevanceSummary {
    /// Candidates whose `sourceCode` was written.
    pub written: usize,

    /// Candidates that need no production source.
    pub directly_fixable: usize,

    /// Candidates skipped because of a missing or unusable response.
    pub skipped: usize,
}
