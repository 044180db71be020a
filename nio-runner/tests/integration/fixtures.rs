// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use nio_runner::{
    errors::SandboxError,
    sandbox::{Sandbox, SandboxBuilder},
};

pub(crate) const FIXTURE_WORKER: &str = env!("CARGO_BIN_EXE_nio-fixture-worker");

pub(crate) const POLLUTING: &str = "fixtures.PollutingTest#registryStartsEmpty";
pub(crate) const ALTERNATING: &str = "fixtures.AlternatingTest#flips";
pub(crate) const ALWAYS_FAILING: &str = "fixtures.AlwaysFailingTest#fails";
pub(crate) const STABLE: &str = "fixtures.StableTest#passes";
pub(crate) const ENVIRONMENT: &str = "fixtures.EnvironmentTest#pathIsUnset";
pub(crate) const PRINTS_LINES: &str = "fixtures.ChattyTest#printsLines";
pub(crate) const PRINTS_PARTIAL_LINE: &str = "fixtures.ChattyTest#printsPartialLine";

pub(crate) const ALL_CLASSES: &str = "fixtures.PollutingTest, fixtures.AlternatingTest, \
     fixtures.AlwaysFailingTest, fixtures.StableTest";

pub(crate) fn fixture_sandbox() -> Result<Sandbox, SandboxError> {
    SandboxBuilder::new(FIXTURE_WORKER, Vec::<String>::new()).build()
}
