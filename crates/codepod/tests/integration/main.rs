//! Integration tests for codepod
//!
//! These tests require a running Docker daemon that can pull public images.
//! Run with: cargo test -p codepod --features integration-tests
//!
//! Tests that talk to Docker are marked `#[ignore]`. To include them:
//!    cargo test -p codepod --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;
use std::sync::Arc;

use codepod::config::Config;
use codepod::{DockerRuntime, ExecutionRequest, Runner};

mod compile_and_run;
mod concurrency;
mod config_loading;
mod container_lifecycle;
mod execution;
mod resource_limits;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

pub(crate) const ALPINE: &str = "alpine:3.20";

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// The configuration `codepod serve` ships with
pub(crate) fn test_config() -> Config {
    Config::embedded().expect("embedded config should parse")
}

pub(crate) fn docker() -> Arc<DockerRuntime> {
    Arc::new(DockerRuntime::connect(None).expect("Failed to connect to Docker"))
}

pub(crate) fn test_runner() -> Runner {
    Runner::new(docker(), test_config())
}

/// A shell-only request against a small image
pub(crate) fn shell_request(
    compile: Option<&str>,
    run: &str,
    input: Option<&str>,
) -> ExecutionRequest {
    ExecutionRequest {
        language: "shell".to_owned(),
        code: "# unused\n".to_owned(),
        filename: "main.sh".to_owned(),
        image: ALPINE.to_owned(),
        compile_command: compile.map(str::to_owned),
        run_command: run.to_owned(),
        input: input.map(str::to_owned),
    }
}

/// A request for a configured language with a fixture as its source
pub(crate) fn language_request(
    config: &Config,
    language: &str,
    fixture: &str,
    input: Option<&str>,
) -> ExecutionRequest {
    config
        .get_language(language)
        .unwrap_or_else(|_| panic!("{language} not configured"))
        .to_request(language, fixture_source(fixture), input.map(str::to_owned))
}
