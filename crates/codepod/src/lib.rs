//! A library for sandboxed code execution.
//!
//! codepod runs untrusted source code in short-lived Docker containers. Each
//! request gets its own network-disabled, resource-limited container that is
//! torn down when the request finishes, however it finishes.
//!
//! # Features
//!
//! - **Container isolation**: no network, process ceiling, memory and CPU limits, tmpfs scratch space.
//! - **Compiled and interpreted languages**: an optional compile step gates the run step in a single shell.
//! - **Hard timeout**: natural exit is raced against a wall-clock deadline; losers are killed.
//! - **Stdin support**: input is written once and closed so programs see EOF.
//! - **TOML configuration**: server-fixed policy, request bounds and a language table.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use container::{ContainerError, ContainerRuntime, DockerRuntime};
pub use runner::{Phase, Runner, RunnerError};
pub use types::{
    ExecutionOptions, ExecutionRequest, ExecutionResult, RequestBounds, ResourceLimits,
    ValidationError,
};

pub mod config;
pub mod container;
pub mod runner;
pub mod types;
