//! Container runtime boundary
//!
//! This module holds everything that touches the isolation layer: the
//! [`ContainerRuntime`] trait the orchestrator drives, the Docker-backed
//! implementation, and the small pure helpers that prepare its inputs
//! (archive, shell command, limits) and parse its outputs (logs).
//!
//! References for the Docker Engine API and its stream framing:
//! - https://docs.docker.com/engine/api/
//! - https://docs.docker.com/engine/api/v1.43/#tag/Container/operation/ContainerAttach

use async_trait::async_trait;
use thiserror::Error;

pub use crate::container::archive::build_archive;
pub use crate::container::command::{CompileStep, RunStep, ShellPipeline};
pub use crate::container::docker::DockerRuntime;
pub use crate::container::image::{Provisioned, ensure_image};
pub use crate::container::limits::{
    CPU_PERIOD, DEFAULT_MEMORY_BYTES, cpu_quota, parse_memory, try_parse_memory,
};
pub use crate::container::logs::{
    DemuxedLogs, HEADER_LEN, LogFrame, StreamKind, demultiplex, encode_frame, parse_frames,
};
pub use crate::container::spec::{ContainerSpec, TmpfsMount};

mod archive;
mod command;
mod docker;
mod image;
mod limits;
mod logs;
mod spec;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

/// Errors that occur while talking to the container runtime
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to connect to container runtime: {0}")]
    Connect(String),

    #[error("image '{0}' not found")]
    ImageNotFound(String),

    #[error("failed to pull image '{image}': {message}")]
    PullFailed { image: String, message: String },

    #[error("container {0} not found")]
    NotFound(String),

    #[error("container runtime error: {0}")]
    Api(String),

    #[error("failed to build archive: {0}")]
    Archive(#[source] std::io::Error),

    #[error("failed to write stdin: {0}")]
    Stdin(String),

    #[error("container {0} exited without reporting a status code")]
    NoExitStatus(String),
}

/// Point-in-time resource statistics for a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// Memory usage in bytes (peak when the runtime reports it)
    pub memory_usage: Option<u64>,
}

/// Operations the orchestrator needs from an isolation layer
///
/// Implementations hold no per-request state; one handle is shared by every
/// concurrent execution.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + std::fmt::Debug {
    /// Succeeds if the image is present locally
    async fn inspect_image(&self, image: &str) -> Result<(), ContainerError>;

    /// Pull an image, returning only once the progress stream has completed
    async fn pull_image(&self, image: &str) -> Result<(), ContainerError>;

    /// Create a container and return its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ContainerError>;

    /// Extract a tar archive into `path` inside the container
    async fn upload_archive(
        &self,
        id: &str,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), ContainerError>;

    async fn start_container(&self, id: &str) -> Result<(), ContainerError>;

    /// Attach to stdin, write `input`, then close the stream to signal EOF
    async fn write_stdin(&self, id: &str, input: &[u8]) -> Result<(), ContainerError>;

    /// Wait for the container to exit and return its status code
    async fn wait_container(&self, id: &str) -> Result<i64, ContainerError>;

    async fn kill_container(&self, id: &str) -> Result<(), ContainerError>;

    /// Force-remove a container
    async fn remove_container(&self, id: &str) -> Result<(), ContainerError>;

    /// Combined stdout/stderr in the multiplexed frame format
    async fn container_logs(&self, id: &str) -> Result<Vec<u8>, ContainerError>;

    /// A single stats snapshot
    async fn container_stats(&self, id: &str) -> Result<ContainerStats, ContainerError>;
}
