//! Sandbox orchestration for codepod
//!
//! [`Runner`] drives one container per request through
//! provision → create → populate → start → wait-or-timeout → collect, and
//! always tears the container down. Failures at any phase become a failed
//! [`ExecutionResult`]; nothing escapes to the caller as an error.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, instrument};

use crate::config::Config;
use crate::container::{ContainerError, ContainerRuntime};
use crate::types::{ExecutionOptions, ExecutionRequest, ExecutionResult};

pub use crate::runner::execute::container_spec;

mod execute;

/// Lifecycle phase of a single execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Provisioning,
    Created,
    Populated,
    Running,
    Completed,
    TimedOut,
    Failed,
    TornDown,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Provisioning => "provisioning",
            Phase::Created => "created",
            Phase::Populated => "populated",
            Phase::Running => "running",
            Phase::Completed => "completed",
            Phase::TimedOut => "timed_out",
            Phase::Failed => "failed",
            Phase::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort an execution
///
/// Each variant names the phase that failed.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Provision(#[source] ContainerError),

    #[error("failed to create container: {0}")]
    Create(#[source] ContainerError),

    #[error("failed to copy source into container: {0}")]
    Populate(#[source] ContainerError),

    #[error("failed to start container: {0}")]
    Start(#[source] ContainerError),

    #[error("failed to collect output: {0}")]
    Collect(#[source] ContainerError),

    #[error("execution service is shutting down")]
    Closed,
}

impl RunnerError {
    /// The phase the execution was in when it failed
    pub fn phase(&self) -> Phase {
        match self {
            RunnerError::Provision(_) | RunnerError::Closed => Phase::Provisioning,
            RunnerError::Create(_) => Phase::Created,
            RunnerError::Populate(_) => Phase::Populated,
            RunnerError::Start(_) => Phase::Running,
            RunnerError::Collect(_) => Phase::Completed,
        }
    }
}

/// High-level runner for code execution
///
/// Cheap to clone; clones share the runtime handle and the concurrency limit.
#[derive(Debug, Clone)]
pub struct Runner {
    runtime: Arc<dyn ContainerRuntime>,
    config: Arc<Config>,
    /// Limits simultaneously running containers
    permits: Arc<Semaphore>,
}

impl Runner {
    /// Create a new runner over `runtime` with the given configuration
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: Config) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_executions.max(1)));
        Self {
            runtime,
            config: Arc::new(config),
            permits,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of executions that could start right now without waiting
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Execute a request under the configured server policy
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let options = self.config.execution_options();
        self.execute_with_options(request, &options).await
    }

    /// Execute a request under explicit limits
    ///
    /// The request is assumed to be validated. Elapsed time is measured from
    /// this call, so time spent waiting for a concurrency permit is included.
    #[instrument(
        skip(self, request, options),
        fields(language = %request.language, image = %request.image)
    )]
    pub async fn execute_with_options(
        &self,
        request: &ExecutionRequest,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let accepted = Instant::now();

        let outcome = match self.permits.clone().acquire_owned().await {
            Ok(_permit) => {
                execute::execute(&*self.runtime, &self.config, request, options, accepted).await
            }
            Err(_) => Err(RunnerError::Closed),
        };

        outcome.unwrap_or_else(|e| {
            error!(phase = %e.phase(), error = %e, "execution failed");
            ExecutionResult::failure(e.to_string(), accepted.elapsed())
        })
    }
}
