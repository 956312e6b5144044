//! Container lifecycle for a single execution

use tokio::time::{Instant, timeout};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::container::{
    ContainerRuntime, ContainerSpec, ShellPipeline, build_archive, cpu_quota, demultiplex,
    ensure_image, parse_memory,
};
use crate::runner::{Phase, RunnerError};
use crate::types::{ExecutionOptions, ExecutionRequest, ExecutionResult};

/// How the race between the program and the deadline ended
enum Outcome {
    Exited(i64),
    TimedOut,
}

/// Describe the container for `request`
///
/// Limits come from `options`; the request only contributes the image,
/// commands and whether stdin is needed.
pub fn container_spec(
    config: &Config,
    request: &ExecutionRequest,
    options: &ExecutionOptions,
) -> ContainerSpec {
    let docker = &config.docker;
    let pipeline =
        ShellPipeline::from_commands(request.compile_command.as_deref(), &request.run_command);

    ContainerSpec::new(&request.image)
        .name(format!("codepod-{}", Uuid::new_v4()))
        .command(pipeline.argv())
        .working_dir(&docker.workspace_dir)
        .memory_bytes(parse_memory(&options.memory_limit))
        .cpu_quota(cpu_quota(&options.cpu_limit))
        .pids_limit(options.max_processes)
        .tmpfs_mounts(docker.scratch_mounts.iter().cloned())
        .network_disabled(true)
        .auto_remove(docker.auto_remove)
        .open_stdin(request.stdin().is_some())
}

/// Run `request` in a fresh container
///
/// Every path that created a container tears it down before returning.
#[instrument(skip_all)]
pub(crate) async fn execute(
    runtime: &dyn ContainerRuntime,
    config: &Config,
    request: &ExecutionRequest,
    options: &ExecutionOptions,
    accepted: Instant,
) -> Result<ExecutionResult, RunnerError> {
    debug!(phase = %Phase::Provisioning);
    ensure_image(runtime, &request.image)
        .await
        .map_err(RunnerError::Provision)?;

    let spec = container_spec(config, request, options);
    let id = runtime
        .create_container(&spec)
        .await
        .map_err(RunnerError::Create)?;
    debug!(%id, phase = %Phase::Created);

    if let Err(e) = populate(runtime, config, &id, request).await {
        debug!(%id, phase = %Phase::Failed, error = %e);
        teardown(runtime, config, &id, false).await;
        return Err(e);
    }
    debug!(%id, phase = %Phase::Populated);

    if let Err(e) = runtime.start_container(&id).await {
        let e = RunnerError::Start(e);
        debug!(%id, phase = %Phase::Failed, error = %e);
        teardown(runtime, config, &id, false).await;
        return Err(e);
    }
    debug!(%id, phase = %Phase::Running, timeout_ms = options.timeout_ms);

    let outcome = match race(runtime, &id, request, options).await {
        Ok(outcome) => outcome,
        Err(e) => {
            debug!(%id, phase = %Phase::Failed, error = %e);
            teardown(runtime, config, &id, true).await;
            return Err(e);
        }
    };

    match outcome {
        Outcome::TimedOut => {
            debug!(%id, phase = %Phase::TimedOut);
            teardown(runtime, config, &id, true).await;
            Ok(ExecutionResult::timed_out(
                options.timeout_ms,
                accepted.elapsed(),
            ))
        }
        Outcome::Exited(exit_code) => {
            debug!(%id, phase = %Phase::Completed, exit_code);
            let result = collect(runtime, &id, exit_code, accepted).await;
            if !config.docker.auto_remove {
                remove(runtime, &id).await;
            }
            result
        }
    }
}

async fn populate(
    runtime: &dyn ContainerRuntime,
    config: &Config,
    id: &str,
    request: &ExecutionRequest,
) -> Result<(), RunnerError> {
    let archive =
        build_archive(&request.filename, request.code.as_bytes()).map_err(RunnerError::Populate)?;
    runtime
        .upload_archive(id, &config.docker.workspace_dir, archive)
        .await
        .map_err(RunnerError::Populate)
}

/// Race natural exit against the deadline
///
/// Stdin is written inside the race so a program that never drains its input
/// cannot hold the container open past the timeout.
async fn race(
    runtime: &dyn ContainerRuntime,
    id: &str,
    request: &ExecutionRequest,
    options: &ExecutionOptions,
) -> Result<Outcome, RunnerError> {
    let completion = async {
        if let Some(input) = request.stdin() {
            // The program may exit without reading; that is its outcome, not ours
            if let Err(e) = runtime.write_stdin(id, input.as_bytes()).await {
                warn!(%id, error = %e, "failed to deliver stdin");
            }
        }
        runtime.wait_container(id).await
    };

    match timeout(options.timeout(), completion).await {
        Ok(status) => status.map(Outcome::Exited).map_err(RunnerError::Collect),
        Err(_) => Ok(Outcome::TimedOut),
    }
}

async fn collect(
    runtime: &dyn ContainerRuntime,
    id: &str,
    exit_code: i64,
    accepted: Instant,
) -> Result<ExecutionResult, RunnerError> {
    let raw = runtime
        .container_logs(id)
        .await
        .map_err(RunnerError::Collect)?;
    let logs = demultiplex(&raw);
    if logs.discarded > 0 {
        debug!(%id, discarded = logs.discarded, "dropped truncated log frame");
    }

    let memory_usage = match runtime.container_stats(id).await {
        Ok(stats) => stats.memory_usage,
        Err(e) => {
            warn!(%id, error = %e, "stats unavailable, omitting memory usage");
            None
        }
    };

    let success = exit_code == 0;
    let error = if success {
        None
    } else if logs.stderr.is_empty() {
        Some(format!("Process exited with code {exit_code}"))
    } else {
        Some(logs.stderr)
    };

    Ok(ExecutionResult {
        success,
        output: logs.stdout,
        error,
        execution_time: crate::types::millis(accepted.elapsed()),
        memory_usage,
    })
}

/// Best-effort teardown on the timeout and failure paths
///
/// Errors are logged and dropped: the container may already have exited and
/// removed itself. A container that never started cannot remove itself, so it
/// is always removed explicitly.
async fn teardown(runtime: &dyn ContainerRuntime, config: &Config, id: &str, started: bool) {
    if let Err(e) = runtime.kill_container(id).await {
        warn!(%id, error = %e, "kill failed during teardown");
    }
    if !started || !config.docker.auto_remove {
        remove(runtime, id).await;
    }
    debug!(%id, phase = %Phase::TornDown);
}

async fn remove(runtime: &dyn ContainerRuntime, id: &str) {
    if let Err(e) = runtime.remove_container(id).await {
        warn!(%id, error = %e, "remove failed");
    }
}
