//! Docker Engine runtime
//!
//! Implements [`ContainerRuntime`] on top of bollard. The handle is cheap to
//! share: bollard's client is a pooled connection to the daemon and carries no
//! per-container state.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{AttachContainerResults, LogOutput};
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, ContainerMemoryStats, HostConfig};
use bollard::query_parameters::{
    AttachContainerOptionsBuilder, CreateContainerOptions, CreateImageOptions,
    KillContainerOptions, LogsOptions, RemoveContainerOptionsBuilder, StartContainerOptions,
    StatsOptionsBuilder, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::{API_DEFAULT_VERSION, Docker};
use bytes::Bytes;
use futures_util::stream::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, trace};

use crate::container::logs::{StreamKind, encode_frame};
use crate::container::{ContainerError, ContainerRuntime, ContainerSpec, ContainerStats};

/// Request timeout for the daemon connection, in seconds
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Container runtime backed by a Docker daemon
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon at `socket`, or via the local defaults
    /// (`DOCKER_HOST`, then the platform socket) when `None`
    pub fn connect(socket: Option<&Path>) -> Result<Self, ContainerError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(
                &path.to_string_lossy(),
                CONNECT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| ContainerError::Connect(e.to_string()))?;

        Ok(Self { docker })
    }

    /// Check that the daemon answers
    pub async fn ping(&self) -> Result<(), ContainerError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| ContainerError::Connect(e.to_string()))
    }
}

fn api_error(error: BollardError) -> ContainerError {
    match error {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => ContainerError::NotFound(message),
        other => ContainerError::Api(other.to_string()),
    }
}

/// Split an image reference into name and tag
///
/// References without a tag resolve to `latest`; digests are passed through
/// with no tag.
pub(crate) fn split_reference(image: &str) -> (&str, Option<&str>) {
    if image.contains('@') {
        return (image, None);
    }
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&image[..split], Some(&image[split + 1..]))
        }
        None => (image, Some("latest")),
    }
}

/// Translate a spec into the daemon's container create body
pub(crate) fn create_body(spec: &ContainerSpec) -> ContainerCreateBody {
    let tmpfs: HashMap<String, String> = spec
        .tmpfs
        .iter()
        .map(|m| (m.target.clone(), m.options.clone()))
        .collect();

    ContainerCreateBody {
        image: Some(spec.image.clone()),
        cmd: Some(spec.command.clone()),
        working_dir: spec.working_dir.clone(),
        network_disabled: Some(spec.network_disabled),
        tty: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        attach_stdin: Some(spec.open_stdin),
        open_stdin: Some(spec.open_stdin),
        stdin_once: Some(spec.open_stdin),
        host_config: Some(HostConfig {
            memory: spec.memory_bytes,
            cpu_quota: spec.cpu_quota,
            cpu_period: Some(spec.cpu_period),
            pids_limit: spec.pids_limit,
            network_mode: spec.network_disabled.then(|| "none".to_owned()),
            readonly_rootfs: Some(spec.readonly_rootfs),
            tmpfs: (!tmpfs.is_empty()).then_some(tmpfs),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect_image(&self, image: &str) -> Result<(), ContainerError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(ContainerError::ImageNotFound(image.to_owned())),
            Err(e) => Err(api_error(e)),
        }
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<(), ContainerError> {
        let (name, tag) = split_reference(image);
        let options = CreateImageOptions {
            from_image: Some(name.to_owned()),
            tag: tag.map(str::to_owned),
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(update) = progress.next().await {
            let info = update.map_err(|e| ContainerError::PullFailed {
                image: image.to_owned(),
                message: e.to_string(),
            })?;
            if let Some(status) = info.status {
                trace!(%status, "pull progress");
            }
        }

        debug!("pull complete");
        Ok(())
    }

    #[instrument(skip(self, spec), fields(image = %spec.image))]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ContainerError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), create_body(spec))
            .await
            .map_err(api_error)?;

        for warning in &response.warnings {
            debug!(%warning, "container create warning");
        }
        Ok(response.id)
    }

    async fn upload_archive(
        &self,
        id: &str,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), ContainerError> {
        let options = UploadToContainerOptions {
            path: path.to_owned(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), bollard::body_full(Bytes::from(archive)))
            .await
            .map_err(api_error)
    }

    async fn start_container(&self, id: &str) -> Result<(), ContainerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await
            .map_err(api_error)
    }

    async fn write_stdin(&self, id: &str, input: &[u8]) -> Result<(), ContainerError> {
        let options = AttachContainerOptionsBuilder::default()
            .stdin(true)
            .stream(true)
            .build();
        let AttachContainerResults {
            output,
            input: mut stdin,
        } = self
            .docker
            .attach_container(id, Some(options))
            .await
            .map_err(api_error)?;

        let stdin_error = |e: std::io::Error| ContainerError::Stdin(e.to_string());
        stdin.write_all(input).await.map_err(stdin_error)?;
        stdin.flush().await.map_err(stdin_error)?;
        // Closing the attach stream is what delivers EOF to the program
        stdin.shutdown().await.map_err(stdin_error)?;
        drop(output);

        trace!(len = input.len(), "stdin written and closed");
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64, ContainerError> {
        let mut wait = self.docker.wait_container(id, None::<WaitContainerOptions>);
        match wait.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error; it is a normal outcome here
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(api_error(e)),
            None => Err(ContainerError::NoExitStatus(id.to_owned())),
        }
    }

    async fn kill_container(&self, id: &str) -> Result<(), ContainerError> {
        self.docker
            .kill_container(id, None::<KillContainerOptions>)
            .await
            .map_err(api_error)
    }

    async fn remove_container(&self, id: &str) -> Result<(), ContainerError> {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(api_error)
    }

    async fn container_logs(&self, id: &str) -> Result<Vec<u8>, ContainerError> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        // bollard already splits the stream; re-frame it so the demultiplexer
        // sees the daemon's wire format
        let mut buf = Vec::new();
        let mut logs = self.docker.logs(id, Some(options));
        while let Some(chunk) = logs.next().await {
            match chunk.map_err(api_error)? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    encode_frame(StreamKind::Stdout, &message, &mut buf)
                }
                LogOutput::StdErr { message } => {
                    encode_frame(StreamKind::Stderr, &message, &mut buf)
                }
                LogOutput::StdIn { message } => encode_frame(StreamKind::Stdin, &message, &mut buf),
            }
        }
        Ok(buf)
    }

    async fn container_stats(&self, id: &str) -> Result<ContainerStats, ContainerError> {
        let options = StatsOptionsBuilder::default()
            .stream(false)
            .one_shot(true)
            .build();
        let mut stats = self.docker.stats(id, Some(options));
        let snapshot = stats
            .next()
            .await
            .ok_or_else(|| ContainerError::Api(format!("no stats reported for {id}")))?
            .map_err(api_error)?;

        Ok(ContainerStats {
            memory_usage: snapshot.memory_stats.and_then(memory_reading),
        })
    }
}

/// Peak usage when reported, else current usage
///
/// An exited container reports zero usage under cgroup v2, which is an absent
/// reading rather than a measurement.
fn memory_reading(stats: ContainerMemoryStats) -> Option<u64> {
    stats
        .max_usage
        .filter(|&bytes| bytes > 0)
        .or(stats.usage)
        .filter(|&bytes| bytes > 0)
}
