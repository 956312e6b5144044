//! Container specification builder
//!
//! Describes the isolated environment for one execution independently of the
//! runtime API that eventually creates it.

use serde::{Deserialize, Serialize};

use crate::container::limits::CPU_PERIOD;

/// An in-memory scratch mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmpfsMount {
    /// Mount point inside the container
    pub target: String,

    /// Mount options (e.g. `rw,noexec,nosuid,size=100m`)
    pub options: String,
}

impl TmpfsMount {
    pub fn new(target: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            options: options.into(),
        }
    }
}

/// Builder for the isolated environment of a single execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name
    pub name: Option<String>,
    /// Runtime image reference
    pub image: String,
    /// Entrypoint argument vector
    pub command: Vec<String>,
    /// Working directory inside the container
    pub working_dir: Option<String>,
    /// Hard memory limit in bytes
    pub memory_bytes: Option<i64>,
    /// CPU quota in microseconds per `cpu_period`
    pub cpu_quota: Option<i64>,
    pub cpu_period: i64,
    /// Process-count ceiling
    pub pids_limit: Option<i64>,
    pub tmpfs: Vec<TmpfsMount>,
    pub network_disabled: bool,
    pub readonly_rootfs: bool,
    /// Remove the container as soon as it exits
    pub auto_remove: bool,
    /// Keep stdin open for a single attach
    pub open_stdin: bool,
}

impl ContainerSpec {
    /// Create a spec for `image` with networking disabled
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: None,
            image: image.into(),
            command: Vec::new(),
            working_dir: None,
            memory_bytes: None,
            cpu_quota: None,
            cpu_period: CPU_PERIOD,
            pids_limit: None,
            tmpfs: Vec::new(),
            network_disabled: true,
            readonly_rootfs: false,
            auto_remove: false,
            open_stdin: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the command to run
    pub fn command(mut self, cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = cmd.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the memory limit in bytes
    pub fn memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = Some(i64::try_from(bytes).unwrap_or(i64::MAX));
        self
    }

    /// Set the CPU quota per [`CPU_PERIOD`]
    pub fn cpu_quota(mut self, quota: i64) -> Self {
        self.cpu_quota = Some(quota);
        self
    }

    pub fn pids_limit(mut self, limit: i64) -> Self {
        self.pids_limit = Some(limit);
        self
    }

    /// Add a tmpfs mount
    pub fn tmpfs(mut self, mount: TmpfsMount) -> Self {
        self.tmpfs.push(mount);
        self
    }

    /// Add multiple tmpfs mounts
    pub fn tmpfs_mounts(mut self, mounts: impl IntoIterator<Item = TmpfsMount>) -> Self {
        self.tmpfs.extend(mounts);
        self
    }

    pub fn network_disabled(mut self, disabled: bool) -> Self {
        self.network_disabled = disabled;
        self
    }

    pub fn auto_remove(mut self, enable: bool) -> Self {
        self.auto_remove = enable;
        self
    }

    pub fn open_stdin(mut self, enable: bool) -> Self {
        self.open_stdin = enable;
        self
    }
}
