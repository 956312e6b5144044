use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::language::Language;
use crate::container::TmpfsMount;
use crate::types::{ExecutionOptions, RequestBounds, ResourceLimits};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../codepod.example.toml");

/// Default working directory inside every container
pub const DEFAULT_WORKSPACE_DIR: &str = "/workspace";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for codepod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection to and container settings for the Docker daemon
    #[serde(default)]
    pub docker: DockerConfig,

    /// Execution policy applied to every request.
    ///
    /// Fields left out fall back to the built-in policy (10s, 128m, 0.5 CPU,
    /// 50 processes).
    #[serde(default)]
    pub limits: ResourceLimits,

    /// Size bounds for incoming requests
    #[serde(default)]
    pub bounds: RequestBounds,

    /// Maximum number of containers running at once
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,

    #[serde(default)]
    pub server: ServerConfig,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a config with default policy and no languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the embedded example configuration
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::parse_toml(EXAMPLE_CONFIG)
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Language IDs in sorted order
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// The concrete limits every execution runs under
    pub fn execution_options(&self) -> ExecutionOptions {
        self.limits.to_options()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker: DockerConfig::default(),
            limits: ResourceLimits::default(),
            bounds: RequestBounds::default(),
            max_concurrent_executions: default_max_concurrent_executions(),
            server: ServerConfig::default(),
            languages: HashMap::new(),
        }
    }
}

fn default_max_concurrent_executions() -> usize {
    16
}

/// Docker daemon and container settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Daemon socket path (uses `DOCKER_HOST` or the platform default if not
    /// specified)
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Have the daemon delete containers as soon as they exit.
    ///
    /// Off by default: a fast program's container can disappear before its
    /// logs are read. When off, every container is force-removed once its logs
    /// and stats have been collected.
    #[serde(default = "default_auto_remove")]
    pub auto_remove: bool,

    /// Directory the source file is extracted into
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// In-memory scratch mounts
    ///
    /// The daemon mounts these at start, after the source archive has been
    /// extracted, so none may cover `workspace_dir`.
    #[serde(default = "default_scratch_mounts")]
    pub scratch_mounts: Vec<TmpfsMount>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: None,
            auto_remove: default_auto_remove(),
            workspace_dir: default_workspace_dir(),
            scratch_mounts: default_scratch_mounts(),
        }
    }
}

fn default_auto_remove() -> bool {
    false
}

fn default_workspace_dir() -> String {
    DEFAULT_WORKSPACE_DIR.to_owned()
}

fn default_scratch_mounts() -> Vec<TmpfsMount> {
    vec![TmpfsMount::new("/tmp", "rw,noexec,nosuid,size=100m")]
}

/// HTTP service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3001))
}
