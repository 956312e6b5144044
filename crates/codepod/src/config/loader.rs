//! Configuration file loading for codepod
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};
use crate::container::try_parse_memory;
use crate::types::is_safe_filename;

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_executions == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_executions must be at least 1".to_owned(),
            ));
        }
        if self.limits.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_owned()));
        }
        if let Some(max) = self.limits.max_processes
            && max <= 0
        {
            return Err(ConfigError::Invalid(format!(
                "max_processes must be positive, got {max}"
            )));
        }
        if let Some(ref memory) = self.limits.memory_limit
            && try_parse_memory(memory).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "memory_limit '{memory}' is not a size like 128m"
            )));
        }
        if let Some(ref cpu) = self.limits.cpu_limit
            && !cpu.trim().parse::<f64>().is_ok_and(|c| c.is_finite() && c > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "cpu_limit '{cpu}' is not a positive core count"
            )));
        }

        if !self.docker.workspace_dir.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "workspace_dir '{}' must be absolute",
                self.docker.workspace_dir
            )));
        }
        let workspace = Path::new(&self.docker.workspace_dir);
        for mount in &self.docker.scratch_mounts {
            if !mount.target.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "scratch mount target '{}' must be absolute",
                    mount.target
                )));
            }
            // Mounted after extraction, so it would hide the uploaded source
            if workspace.starts_with(&mount.target) {
                return Err(ConfigError::Invalid(format!(
                    "scratch mount '{}' covers workspace_dir '{}'",
                    mount.target, self.docker.workspace_dir
                )));
            }
        }

        // Validate all languages have required fields
        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.image.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty image"
                )));
            }
            if !is_safe_filename(&lang.filename) {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid filename '{}'",
                    lang.filename
                )));
            }
            if lang.run.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref compile) = lang.compile
                && compile.trim().is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty compile command"
                )));
            }
        }

        Ok(())
    }
}
