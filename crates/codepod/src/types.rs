use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-side execution policy
///
/// Every field is optional so a partial table in the configuration file only
/// overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Memory limit as a human-readable string (e.g. "128m")
    #[serde(default)]
    pub memory_limit: Option<String>,

    /// CPU limit as a fractional core count (e.g. "0.5")
    #[serde(default)]
    pub cpu_limit: Option<String>,

    /// Maximum number of processes/threads inside the container
    #[serde(default)]
    pub max_processes: Option<i64>,
}

impl ResourceLimits {
    /// Default wall clock timeout
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
    /// Default memory limit
    pub const DEFAULT_MEMORY: &'static str = "128m";
    /// Default CPU limit
    pub const DEFAULT_CPU: &'static str = "0.5";
    /// Default process ceiling
    pub const DEFAULT_MAX_PROCESSES: i64 = 50;

    /// Create new resource limits with all fields set to None
    pub fn new() -> Self {
        Self {
            timeout_ms: None,
            memory_limit: None,
            cpu_limit: None,
            max_processes: None,
        }
    }

    /// Set the wall clock timeout in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set the memory limit (e.g. "256m")
    pub fn with_memory_limit(mut self, memory: impl Into<String>) -> Self {
        self.memory_limit = Some(memory.into());
        self
    }

    /// Set the CPU limit (e.g. "1.5")
    pub fn with_cpu_limit(mut self, cpu: impl Into<String>) -> Self {
        self.cpu_limit = Some(cpu.into());
        self
    }

    /// Set the maximum number of processes
    pub fn with_max_processes(mut self, count: i64) -> Self {
        self.max_processes = Some(count);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            memory_limit: overrides
                .memory_limit
                .clone()
                .or_else(|| self.memory_limit.clone()),
            cpu_limit: overrides
                .cpu_limit
                .clone()
                .or_else(|| self.cpu_limit.clone()),
            max_processes: overrides.max_processes.or(self.max_processes),
        }
    }

    /// Resolve into concrete options, filling gaps with the built-in defaults
    pub fn to_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout_ms: self.timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS),
            memory_limit: self
                .memory_limit
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MEMORY.to_owned()),
            cpu_limit: self
                .cpu_limit
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_CPU.to_owned()),
            max_processes: self.max_processes.unwrap_or(Self::DEFAULT_MAX_PROCESSES),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout_ms: Some(Self::DEFAULT_TIMEOUT_MS),
            memory_limit: Some(Self::DEFAULT_MEMORY.to_owned()),
            cpu_limit: Some(Self::DEFAULT_CPU.to_owned()),
            max_processes: Some(Self::DEFAULT_MAX_PROCESSES),
        }
    }
}

/// Limits applied to a single execution
///
/// Derived from server policy, never from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub timeout_ms: u64,
    pub memory_limit: String,
    pub cpu_limit: String,
    pub max_processes: i64,
}

impl ExecutionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ResourceLimits::default().to_options()
    }
}

/// A request to execute one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Language identifier (informational; the image and commands drive execution)
    pub language: String,

    /// Source code text
    pub code: String,

    /// Name of the source file inside the working directory
    pub filename: String,

    /// Runtime image reference
    #[serde(rename = "dockerImage")]
    pub image: String,

    /// Compile step, absent for interpreted languages
    #[serde(default)]
    pub compile_command: Option<String>,

    /// Run step
    pub run_command: String,

    /// Text fed to the program's standard input
    #[serde(default)]
    pub input: Option<String>,
}

impl ExecutionRequest {
    /// Check the request against size bounds and filename rules
    pub fn validate(&self, bounds: &RequestBounds) -> Result<(), ValidationError> {
        if self.code.is_empty() {
            return Err(ValidationError::Missing("code"));
        }
        if self.language.trim().is_empty() {
            return Err(ValidationError::Missing("language"));
        }
        if self.filename.is_empty() {
            return Err(ValidationError::Missing("filename"));
        }
        if self.image.trim().is_empty() {
            return Err(ValidationError::Missing("dockerImage"));
        }
        if self.run_command.trim().is_empty() {
            return Err(ValidationError::Missing("runCommand"));
        }

        let code_len = self.code.chars().count();
        if code_len > bounds.max_code_length {
            return Err(ValidationError::CodeTooLong {
                len: code_len,
                max: bounds.max_code_length,
            });
        }

        if let Some(ref input) = self.input {
            let input_len = input.chars().count();
            if input_len > bounds.max_input_length {
                return Err(ValidationError::InputTooLong {
                    len: input_len,
                    max: bounds.max_input_length,
                });
            }
        }

        if !is_safe_filename(&self.filename) {
            return Err(ValidationError::InvalidFilename(self.filename.clone()));
        }

        Ok(())
    }

    /// Stdin text, if any non-empty text was supplied
    pub fn stdin(&self) -> Option<&str> {
        self.input.as_deref().filter(|input| !input.is_empty())
    }
}

/// Whether a filename is a single, plain path component
///
/// Allows `[A-Za-z0-9._-]`, rejects a leading dot (which also rules out `.`
/// and `..`).
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Size bounds enforced on incoming requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBounds {
    /// Maximum source length in characters
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,

    /// Maximum stdin length in characters
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,
}

fn default_max_code_length() -> usize {
    50_000
}

fn default_max_input_length() -> usize {
    10_000
}

impl Default for RequestBounds {
    fn default() -> Self {
        Self {
            max_code_length: default_max_code_length(),
            max_input_length: default_max_input_length(),
        }
    }
}

/// Request rejected before any container was created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    Missing(&'static str),

    #[error("code exceeds maximum length of {max} characters (got {len})")]
    CodeTooLong { len: usize, max: usize },

    #[error("input exceeds maximum length of {max} characters (got {len})")]
    InputTooLong { len: usize, max: usize },

    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
}

/// Result of an execution
///
/// If `success` is false, `error` always carries a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Whether the program exited with status 0
    pub success: bool,

    /// Captured standard output, trimmed
    pub output: String,

    /// Captured standard error or failure cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall clock milliseconds from acceptance to result
    pub execution_time: u64,

    /// Memory usage in bytes, when stats were available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
}

impl ExecutionResult {
    /// Build a failed result carrying `error`
    pub fn failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            execution_time: millis(elapsed),
            memory_usage: None,
        }
    }

    /// Build the result reported when the deadline fires first
    pub fn timed_out(timeout_ms: u64, elapsed: Duration) -> Self {
        Self::failure(format!("Execution timed out after {timeout_ms}ms"), elapsed)
    }

    /// Check if the execution was successful
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
