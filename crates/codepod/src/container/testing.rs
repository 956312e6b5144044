//! Scripted in-memory container runtime
//!
//! Lets orchestrator and HTTP tests exercise every lifecycle path without a
//! container daemon. Each instance is configured up front and records the calls
//! it receives.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::container::logs::{StreamKind, encode_frame};
use crate::container::{ContainerError, ContainerRuntime, ContainerSpec, ContainerStats};

/// A runtime operation, as recorded by [`ScriptedRuntime`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    InspectImage(String),
    PullImage(String),
    Create(String),
    Upload { id: String, path: String },
    Start(String),
    WriteStdin(String),
    Wait(String),
    Kill(String),
    Remove(String),
    Logs(String),
    Stats(String),
}

/// Operation to make fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailAt {
    Create,
    Upload,
    Start,
    Stdin,
    Wait,
    Logs,
    Stats,
    Kill,
    Remove,
}

/// How the scripted program exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Exit immediately with a status code
    Code(i64),
    /// Exit with a status code after a delay
    After(Duration, i64),
    /// Never exit
    Hang,
}

#[derive(Debug)]
pub struct ScriptedRuntime {
    images: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
    specs: Mutex<Vec<ContainerSpec>>,
    uploads: Mutex<Vec<Vec<u8>>>,
    stdin: Mutex<Vec<u8>>,
    failures: HashSet<FailAt>,
    fail_pull: bool,
    exit: Exit,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    echo_stdin: bool,
    stall_stdin: bool,
    memory_usage: Option<u64>,
    next_id: AtomicUsize,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRuntime {
    /// A runtime whose containers exit 0 with no output
    pub fn new() -> Self {
        Self {
            images: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            stdin: Mutex::new(Vec::new()),
            failures: HashSet::new(),
            fail_pull: false,
            exit: Exit::Code(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            echo_stdin: false,
            stall_stdin: false,
            memory_usage: None,
            next_id: AtomicUsize::new(0),
        }
    }

    /// Mark an image as present locally
    pub fn with_image(self, image: impl Into<String>) -> Self {
        lock(&self.images).insert(image.into());
        self
    }

    pub fn fail_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    pub fn fail_at(mut self, step: FailAt) -> Self {
        self.failures.insert(step);
        self
    }

    pub fn exit(mut self, exit: Exit) -> Self {
        self.exit = exit;
        self
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.stdout.extend_from_slice(text.as_bytes());
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.stderr.extend_from_slice(text.as_bytes());
        self
    }

    /// Copy whatever is written to stdin onto stdout, like `cat`
    pub fn echo_stdin(mut self) -> Self {
        self.echo_stdin = true;
        self
    }

    /// Block forever inside `write_stdin`, like a program that never reads
    /// a pipe whose buffer is full
    pub fn stall_stdin(mut self) -> Self {
        self.stall_stdin = true;
        self
    }

    pub fn memory_usage(mut self, bytes: u64) -> Self {
        self.memory_usage = Some(bytes);
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Specs passed to `create_container`
    pub fn specs(&self) -> Vec<ContainerSpec> {
        lock(&self.specs).clone()
    }

    /// Archives passed to `upload_archive`
    pub fn uploads(&self) -> Vec<Vec<u8>> {
        lock(&self.uploads).clone()
    }

    /// Bytes written to stdin
    pub fn stdin_written(&self) -> Vec<u8> {
        lock(&self.stdin).clone()
    }

    pub fn has_image(&self, image: &str) -> bool {
        lock(&self.images).contains(image)
    }

    /// Number of kill calls received
    pub fn kills(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Kill(_)))
            .count()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn check(&self, step: FailAt, id: &str) -> Result<(), ContainerError> {
        if self.failures.contains(&step) {
            return Err(ContainerError::Api(format!("scripted {step:?} failure for {id}")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn inspect_image(&self, image: &str) -> Result<(), ContainerError> {
        self.record(Call::InspectImage(image.to_owned()));
        if self.has_image(image) {
            Ok(())
        } else {
            Err(ContainerError::ImageNotFound(image.to_owned()))
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), ContainerError> {
        self.record(Call::PullImage(image.to_owned()));
        if self.fail_pull {
            return Err(ContainerError::PullFailed {
                image: image.to_owned(),
                message: "manifest unknown".to_owned(),
            });
        }
        lock(&self.images).insert(image.to_owned());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ContainerError> {
        self.record(Call::Create(spec.image.clone()));
        self.check(FailAt::Create, &spec.image)?;
        lock(&self.specs).push(spec.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("scripted-{n}"))
    }

    async fn upload_archive(
        &self,
        id: &str,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), ContainerError> {
        self.record(Call::Upload {
            id: id.to_owned(),
            path: path.to_owned(),
        });
        self.check(FailAt::Upload, id)?;
        lock(&self.uploads).push(archive);
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<(), ContainerError> {
        self.record(Call::Start(id.to_owned()));
        self.check(FailAt::Start, id)
    }

    async fn write_stdin(&self, id: &str, input: &[u8]) -> Result<(), ContainerError> {
        self.record(Call::WriteStdin(id.to_owned()));
        self.check(FailAt::Stdin, id)?;
        if self.stall_stdin {
            std::future::pending::<()>().await;
        }
        lock(&self.stdin).extend_from_slice(input);
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64, ContainerError> {
        self.record(Call::Wait(id.to_owned()));
        self.check(FailAt::Wait, id)?;
        match self.exit {
            Exit::Code(code) => Ok(code),
            Exit::After(delay, code) => {
                tokio::time::sleep(delay).await;
                Ok(code)
            }
            Exit::Hang => std::future::pending().await,
        }
    }

    async fn kill_container(&self, id: &str) -> Result<(), ContainerError> {
        self.record(Call::Kill(id.to_owned()));
        if self.failures.contains(&FailAt::Kill) {
            return Err(ContainerError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), ContainerError> {
        self.record(Call::Remove(id.to_owned()));
        if self.failures.contains(&FailAt::Remove) {
            return Err(ContainerError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<Vec<u8>, ContainerError> {
        self.record(Call::Logs(id.to_owned()));
        self.check(FailAt::Logs, id)?;

        let mut buf = Vec::new();
        if !self.stdout.is_empty() {
            encode_frame(StreamKind::Stdout, &self.stdout, &mut buf);
        }
        if self.echo_stdin {
            encode_frame(StreamKind::Stdout, &self.stdin_written(), &mut buf);
        }
        if !self.stderr.is_empty() {
            encode_frame(StreamKind::Stderr, &self.stderr, &mut buf);
        }
        Ok(buf)
    }

    async fn container_stats(&self, id: &str) -> Result<ContainerStats, ContainerError> {
        self.record(Call::Stats(id.to_owned()));
        self.check(FailAt::Stats, id)?;
        Ok(ContainerStats {
            memory_usage: self.memory_usage,
        })
    }
}
