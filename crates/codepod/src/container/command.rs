//! Shell command composition
//!
//! A run is a two-stage pipeline: an optional compile step gated in front of a
//! mandatory run step. Both stages execute under a single `sh -c` so the
//! container manages one process tree.

use std::fmt;

/// Shell used to launch the composed command
pub const SHELL: &str = "/bin/sh";

/// Compilation stage (e.g. `g++ -O2 -o main main.cpp`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileStep(String);

impl CompileStep {
    /// Wrap a compile command; blank commands mean "no compile step"
    pub fn new(command: impl Into<String>) -> Option<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            None
        } else {
            Some(Self(command))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Execution stage (e.g. `./main`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStep(String);

impl RunStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self(command.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compile-then-run pipeline with a failure gate between the stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellPipeline {
    compile: Option<CompileStep>,
    run: RunStep,
}

impl ShellPipeline {
    pub fn new(compile: Option<CompileStep>, run: RunStep) -> Self {
        Self { compile, run }
    }

    /// Build a pipeline from raw request strings
    pub fn from_commands(compile: Option<&str>, run: &str) -> Self {
        Self::new(compile.and_then(CompileStep::new), RunStep::new(run))
    }

    /// Whether the pipeline has a compile stage
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// The single shell line the container executes
    ///
    /// With a compile step: `<compile> && if [ $? -ne 0 ]; then exit 1; fi && <run>`.
    /// A failing compile short-circuits the `&&` chain, so the run step never
    /// starts and the shell exits with the compiler's status.
    pub fn compose(&self) -> String {
        match self.compile {
            Some(ref compile) => format!(
                "{} && if [ $? -ne 0 ]; then exit 1; fi && {}",
                compile.as_str(),
                self.run.as_str()
            ),
            None => self.run.as_str().to_owned(),
        }
    }

    /// Argument vector for the container entrypoint
    pub fn argv(&self) -> Vec<String> {
        vec![SHELL.to_owned(), "-c".to_owned(), self.compose()]
    }
}

impl fmt::Display for ShellPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreted_is_just_the_run_step() {
        let pipeline = ShellPipeline::from_commands(None, "python3 main.py");
        assert!(!pipeline.is_compiled());
        assert_eq!(pipeline.compose(), "python3 main.py");
    }

    #[test]
    fn compiled_is_gated() {
        let pipeline = ShellPipeline::from_commands(Some("g++ -o main main.cpp"), "./main");
        assert!(pipeline.is_compiled());
        assert_eq!(
            pipeline.compose(),
            "g++ -o main main.cpp && if [ $? -ne 0 ]; then exit 1; fi && ./main"
        );
    }

    #[test]
    fn blank_compile_command_is_ignored() {
        let pipeline = ShellPipeline::from_commands(Some("   "), "node main.js");
        assert!(!pipeline.is_compiled());
        assert_eq!(pipeline.compose(), "node main.js");
    }

    #[test]
    fn argv_runs_through_shell() {
        let pipeline = ShellPipeline::from_commands(Some("javac Main.java"), "java Main");
        let argv = pipeline.argv();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[0], "/bin/sh");
        assert_eq!(argv[1], "-c");
        assert_eq!(argv[2], pipeline.compose());
    }

    #[test]
    fn display_matches_compose() {
        let pipeline = ShellPipeline::from_commands(Some("gcc main.c"), "./a.out");
        assert_eq!(pipeline.to_string(), pipeline.compose());
    }
}
