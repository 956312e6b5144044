use serde::{Deserialize, Serialize};

use crate::types::ExecutionRequest;

/// Configuration for a programming language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ 17 (GCC)")
    pub name: String,

    /// Runtime image reference
    pub image: String,

    /// Source file name inside the working directory (e.g., "Main.java")
    pub filename: String,

    /// Compile command (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<String>,

    /// Run command
    pub run: String,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Build an execution request for `code` under this language's image and
    /// commands
    pub fn to_request(
        &self,
        id: &str,
        code: impl Into<String>,
        input: Option<String>,
    ) -> ExecutionRequest {
        ExecutionRequest {
            language: id.to_owned(),
            code: code.into(),
            filename: self.filename.clone(),
            image: self.image.clone(),
            compile_command: self.compile.clone(),
            run_command: self.run.clone(),
            input,
        }
    }
}
