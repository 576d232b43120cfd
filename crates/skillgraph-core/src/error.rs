//! Error taxonomy shared by every skillgraph crate.
//!
//! Infrastructure failures are errors. A composed program that exits non-zero is not: it is
//! reported as an `ExecutionResult` with `success: false`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{node_type} node '{name}' not found")]
    NotFound { node_type: String, name: String },

    #[error("{node_type} node named '{name}' already exists")]
    AlreadyExists { node_type: String, name: String },

    #[error("CONTAINS edge {source_id} -> {target_id} would create a cycle")]
    CircularDependency { source_id: String, target_id: String },

    #[error("invalid inline metadata in '{script}': {message}")]
    DependencyParse { script: String, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("env file error for bundle '{bundle}': {message}")]
    EnvFile { bundle: String, message: String },

    #[error("script execution failed: {0}")]
    ExecutionFailed(String),

    #[error("script execution timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            node_type: node_type.into(),
            name: name.into(),
        }
    }

    pub fn dependency_parse(script: Option<&str>, message: impl Into<String>) -> Self {
        Self::DependencyParse {
            script: script.unwrap_or("<inline>").to_string(),
            message: message.into(),
        }
    }

    /// True for launch/IO failures and timeouts (a timeout is a kind of execution failure).
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_) | Self::Timeout { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
