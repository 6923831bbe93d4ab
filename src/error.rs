//! Error types.
//!
//! The pure text components (resolver, codec, disambiguator grouping, diff
//! engine) never fail; these types cover the sandbox boundary, collaborator
//! calls, session preconditions and configuration loading.

use crate::duplicates::DuplicateGroup;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A compile or runtime failure of a predicate script, with its source
/// position when the interpreter reports one.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        ScriptError { message: message.into(), line: None, column: None }
    }

    pub fn at(message: impl Into<String>, line: Option<usize>, column: Option<usize>) -> Self {
        ScriptError { message: message.into(), line, column }
    }
}

/// Failures of the isolated execution context itself.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to start sandbox worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("sandbox worker stopped before reporting: {0}")]
    WorkerLost(String),
}

/// Categorized failure of the script generator or test-case suggester.
///
/// Each variant renders as one human-readable message; the engine never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("script generation is not configured: {0}")]
    ConfigurationMissing(String),
    #[error("could not reach the script generator: {0}")]
    NetworkUnreachable(String),
    #[error("the script generator reported an error: {0}")]
    Backend(String),
    #[error("script generation failed: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Stable category name for display and logs.
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::ConfigurationMissing(_) => "configuration-missing",
            GenerationError::NetworkUnreachable(_) => "network-unreachable",
            GenerationError::Backend(_) => "backend-error",
            GenerationError::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisambiguationError {
    #[error("no duplicate group with tail '{0}'")]
    UnknownTail(String),
    #[error("'{option}' is not an option for '{tail}'")]
    UnknownOption { tail: String, option: String },
}

/// Authoring-session precondition and collaborator failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{} variable name(s) need a choice before generating", .0.len())]
    UnresolvedCollisions(Vec<DuplicateGroup>),
    #[error("there is no pending proposal to accept")]
    NoPendingProposal,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Disambiguation(#[from] DisambiguationError),
}

/// Invalid option files, directory files or environment values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
