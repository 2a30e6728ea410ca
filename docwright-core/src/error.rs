//! Error taxonomy shared by every docwright component.
//!
//! Each component fails with its own tagged error; [`DocError`] bundles them so
//! the orchestration layer can propagate any of them with `?` while the HTTP
//! boundary still sees which kind of failure happened.

use thiserror::Error;

/// A required request field was absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The source text is not valid Python.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid Python source at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    /// 1-based line of the first offending node.
    pub line: usize,
    /// 1-based column of the first offending node.
    pub column: usize,
}

/// Failure of the external text-completion capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("completion request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion request could not be sent: {0}")]
    Transport(String),
    #[error("completion response was malformed: {0}")]
    Malformed(String),
}

/// Failure of the repository content service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("repository request failed with status {status}")]
    Status { status: u16 },
    #[error("repository rate limit still exceeded after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },
    #[error("repository request could not be sent: {0}")]
    Transport(String),
    #[error("repository response was malformed: {0}")]
    Malformed(String),
}

/// Any failure of the documentation pipeline.
#[derive(Debug, Error)]
pub enum DocError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to write documentation: {0}")]
    Io(#[from] std::io::Error),
}
