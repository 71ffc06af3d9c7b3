/// Error types for the workflow core
///
/// Structural misuse, malformed documents and backing-store failures surface as
/// `WorkflowError`. Validation predicates return `bool` and lifecycle commands
/// issued from the wrong state are ignored, so neither has a variant here.

use crate::workflow::node::EndpointDirection;
use thiserror::Error;

/// Errors raised by the graph model, persistence codec and stores
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A node identifier that is not part of the graph
    #[error("no node with identifier {0}")]
    NodeNotFound(String),

    /// A connection that is not part of the graph
    #[error("no connection {0}")]
    ConnectionNotFound(String),

    /// Malformed persisted document
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Read/write failure on a file-backed store
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Failure of the SQLite-backed store
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Endpoint name collides with an existing static or dynamic endpoint
    #[error("invalid {direction} endpoint name '{name}'")]
    InvalidEndpoint {
        direction: EndpointDirection,
        name: String,
    },

    /// Unknown profile or removal of the default profile
    #[error("profile error: {0}")]
    Profile(String),

    /// Failure reported by a component controller
    #[error("component failure: {0}")]
    Component(String),
}

impl WorkflowError {
    /// Convenience constructor for parse errors
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Line number for parse errors
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Self::Io(std::io::Error::other(err));
        }
        Self::Parse {
            line: err.line(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
