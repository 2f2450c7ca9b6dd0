use herd_core::{CoordinatorError, TransportError};
use thiserror::Error;

/// Failures seen by cluster clients.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The request never got a reply: no handler, timeout or disconnect.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The remote side replied with `status=error`.
    #[error("{0}")]
    Remote(String),

    /// A reply arrived but did not have the expected shape.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The task carrying a request went away before finishing.
    #[error("request abandoned before completion")]
    Abandoned,

    #[error("timed out acquiring lock {0}")]
    LockTimeout(String),

    #[error("failed to start coordinator: {0}")]
    Coordinator(#[from] CoordinatorError),
}

impl ClusterError {
    /// The remote error message, if this is a `status=error` reply.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ClusterError::Remote(message) => Some(message),
            _ => None,
        }
    }
}
