//! Error types for the coordinator and its collaborators.

use thiserror::Error;

/// Failures of a transport round trip or registration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Nobody is registered at the address.
    #[error("no handlers for address {0}")]
    NoHandlers(String),

    /// No reply arrived within the timeout.
    #[error("timed out waiting for a reply from {0}")]
    Timeout(String),

    /// The handler went away without replying.
    #[error("handler at {0} disconnected before replying")]
    Disconnected(String),

    /// The address is already served by an exclusive registration.
    #[error("address {0} is already in use")]
    AddressInUse(String),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("transport is closed")]
    Closed,
}

/// Failures reported by a deployment runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeployError {
    #[error("empty {0} descriptor")]
    EmptyDescriptor(&'static str),

    #[error("Invalid deployment {0}.")]
    UnknownDeployment(String),

    #[error("deployment {id} is not a {expected}")]
    KindMismatch { id: String, expected: &'static str },

    #[error("module {0} is not installed")]
    NotInstalled(String),

    #[error("runtime did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Failed(String),
}

/// Execution errors raised while applying an operation to the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(i64),

    #[error("No such element.")]
    NoSuchElement,

    /// A counter held something other than an integer.
    #[error("counter {0} does not hold an integer")]
    NotACounter(String),
}

/// Failures starting a coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Another coordinator already serves this cluster on the transport.
    #[error("a coordinator for cluster {0} is already running")]
    AlreadyRunning(String),

    /// The command handler could not be registered.
    #[error("failed to register coordinator handler: {0}")]
    Register(#[source] TransportError),
}
