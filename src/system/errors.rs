//! System-level error types.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::actor::ExitReason;
use crate::net::transport::NetworkError;

/// Errors surfaced by runtime operations.
#[derive(Error, Debug, Clone)]
pub enum SystemError {
    /// A publish could not bind the requested port.
    #[error("failed to bind port {port}")]
    BindFailure {
        /// The requested port.
        port: u16,
    },

    /// Transport-level failure during connect or accept.
    #[error("network error: {0}")]
    Network(String),

    /// Endpoint resolved but unreachable, or the handshake failed.
    #[error("cannot connect to node at {host}:{port}")]
    CannotConnectToNode {
        /// Target hostname.
        host: String,
        /// Target port.
        port: u16,
    },

    /// Caller passed an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A request's deadline expired.
    #[error("request timed out")]
    SyncTimeout,

    /// The target of a request had already terminated.
    #[error("request target already exited: {reason}")]
    SyncExited {
        /// The target's final exit reason.
        reason: ExitReason,
    },

    /// The system no longer accepts new operations.
    #[error("system shutdown in progress")]
    ShuttingDown,

    /// Running actor limit reached.
    #[error("actor limit exceeded: current {current}, max {max}")]
    ActorLimitExceeded {
        /// Actors currently running.
        current: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Graceful shutdown did not finish in time.
    #[error("shutdown timeout exceeded after {0:?}")]
    ShutdownTimeout(Duration),
}

impl SystemError {
    /// Whether retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SystemError::SyncTimeout | SystemError::Network(_) | SystemError::ActorLimitExceeded { .. }
        )
    }

    /// Whether the system cannot continue operating.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SystemError::ShuttingDown | SystemError::ShutdownTimeout(_)
        )
    }
}

impl From<NetworkError> for SystemError {
    fn from(error: NetworkError) -> Self {
        SystemError::Network(error.to_string())
    }
}
