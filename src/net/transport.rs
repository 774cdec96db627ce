//! The transport seam between proxies and the wire.
//!
//! A transport owns one ordered, lossless byte stream to a peer node and
//! is responsible for framing, TLS, and reconnection policy. The core
//! hands it outgoing frames and receives incoming ones through a
//! [`FrameSink`] bound to the middleman.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use thiserror::Error;

// Layer 3: Internal module imports
use super::wire::Frame;
use crate::actor::ActorAddr;
use crate::message::{MessageId, Payload};
use crate::util::NodeId;

/// Transport-level failures.
#[derive(Debug, Error, Clone)]
pub enum NetworkError {
    /// The connection is gone.
    #[error("transport closed")]
    Closed,

    /// Stream-level failure.
    #[error("network error: {0}")]
    Io(String),
}

/// One connection to a peer node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ship a frame to the peer.
    async fn send_frame(&self, frame: Frame) -> Result<(), NetworkError>;

    /// Tear the connection down; pending sends may fail with
    /// [`NetworkError::Closed`].
    fn close(&self);
}

/// Incoming-frame callback handed to transports: delivers frames and
/// connection-loss notifications into the middleman.
#[derive(Clone)]
pub struct FrameSink {
    middleman: ActorAddr,
}

/// Internal middleman message carrying one incoming frame.
#[derive(Clone)]
pub(crate) struct IncomingFrame(pub(crate) Frame);

/// Internal middleman message reporting a lost connection.
#[derive(Debug, Clone)]
pub(crate) struct TransportFailed {
    pub(crate) node: NodeId,
}

impl FrameSink {
    pub(crate) fn new(middleman: ActorAddr) -> Self {
        Self { middleman }
    }

    /// Deliver a frame received from the peer.
    pub fn deliver(&self, frame: Frame) {
        self.middleman.enqueue(
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(IncomingFrame(frame)),
        );
    }

    /// Report that the connection to `node` closed.
    pub fn connection_closed(&self, node: NodeId) {
        self.middleman.enqueue(
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(TransportFailed { node }),
        );
    }
}
