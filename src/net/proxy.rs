//! Local stand-ins for remote actors.
//!
//! A proxy implements the channel interface like any local actor, but
//! diverts every enqueue into the middleman, which serializes the header
//! and hands the frame to the transport bound to the proxy's node. A
//! killed proxy (node disconnect or explicit kill) is a permanently-dead
//! channel: it drops asynchronous messages and bounces sync requests.

// Layer 1: Standard library imports
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::{AbstractActor, ActorAddr, ActorCore, Channel, ExitReason};
use crate::message::{MessageId, Payload};
use crate::util::{ActorId, NodeId};

/// Message diverted from a proxy into the middleman for forwarding.
#[derive(Clone)]
pub(crate) struct ForwardedMessage {
    pub(crate) node: NodeId,
    pub(crate) aid: ActorId,
    pub(crate) sender: ActorAddr,
    pub(crate) mid: MessageId,
    pub(crate) payload: Payload,
}

/// A non-owning local reference to an actor on another node.
pub struct ActorProxy {
    core: ActorCore,
    forwarder: ActorAddr,
}

impl ActorProxy {
    /// Create a proxy for `(node, aid)` routing through `forwarder`
    /// (the middleman actor).
    pub fn new(aid: ActorId, node: NodeId, forwarder: ActorAddr) -> Arc<ActorProxy> {
        let proxy = Arc::new(ActorProxy {
            core: ActorCore::new(aid, node, true),
            forwarder,
        });
        let proxy_dyn: Arc<dyn AbstractActor> = proxy.clone();
        let weak: Weak<dyn AbstractActor> = Arc::downgrade(&proxy_dyn);
        proxy.core.init_self_ref(weak);
        proxy
    }

    /// Terminate this proxy; subsequent enqueues bounce sync requests
    /// with `reason` and drop everything else.
    pub fn kill(&self, reason: ExitReason) {
        self.core.cleanup(reason);
    }
}

impl Channel for ActorProxy {
    fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        if self.core.exited() {
            self.core.bounce_request(&sender, mid);
            return;
        }
        self.forwarder.enqueue(
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(ForwardedMessage {
                node: self.core.node(),
                aid: self.core.id(),
                sender,
                mid,
                payload,
            }),
        );
    }
}

impl AbstractActor for ActorProxy {
    fn core(&self) -> &ActorCore {
        &self.core
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::util::HostId;

    fn remote_node() -> NodeId {
        NodeId::new(4242, HostId::from_bytes([7; crate::util::HOST_ID_SIZE]))
    }

    #[test]
    fn test_proxy_identity() {
        let proxy = ActorProxy::new(ActorId::from_raw(9), remote_node(), ActorAddr::invalid());

        assert!(proxy.is_proxy());
        assert_eq!(proxy.id(), ActorId::from_raw(9));
        assert_eq!(proxy.node(), remote_node());
        assert!(proxy.address().is_remote());
    }

    #[test]
    fn test_killed_proxy_is_dead_channel() {
        let proxy = ActorProxy::new(ActorId::from_raw(9), remote_node(), ActorAddr::invalid());
        proxy.kill(ExitReason::REMOTE_NODE_UNREACHABLE);

        assert!(proxy.exited());
        assert_eq!(proxy.exit_reason(), ExitReason::REMOTE_NODE_UNREACHABLE);
        // async enqueue is dropped without panicking
        proxy.enqueue(ActorAddr::invalid(), MessageId::ASYNC, Payload::new(1u8));
    }
}
