//! The channel and actor abstractions every message destination implements.
//!
//! A [`Channel`] is anything that accepts `enqueue`: local actors, remote
//! proxies, and multicast groups. An [`AbstractActor`] is a channel with
//! an identity and the shared lifecycle bookkeeping of [`ActorCore`]; the
//! trait methods all delegate to the core so concrete actor kinds only
//! provide storage and their own enqueue path.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::address::ActorAddr;
use super::attachable::{Attachable, AttachToken, MonitorAttachable};
use super::cell::ActorCore;
use super::exit_reason::ExitReason;
use crate::message::{MessageId, Payload};
use crate::util::{ActorId, NodeId};

/// Anything that accepts asynchronous message delivery.
///
/// `enqueue` never blocks and never reports an error: delivery into a
/// terminal channel runs the sync-request bouncer for request ids and
/// silently drops everything else.
pub trait Channel: Send + Sync {
    /// Deliver a message to this channel.
    fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload);
}

/// Base interface of all actor implementations: local scheduled actors,
/// detached blocking actors, scoped receivers, and remote proxies.
pub trait AbstractActor: Channel {
    /// The shared lifecycle state of this actor.
    fn core(&self) -> &ActorCore;

    /// The process-unique id of this actor.
    fn id(&self) -> ActorId {
        self.core().id()
    }

    /// The node this actor runs on.
    fn node(&self) -> NodeId {
        self.core().node()
    }

    /// Whether this actor represents a remote actor.
    fn is_proxy(&self) -> bool {
        self.core().is_proxy()
    }

    /// The address of this actor.
    fn address(&self) -> ActorAddr {
        self.core().address()
    }

    /// The exit reason, or [`ExitReason::NOT_EXITED`] while alive.
    fn exit_reason(&self) -> ExitReason {
        self.core().exit_reason()
    }

    /// Whether this actor has terminated.
    fn exited(&self) -> bool {
        self.core().exited()
    }

    /// Attach a callback executed on termination.
    ///
    /// Returns `false` if the actor already exited, in which case the
    /// callback has run immediately and was not retained.
    fn attach(&self, attachable: Box<dyn Attachable>) -> bool {
        self.core().attach(attachable)
    }

    /// Detach the first attachable matching `token`.
    fn detach(&self, token: &AttachToken) {
        self.core().detach(token)
    }

    /// Install a one-way monitor delivering a down message to `observer`
    /// when this actor terminates.
    fn attach_monitor(&self, observer: ActorAddr) {
        self.core()
            .attach(Box::new(MonitorAttachable::new(observer)));
    }

    /// Remove one monitor previously installed for `observer`.
    fn detach_monitor(&self, observer: &ActorAddr) {
        self.core()
            .detach(&AttachToken::Monitor(observer.clone()));
    }

    /// Couple this actor's lifetime to `other` (symmetric).
    fn link_to(&self, other: &ActorAddr) {
        self.core().link_to(other)
    }

    /// Remove the link to `other` on both sides.
    fn unlink_from(&self, other: &ActorAddr) {
        self.core().unlink_from(other)
    }

    /// Whether this actor currently holds a link to `other`.
    fn has_link(&self, other: &ActorAddr) -> bool {
        self.core().has_link(other)
    }
}
