// Layer 1: Standard library imports
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::traits::AbstractActor;
use crate::message::{MessageId, Payload};
use crate::util::{ActorId, NodeId};

/// A possibly-null handle identifying an actor in or across processes.
///
/// A valid address owns a strong reference to the actor (local or proxy)
/// together with its identity. Addresses compare by `(node, id)`, which
/// coincides with pointer identity for local actors (ids are unique
/// within a process), and the invalid address compares less than any
/// valid one.
///
/// # Example
/// ```rust
/// use swarm_rt::actor::ActorAddr;
///
/// let invalid = ActorAddr::invalid();
/// assert!(!invalid.is_valid());
/// assert_eq!(invalid, ActorAddr::invalid());
/// ```
#[derive(Clone, Default)]
pub struct ActorAddr {
    inner: Option<Arc<dyn AbstractActor>>,
}

impl ActorAddr {
    /// The invalid (null) address.
    pub fn invalid() -> Self {
        Self { inner: None }
    }

    /// Wrap an actor into an address.
    pub fn from_actor(actor: Arc<dyn AbstractActor>) -> Self {
        Self { inner: Some(actor) }
    }

    /// Whether this address denotes an actual actor.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// The id of the referenced actor, or [`ActorId::INVALID`].
    pub fn id(&self) -> ActorId {
        self.inner.as_ref().map_or(ActorId::INVALID, |a| a.id())
    }

    /// The node of the referenced actor, or [`NodeId::ZERO`].
    pub fn node(&self) -> NodeId {
        self.inner.as_ref().map_or(NodeId::ZERO, |a| a.node())
    }

    /// Whether the referenced actor is a proxy for a remote actor.
    pub fn is_remote(&self) -> bool {
        self.inner.as_ref().is_some_and(|a| a.is_proxy())
    }

    /// Borrow the referenced actor, if any.
    pub fn actor(&self) -> Option<&Arc<dyn AbstractActor>> {
        self.inner.as_ref()
    }

    /// Deliver a message to the referenced actor; no-op when invalid.
    pub fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        if let Some(actor) = &self.inner {
            actor.enqueue(sender, mid, payload);
        }
    }

    /// Deliver an asynchronous message without a sender.
    pub fn send_anonymous(&self, payload: Payload) {
        self.enqueue(ActorAddr::invalid(), MessageId::ASYNC, payload);
    }

    fn key(&self) -> Option<(NodeId, ActorId)> {
        self.inner.as_ref().map(|a| (a.node(), a.id()))
    }
}

impl PartialEq for ActorAddr {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ActorAddr {}

impl PartialOrd for ActorAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        // None sorts first: an invalid address is less than any valid one
        self.key().cmp(&other.key())
    }
}

impl Hash for ActorAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for ActorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(actor) => write!(f, "ActorAddr({}@{})", actor.id(), actor.node()),
            None => write!(f, "ActorAddr(invalid)"),
        }
    }
}

impl fmt::Display for ActorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(actor) => write!(f, "{}@{}", actor.id(), actor.node()),
            None => write!(f, "invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address() {
        let addr = ActorAddr::invalid();

        assert!(!addr.is_valid());
        assert!(!addr.is_remote());
        assert_eq!(addr.id(), ActorId::INVALID);
        assert_eq!(addr.node(), NodeId::ZERO);
    }

    #[test]
    fn test_invalid_addresses_equal() {
        assert_eq!(ActorAddr::invalid(), ActorAddr::invalid());
        assert_eq!(ActorAddr::default(), ActorAddr::invalid());
    }

    #[test]
    fn test_enqueue_on_invalid_is_noop() {
        // must not panic
        ActorAddr::invalid().enqueue(
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(1u8),
        );
        ActorAddr::invalid().send_anonymous(Payload::empty());
    }

    #[test]
    fn test_invalid_display() {
        assert_eq!(ActorAddr::invalid().to_string(), "invalid");
    }
}
