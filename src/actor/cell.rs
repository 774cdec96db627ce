//! Shared lifecycle state of every actor implementation.
//!
//! `ActorCore` owns the pieces common to scheduled actors, blocking
//! actors, scoped receivers, and remote proxies: the identity, the atomic
//! exit reason, the link set, and the attachable list. Links and
//! attachables are guarded by a single per-actor mutex; the atomic exit
//! reason provides lock-free fast-path reads.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::debug;

// Layer 3: Internal module imports
use super::address::ActorAddr;
use super::attachable::{Attachable, AttachToken};
use super::exit_reason::ExitReason;
use super::traits::{AbstractActor, Channel};
use crate::message::{ExitMsg, MailboxElement, MessageId, Payload, SyncExitedMsg};
use crate::util::{ActorId, NodeId};

struct CoreState {
    // links hold strong references; cycles are broken by exit-time cleanup
    links: Vec<Arc<dyn AbstractActor>>,
    attachables: Vec<Box<dyn Attachable>>,
}

/// Identity and lifecycle bookkeeping shared by all actor kinds.
pub struct ActorCore {
    id: ActorId,
    node: NodeId,
    is_proxy: bool,
    // ExitReason::NOT_EXITED while alive; written exactly once by cleanup
    exit_reason: AtomicU32,
    state: Mutex<CoreState>,
    self_ref: OnceLock<Weak<dyn AbstractActor>>,
}

impl ActorCore {
    /// Create the core of a new actor.
    pub(crate) fn new(id: ActorId, node: NodeId, is_proxy: bool) -> Self {
        Self {
            id,
            node,
            is_proxy,
            exit_reason: AtomicU32::new(ExitReason::NOT_EXITED.raw()),
            state: Mutex::new(CoreState {
                links: Vec::new(),
                attachables: Vec::new(),
            }),
            self_ref: OnceLock::new(),
        }
    }

    /// Record the owning actor; must be called once right after the
    /// enclosing `Arc` is created.
    pub(crate) fn init_self_ref(&self, weak: Weak<dyn AbstractActor>) {
        let _ = self.self_ref.set(weak);
    }

    /// The process-unique id of this actor.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// The node this actor runs on.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether this core belongs to a remote proxy.
    pub fn is_proxy(&self) -> bool {
        self.is_proxy
    }

    /// The address of the owning actor.
    pub fn address(&self) -> ActorAddr {
        self.self_ref
            .get()
            .and_then(Weak::upgrade)
            .map_or_else(ActorAddr::invalid, ActorAddr::from_actor)
    }

    /// The exit reason; [`ExitReason::NOT_EXITED`] while alive.
    pub fn exit_reason(&self) -> ExitReason {
        ExitReason::from_raw(self.exit_reason.load(Ordering::Acquire))
    }

    /// Whether the owning actor has terminated.
    pub fn exited(&self) -> bool {
        !self.exit_reason().is_not_exited()
    }

    /// Attach a termination callback.
    ///
    /// Returns `true` when the callback was stored; `false` when the
    /// actor had already exited, in which case the callback ran
    /// immediately with the stored reason.
    pub fn attach(&self, attachable: Box<dyn Attachable>) -> bool {
        {
            let mut st = self.state.lock();
            if self.exit_reason().is_not_exited() {
                st.attachables.push(attachable);
                return true;
            }
        }
        attachable.actor_exited(&self.address(), self.exit_reason());
        false
    }

    /// Detach the first attachable matching `token`.
    pub fn detach(&self, token: &AttachToken) {
        let mut st = self.state.lock();
        if let Some(pos) = st.attachables.iter().position(|a| a.matches(token)) {
            st.attachables.remove(pos);
        }
    }

    /// Link the owning actor to `other` (symmetric).
    ///
    /// If `other` has already exited, the caller receives an exit message
    /// immediately instead of a link.
    pub fn link_to(&self, other: &ActorAddr) {
        let self_addr = self.address();
        if !other.is_valid() || *other == self_addr || self.exited() {
            return;
        }
        let Some(peer) = other.actor() else { return };
        if !peer.core().establish_backlink(&self_addr) {
            // peer already exited and has notified us
            return;
        }
        let lost_race = {
            let mut st = self.state.lock();
            if self.exited() {
                true
            } else {
                if !st.links.iter().any(|l| l.address() == *other) {
                    st.links.push(Arc::clone(peer));
                }
                false
            }
        };
        if lost_race {
            // our own cleanup ran in between; undo the half-installed link
            peer.core().remove_backlink(&self_addr);
            other.enqueue(
                self_addr.clone(),
                MessageId::ASYNC,
                Payload::new(ExitMsg {
                    source: self_addr,
                    reason: self.exit_reason(),
                }),
            );
        }
    }

    /// Remove the link to `other` on both sides.
    pub fn unlink_from(&self, other: &ActorAddr) {
        let self_addr = self.address();
        self.remove_backlink(other);
        if let Some(peer) = other.actor() {
            peer.core().remove_backlink(&self_addr);
        }
    }

    /// One-sided link installation, called by the peer's `link_to`.
    ///
    /// Returns `true` when the owning actor is alive and holds the
    /// backlink afterwards; when it has already exited, the requester is
    /// notified with an exit message and `false` is returned.
    pub fn establish_backlink(&self, other: &ActorAddr) -> bool {
        if !other.is_valid() {
            return false;
        }
        let reason = {
            let mut st = self.state.lock();
            let reason = self.exit_reason();
            if reason.is_not_exited() {
                if !st.links.iter().any(|l| l.address() == *other) {
                    if let Some(actor) = other.actor() {
                        st.links.push(Arc::clone(actor));
                    }
                }
                return true;
            }
            reason
        };
        other.enqueue(
            self.address(),
            MessageId::ASYNC,
            Payload::new(ExitMsg {
                source: self.address(),
                reason,
            }),
        );
        false
    }

    /// One-sided link removal; returns whether a link was present.
    pub fn remove_backlink(&self, other: &ActorAddr) -> bool {
        let mut st = self.state.lock();
        let before = st.links.len();
        st.links.retain(|l| l.address() != *other);
        st.links.len() != before
    }

    /// Whether a link to `other` is currently held.
    pub fn has_link(&self, other: &ActorAddr) -> bool {
        self.state.lock().links.iter().any(|l| l.address() == *other)
    }

    /// Number of links currently held.
    pub fn link_count(&self) -> usize {
        self.state.lock().links.len()
    }

    /// Terminate the owning actor with `reason`.
    ///
    /// The transition happens at most once: the first caller wins and
    /// fires all attachables, notifies all links, and returns `true`;
    /// later callers observe `false`.
    pub fn cleanup(&self, reason: ExitReason) -> bool {
        if reason.is_not_exited() {
            return false;
        }
        if self
            .exit_reason
            .compare_exchange(
                ExitReason::NOT_EXITED.raw(),
                reason.raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        let (links, attachables) = {
            let mut st = self.state.lock();
            (
                std::mem::take(&mut st.links),
                std::mem::take(&mut st.attachables),
            )
        };
        let self_addr = self.address();
        debug!(actor = %self.id, %reason, "actor terminated");
        for attachable in attachables {
            attachable.actor_exited(&self_addr, reason);
        }
        for peer in links {
            peer.core().remove_backlink(&self_addr);
            peer.enqueue(
                self_addr.clone(),
                MessageId::ASYNC,
                Payload::new(ExitMsg {
                    source: self_addr.clone(),
                    reason,
                }),
            );
        }
        true
    }

    /// Answer a request aimed at this (terminated) actor with a
    /// sync-exited reply; non-requests are dropped by the caller.
    pub(crate) fn bounce_request(&self, sender: &ActorAddr, mid: MessageId) {
        if !mid.is_request() || !sender.is_valid() {
            return;
        }
        let self_addr = self.address();
        sender.enqueue(
            self_addr.clone(),
            mid.response_id(),
            Payload::new(SyncExitedMsg {
                source: self_addr,
                reason: self.exit_reason(),
            }),
        );
    }

    /// Bounce a drained mailbox element, answering sync requests and
    /// dropping everything else.
    pub(crate) fn bounce_element(&self, element: &MailboxElement) {
        self.bounce_request(&element.sender, element.mid);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::MailboxElement;

    struct SinkActor {
        core: ActorCore,
        received: Mutex<Vec<MailboxElement>>,
    }

    impl SinkActor {
        fn spawn() -> Arc<SinkActor> {
            let actor = Arc::new(SinkActor {
                core: ActorCore::new(ActorId::next(), NodeId::local(), false),
                received: Mutex::new(Vec::new()),
            });
            let actor_dyn: Arc<dyn AbstractActor> = actor.clone();
            let weak: Weak<dyn AbstractActor> = Arc::downgrade(&actor_dyn);
            actor.core.init_self_ref(weak);
            actor
        }

        fn received(&self) -> Vec<MailboxElement> {
            self.received.lock().clone()
        }
    }

    impl Channel for SinkActor {
        fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
            if self.core.exited() {
                self.core.bounce_request(&sender, mid);
                return;
            }
            let receiver = self.core.address();
            self.received
                .lock()
                .push(MailboxElement::new(sender, receiver, mid, payload));
        }
    }

    impl AbstractActor for SinkActor {
        fn core(&self) -> &ActorCore {
            &self.core
        }
    }

    #[test]
    fn test_address_identity_stable() {
        let actor = SinkActor::spawn();
        let addr1 = actor.address();
        let addr2 = actor.address();

        assert_eq!(addr1, addr2);
        assert!(addr1.is_valid());

        let other = SinkActor::spawn();
        assert_ne!(addr1, other.address());
    }

    #[test]
    fn test_link_symmetry() {
        let a = SinkActor::spawn();
        let b = SinkActor::spawn();

        a.link_to(&b.address());
        assert!(a.has_link(&b.address()));
        assert!(b.has_link(&a.address()));

        a.unlink_from(&b.address());
        assert!(!a.has_link(&b.address()));
        assert!(!b.has_link(&a.address()));
    }

    #[test]
    fn test_unlink_from_either_side() {
        let a = SinkActor::spawn();
        let b = SinkActor::spawn();

        a.link_to(&b.address());
        b.unlink_from(&a.address());

        assert!(!a.has_link(&b.address()));
        assert!(!b.has_link(&a.address()));
    }

    #[test]
    fn test_link_is_idempotent() {
        let a = SinkActor::spawn();
        let b = SinkActor::spawn();

        a.link_to(&b.address());
        a.link_to(&b.address());

        assert_eq!(a.core.link_count(), 1);
        assert_eq!(b.core.link_count(), 1);
    }

    #[test]
    fn test_link_to_self_is_noop() {
        let a = SinkActor::spawn();
        a.link_to(&a.address());
        assert_eq!(a.core.link_count(), 0);
    }

    #[test]
    fn test_cleanup_fires_once() {
        let actor = SinkActor::spawn();
        assert!(actor.core.cleanup(ExitReason::from_raw(7)));
        assert!(!actor.core.cleanup(ExitReason::NORMAL));
        assert_eq!(actor.exit_reason(), ExitReason::from_raw(7));
    }

    #[test]
    fn test_cleanup_notifies_links() {
        let a = SinkActor::spawn();
        let b = SinkActor::spawn();
        a.link_to(&b.address());

        b.core.cleanup(ExitReason::from_raw(3));

        let received = a.received();
        assert_eq!(received.len(), 1);
        let exit = received[0].payload.downcast_ref::<ExitMsg>().unwrap();
        assert_eq!(exit.source, b.address());
        assert_eq!(exit.reason, ExitReason::from_raw(3));
        // the dead peer is no longer in the link set
        assert!(!a.has_link(&b.address()));
    }

    #[test]
    fn test_link_to_exited_peer_notifies_immediately() {
        let a = SinkActor::spawn();
        let b = SinkActor::spawn();
        b.core.cleanup(ExitReason::from_raw(9));

        a.link_to(&b.address());

        let received = a.received();
        assert_eq!(received.len(), 1);
        let exit = received[0].payload.downcast_ref::<ExitMsg>().unwrap();
        assert_eq!(exit.reason, ExitReason::from_raw(9));
        assert_eq!(a.core.link_count(), 0);
    }

    #[test]
    fn test_attach_after_exit_runs_immediately() {
        use std::sync::atomic::AtomicU32;
        let actor = SinkActor::spawn();
        actor.core.cleanup(ExitReason::from_raw(4));

        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);
        let stored = actor.attach(Box::new(super::super::attachable::FunctorAttachable::new(
            move |reason: ExitReason| seen_clone.store(reason.raw(), Ordering::SeqCst),
        )));

        assert!(!stored);
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_attachables_fire_exactly_once() {
        use std::sync::atomic::AtomicU32;
        let actor = SinkActor::spawn();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);
        actor.attach(Box::new(super::super::attachable::FunctorAttachable::new(
            move |_| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        )));

        actor.core.cleanup(ExitReason::NORMAL);
        actor.core.cleanup(ExitReason::from_raw(5));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_monitor_fires_down_msg_per_call() {
        use crate::message::DownMsg;
        let observed = SinkActor::spawn();
        let observer = SinkActor::spawn();

        observed.attach_monitor(observer.address());
        observed.attach_monitor(observer.address());
        observed.core.cleanup(ExitReason::from_raw(2));

        let received = observer.received();
        let downs: Vec<_> = received
            .iter()
            .filter_map(|el| el.payload.downcast_ref::<DownMsg>())
            .collect();
        assert_eq!(downs.len(), 2);
        assert_eq!(downs[0].reason, ExitReason::from_raw(2));
    }

    #[test]
    fn test_demonitor_removes_single_monitor() {
        use crate::message::DownMsg;
        let observed = SinkActor::spawn();
        let observer = SinkActor::spawn();

        observed.attach_monitor(observer.address());
        observed.attach_monitor(observer.address());
        observed.detach_monitor(&observer.address());
        observed.core.cleanup(ExitReason::NORMAL);

        let downs = observer
            .received()
            .iter()
            .filter(|el| el.payload.is::<DownMsg>())
            .count();
        assert_eq!(downs, 1);
    }

    #[test]
    fn test_bounce_request_answers_sync_exited() {
        let dead = SinkActor::spawn();
        let requester = SinkActor::spawn();
        dead.core.cleanup(ExitReason::from_raw(7));

        let mid = MessageId::request(1);
        dead.enqueue(requester.address(), mid, Payload::new("ignored"));

        let received = requester.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].mid, mid.response_id());
        let bounced = received[0].payload.downcast_ref::<SyncExitedMsg>().unwrap();
        assert_eq!(bounced.source, dead.address());
        assert_eq!(bounced.reason, ExitReason::from_raw(7));
    }

    #[test]
    fn test_bounce_drops_async_messages() {
        let dead = SinkActor::spawn();
        let sender = SinkActor::spawn();
        dead.core.cleanup(ExitReason::NORMAL);

        dead.enqueue(sender.address(), MessageId::ASYNC, Payload::new(1u8));

        assert!(sender.received().is_empty());
    }
}
