//! Scoped receivers: an actor-shaped bridge for non-actor code.
//!
//! A scoped receiver gives the surrounding task (`main`, a test body, a
//! service handler) an address other actors can reply to, plus an async
//! inbox to await those replies on. It participates in the registry and
//! in address serialization like any hidden actor, but runs no dispatch
//! loop of its own.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use super::address::ActorAddr;
use super::cell::ActorCore;
use super::exit_reason::ExitReason;
use super::traits::{AbstractActor, Channel};
use crate::message::{MailboxElement, MessageId, Payload};
use crate::system::ActorSystem;
use crate::util::ActorId;

/// Channel half of a scoped receiver.
pub struct ScopedCell {
    core: ActorCore,
    tx: Mutex<mpsc::UnboundedSender<MailboxElement>>,
}

impl Channel for ScopedCell {
    fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        if self.core.exited() {
            self.core.bounce_request(&sender, mid);
            return;
        }
        let element = MailboxElement::new(sender.clone(), self.core.address(), mid, payload);
        if self.tx.lock().send(element).is_err() {
            self.core.bounce_request(&sender, mid);
        }
    }
}

impl AbstractActor for ScopedCell {
    fn core(&self) -> &ActorCore {
        &self.core
    }
}

/// An inbox with an actor address, owned by ordinary (non-actor) code.
///
/// # Example
/// ```rust,no_run
/// use swarm_rt::actor::Scoped;
/// use swarm_rt::message::Payload;
/// use swarm_rt::system::{ActorSystem, SystemConfig};
///
/// # async fn example() {
/// let system = ActorSystem::new(SystemConfig::default());
/// let mut scoped = Scoped::new(&system);
/// // ... send from scoped.address(), then:
/// let reply = scoped.recv().await;
/// # }
/// ```
pub struct Scoped {
    system: ActorSystem,
    cell: Arc<ScopedCell>,
    rx: mpsc::UnboundedReceiver<MailboxElement>,
    stash: VecDeque<MailboxElement>,
    request_counter: u64,
}

impl Scoped {
    /// Create a scoped receiver registered (hidden) with `system`.
    pub fn new(system: &ActorSystem) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cell = Arc::new(ScopedCell {
            core: ActorCore::new(ActorId::next(), system.node(), false),
            tx: Mutex::new(tx),
        });
        let cell_dyn: Arc<dyn AbstractActor> = cell.clone();
        let weak: Weak<dyn AbstractActor> = Arc::downgrade(&cell_dyn);
        cell.core.init_self_ref(weak);
        system
            .registry()
            .put(cell.core.id(), Arc::clone(&cell) as Arc<dyn AbstractActor>);
        Self {
            system: system.clone(),
            cell,
            rx,
            stash: VecDeque::new(),
            request_counter: 0,
        }
    }

    /// The address other actors reply to.
    pub fn address(&self) -> ActorAddr {
        self.cell.core.address()
    }

    /// Send an asynchronous message with this receiver as sender.
    pub fn send(&self, target: &ActorAddr, payload: Payload) {
        target.enqueue(self.address(), MessageId::ASYNC, payload);
    }

    /// Issue a synchronous request; returns the request id to await the
    /// response with.
    pub fn request(&mut self, target: &ActorAddr, payload: Payload) -> MessageId {
        self.request_counter += 1;
        let mid = MessageId::request(self.request_counter);
        target.enqueue(self.address(), mid, payload);
        mid
    }

    /// Install a one-way monitor on `whom` reporting into this inbox.
    pub fn monitor(&self, whom: &ActorAddr) {
        if let Some(actor) = whom.actor() {
            actor.attach_monitor(self.address());
        }
    }

    /// Await the next delivery.
    pub async fn recv(&mut self) -> Option<MailboxElement> {
        if let Some(stashed) = self.stash.pop_front() {
            return Some(stashed);
        }
        self.rx.recv().await
    }

    /// Await the next delivery for at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<MailboxElement> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Await the response to a request issued with
    /// [`request`](Self::request), stashing unrelated deliveries.
    pub async fn await_response(
        &mut self,
        request: MessageId,
        timeout: Duration,
    ) -> Option<MailboxElement> {
        let response_id = request.response_id().with_normal_priority();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .unwrap_or(Duration::ZERO);
            let element = tokio::time::timeout(remaining, self.rx.recv())
                .await
                .ok()
                .flatten()?;
            if element.mid.with_normal_priority() == response_id {
                return Some(element);
            }
            self.stash.push_back(element);
        }
    }
}

impl Drop for Scoped {
    fn drop(&mut self) {
        self.system.registry().erase(self.cell.core.id());
        self.cell.core.cleanup(ExitReason::NORMAL);
        // bounce deliveries still in flight
        while let Ok(element) = self.rx.try_recv() {
            self.cell.core.bounce_element(&element);
        }
    }
}
