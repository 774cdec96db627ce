//! The mutable execution context handed to message handlers.
//!
//! The context carries everything a handler may touch: the actor's own
//! address, the sender and id of the message being processed, the
//! pending-request table of the synchronous protocol, and the deferred
//! effects (behavior changes, quit) applied by the dispatch loop after
//! the handler returns.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio::task::JoinHandle;

// Layer 3: Internal module imports
use super::address::ActorAddr;
use super::exit_reason::ExitReason;
use super::response_promise::ResponsePromise;
use crate::behavior::Behavior;
use crate::message::{MessageId, Payload, SyncExitedMsg, SyncTimeoutMsg};
use crate::system::ActorSystem;

/// Treated as "no deadline" by [`ActorContext::request`].
pub const INFINITE: Duration = Duration::MAX;

pub(crate) type RequestContinuation = Box<dyn FnOnce(&mut ActorContext, Payload) + Send>;

pub(crate) struct PendingRequest {
    continuation: Option<RequestContinuation>,
    timer: Option<JoinHandle<()>>,
}

impl PendingRequest {
    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub(crate) fn take_continuation(&mut self) -> Option<RequestContinuation> {
        self.continuation.take()
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

pub(crate) enum BehaviorChange {
    Replace(Behavior),
    Push(Behavior),
    Pop,
}

struct CurrentElement {
    sender: ActorAddr,
    mid: MessageId,
}

/// Actor-side API surface available while a handler runs.
pub struct ActorContext {
    system: ActorSystem,
    self_addr: ActorAddr,
    trap_exit: bool,
    current: Option<CurrentElement>,
    request_counter: u64,
    pending: HashMap<u64, PendingRequest>,
    pending_change: Option<BehaviorChange>,
    quit_reason: Option<ExitReason>,
}

impl ActorContext {
    pub(crate) fn new(system: ActorSystem, self_addr: ActorAddr) -> Self {
        Self {
            system,
            self_addr,
            trap_exit: false,
            current: None,
            request_counter: 0,
            pending: HashMap::new(),
            pending_change: None,
            quit_reason: None,
        }
    }

    /// The address of the running actor.
    pub fn address(&self) -> &ActorAddr {
        &self.self_addr
    }

    /// The actor system this actor belongs to.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Whether exit messages are delivered as regular messages instead of
    /// terminating this actor.
    pub fn trap_exit(&self) -> bool {
        self.trap_exit
    }

    /// Enable or disable exit trapping.
    pub fn set_trap_exit(&mut self, trap_exit: bool) {
        self.trap_exit = trap_exit;
    }

    /// Sender of the message currently being processed.
    pub fn current_sender(&self) -> Option<&ActorAddr> {
        self.current.as_ref().map(|c| &c.sender)
    }

    /// Message id of the message currently being processed.
    pub fn current_message_id(&self) -> Option<MessageId> {
        self.current.as_ref().map(|c| c.mid)
    }

    /// Send an asynchronous message with this actor as sender.
    pub fn send(&self, target: &ActorAddr, payload: Payload) {
        target.enqueue(self.self_addr.clone(), MessageId::ASYNC, payload);
    }

    /// Send an asynchronous high-priority message.
    pub fn send_high_priority(&self, target: &ActorAddr, payload: Payload) {
        target.enqueue(
            self.self_addr.clone(),
            MessageId::ASYNC.with_high_priority(),
            payload,
        );
    }

    /// Issue a synchronous request and register a continuation for its
    /// outcome.
    ///
    /// Exactly one of a response, [`SyncTimeoutMsg`], or
    /// [`SyncExitedMsg`] reaches the continuation, which runs at most
    /// once on this actor. Pass [`INFINITE`] to wait without a deadline.
    pub fn request<F>(&mut self, target: &ActorAddr, timeout: Duration, payload: Payload, f: F)
    where
        F: FnOnce(&mut ActorContext, Payload) + Send + 'static,
    {
        self.request_impl(target, timeout, payload, false, f)
    }

    /// Like [`request`](Self::request), keeping the priority bit set
    /// through request and response.
    pub fn request_high_priority<F>(
        &mut self,
        target: &ActorAddr,
        timeout: Duration,
        payload: Payload,
        f: F,
    ) where
        F: FnOnce(&mut ActorContext, Payload) + Send + 'static,
    {
        self.request_impl(target, timeout, payload, true, f)
    }

    fn request_impl<F>(
        &mut self,
        target: &ActorAddr,
        timeout: Duration,
        payload: Payload,
        high_priority: bool,
        f: F,
    ) where
        F: FnOnce(&mut ActorContext, Payload) + Send + 'static,
    {
        self.request_counter += 1;
        let counter = self.request_counter;
        let mut mid = MessageId::request(counter);
        if high_priority {
            mid = mid.with_high_priority();
        }

        if target.is_valid() {
            target.enqueue(self.self_addr.clone(), mid, payload);
        } else {
            // nobody will ever answer: complete the exchange right away
            self.self_addr.enqueue(
                target.clone(),
                mid.response_id(),
                Payload::new(SyncExitedMsg {
                    source: target.clone(),
                    reason: ExitReason::UNKNOWN,
                }),
            );
        }

        let timer = if timeout == INFINITE {
            None
        } else {
            let self_addr = self.self_addr.clone();
            let peer = target.clone();
            let response_id = mid.response_id();
            Some(self.system.runtime_handle().spawn(async move {
                tokio::time::sleep(timeout).await;
                self_addr.enqueue(peer, response_id, Payload::new(SyncTimeoutMsg));
            }))
        };

        self.pending.insert(
            counter,
            PendingRequest {
                continuation: Some(Box::new(f)),
                timer,
            },
        );
    }

    /// Reply to the message currently being processed.
    ///
    /// For a synchronous request the reply carries the derived response
    /// id and marks the request answered; replying a second time is a
    /// no-op. For an asynchronous message this is a plain send back to
    /// the sender.
    pub fn respond(&mut self, payload: Payload) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.mid.is_request() {
            if current.mid.is_answered() {
                return;
            }
            let response_id = current.mid.response_id();
            current.mid.mark_as_answered();
            let sender = current.sender.clone();
            sender.enqueue(self.self_addr.clone(), response_id, payload);
        } else {
            let sender = current.sender.clone();
            sender.enqueue(self.self_addr.clone(), MessageId::ASYNC, payload);
        }
    }

    /// Defer the reply to the current message into a promise.
    pub fn make_response_promise(&mut self) -> ResponsePromise {
        match self.current.as_mut() {
            Some(current) => {
                let promise = ResponsePromise::new(
                    self.self_addr.clone(),
                    current.sender.clone(),
                    current.mid.response_id(),
                );
                // the promise now owns the obligation to answer
                current.mid.mark_as_answered();
                promise
            }
            None => ResponsePromise::new(
                self.self_addr.clone(),
                ActorAddr::invalid(),
                MessageId::ASYNC,
            ),
        }
    }

    /// Replace the current behavior after this handler returns.
    pub fn set_behavior(&mut self, behavior: Behavior) {
        self.pending_change = Some(BehaviorChange::Replace(behavior));
    }

    /// Push a behavior on the stack, keeping the current one below it.
    pub fn push_behavior(&mut self, behavior: Behavior) {
        self.pending_change = Some(BehaviorChange::Push(behavior));
    }

    /// Pop the current behavior; popping the last one terminates the
    /// actor normally.
    pub fn pop_behavior(&mut self) {
        self.pending_change = Some(BehaviorChange::Pop);
    }

    /// Terminate this actor with `reason` after this handler returns.
    pub fn quit(&mut self, reason: ExitReason) {
        self.quit_reason = Some(reason);
    }

    /// Link this actor to `other`; if `other` already exited, the exit
    /// message arrives immediately.
    pub fn link_to(&self, other: &ActorAddr) {
        if let Some(actor) = self.self_addr.actor() {
            actor.link_to(other);
        }
    }

    /// Remove the link to `other` on both sides.
    pub fn unlink_from(&self, other: &ActorAddr) {
        if let Some(actor) = self.self_addr.actor() {
            actor.unlink_from(other);
        }
    }

    /// Install a one-way monitor on `whom`; one down message arrives per
    /// call when it terminates.
    pub fn monitor(&self, whom: &ActorAddr) {
        if let Some(actor) = whom.actor() {
            actor.attach_monitor(self.self_addr.clone());
        }
    }

    /// Remove one monitor previously installed on `whom`.
    pub fn demonitor(&self, whom: &ActorAddr) {
        if let Some(actor) = whom.actor() {
            actor.detach_monitor(&self.self_addr);
        }
    }

    // --- dispatch-loop interface -------------------------------------

    pub(crate) fn set_current(&mut self, sender: ActorAddr, mid: MessageId) {
        self.current = Some(CurrentElement { sender, mid });
    }

    pub(crate) fn clear_current(&mut self) {
        self.current = None;
    }

    pub(crate) fn take_pending(&mut self, response_mid: MessageId) -> Option<PendingRequest> {
        if !response_mid.is_response() {
            return None;
        }
        let mut pending = self.pending.remove(&response_mid.request_value())?;
        pending.cancel_timer();
        Some(pending)
    }

    pub(crate) fn has_pending_requests(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn take_behavior_change(&mut self) -> Option<BehaviorChange> {
        self.pending_change.take()
    }

    pub(crate) fn take_quit(&mut self) -> Option<ExitReason> {
        self.quit_reason.take()
    }

    pub(crate) fn drop_pending(&mut self) {
        self.pending.clear();
    }
}
