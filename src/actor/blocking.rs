//! Detached actors with a blocking receive.
//!
//! An actor spawned detached owns a dedicated OS thread and parks on the
//! mailbox condition variable instead of being scheduled cooperatively.
//! Each `receive` call takes the behavior to match lexically; the
//! unmatched-message cache is re-scanned at the start of every call, so
//! a behavior change never strands a cached message.

// Layer 1: Standard library imports
use std::sync::{Arc, Weak};
use std::time::Instant;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::address::ActorAddr;
use super::cell::ActorCore;
use super::context::ActorContext;
use super::dispatch::{self, DispatchState, Preprocessed};
use super::exit_reason::ExitReason;
use super::traits::{AbstractActor, Channel};
use crate::behavior::{Behavior, DispatchResult};
use crate::mailbox::Mailbox;
use crate::message::{MailboxElement, MessageId, Payload, TimeoutMsg};
use crate::system::ActorSystem;
use crate::util::ActorId;

/// Shared half of a detached actor: the channel other actors see.
pub struct BlockingActorCell {
    core: ActorCore,
    mailbox: Mailbox,
}

impl BlockingActorCell {
    pub(crate) fn create(system: &ActorSystem) -> Arc<BlockingActorCell> {
        let cell = Arc::new(BlockingActorCell {
            core: ActorCore::new(ActorId::next(), system.node(), false),
            mailbox: Mailbox::new(),
        });
        let cell_dyn: Arc<dyn AbstractActor> = cell.clone();
        let weak: Weak<dyn AbstractActor> = Arc::downgrade(&cell_dyn);
        cell.core.init_self_ref(weak);
        cell
    }
}

impl Channel for BlockingActorCell {
    fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        if self.core.exited() {
            self.core.bounce_request(&sender, mid);
            return;
        }
        let element = MailboxElement::new(sender.clone(), self.core.address(), mid, payload);
        if !self.mailbox.push(element) {
            self.core.bounce_request(&sender, mid);
        }
    }
}

impl AbstractActor for BlockingActorCell {
    fn core(&self) -> &ActorCore {
        &self.core
    }
}

enum StepOutcome {
    Matched,
    Continue,
    Exited,
}

/// Thread-side handle of a detached actor.
///
/// Owned by the closure passed to
/// [`spawn_detached`](crate::system::ActorSystem::spawn_detached) and
/// driven with explicit [`receive`](BlockingActor::receive) calls.
pub struct BlockingActor {
    cell: Arc<BlockingActorCell>,
    ctx: ActorContext,
    dispatch: DispatchState,
}

impl BlockingActor {
    pub(crate) fn new(system: ActorSystem, cell: Arc<BlockingActorCell>) -> Self {
        let ctx = ActorContext::new(system, cell.core.address());
        Self {
            cell,
            ctx,
            dispatch: DispatchState::new(),
        }
    }

    /// This actor's address.
    pub fn address(&self) -> ActorAddr {
        self.cell.core.address()
    }

    /// The mutable handler context, usable between receives as well.
    pub fn context(&mut self) -> &mut ActorContext {
        &mut self.ctx
    }

    /// Whether this actor has terminated (e.g. through `quit` or an
    /// untrapped exit message).
    pub fn exited(&self) -> bool {
        self.cell.core.exited()
    }

    /// Block until `behavior` handles one message or its timeout fires.
    ///
    /// Responses to outstanding requests and untrapped exit messages are
    /// processed transparently while waiting. Returns immediately once
    /// the actor has terminated.
    pub fn receive(&mut self, behavior: &Behavior) {
        if self.exited() {
            return;
        }
        let deadline = behavior
            .timeout()
            .map(|timeout| Instant::now() + timeout.duration());

        // the cache is scanned first on every receive
        let mut cached = self.dispatch.take_cache();
        while let Some(element) = cached.pop_front() {
            match self.step(behavior, element) {
                StepOutcome::Matched => {
                    self.dispatch.restore_cache(cached);
                    return;
                }
                StepOutcome::Exited => return,
                StepOutcome::Continue => {}
            }
        }

        loop {
            if !self.cell.mailbox.wait_nonempty(deadline) {
                if self.cell.mailbox.is_closed() {
                    return;
                }
                dispatch::run_timeout_handler(&mut self.ctx, behavior);
                self.after_handler();
                return;
            }
            let Some(element) = self.cell.mailbox.pop() else {
                continue;
            };
            match self.step(behavior, element) {
                StepOutcome::Matched | StepOutcome::Exited => return,
                StepOutcome::Continue => {}
            }
        }
    }

    fn step(&mut self, behavior: &Behavior, element: MailboxElement) -> StepOutcome {
        // detached actors use deadline waits, not timeout messages
        if element.payload.is::<TimeoutMsg>() {
            return StepOutcome::Continue;
        }
        match dispatch::preprocess(&mut self.ctx, element) {
            Preprocessed::Consumed => {
                if self.after_handler() {
                    StepOutcome::Exited
                } else {
                    StepOutcome::Continue
                }
            }
            Preprocessed::User(element) => {
                match dispatch::invoke_behavior(&mut self.ctx, behavior, &element) {
                    DispatchResult::Handled => {
                        if self.after_handler() {
                            StepOutcome::Exited
                        } else {
                            StepOutcome::Matched
                        }
                    }
                    DispatchResult::Skipped | DispatchResult::NoMatch => {
                        self.dispatch.push_cache(element);
                        StepOutcome::Continue
                    }
                }
            }
        }
    }

    /// Apply deferred handler effects; returns whether the actor
    /// terminated. Behavior-stack changes are meaningless for detached
    /// actors (receive composes lexically) and are discarded.
    fn after_handler(&mut self) -> bool {
        let _ = self.ctx.take_behavior_change();
        if let Some(reason) = self.ctx.take_quit() {
            self.finalize(reason);
            return true;
        }
        false
    }

    pub(crate) fn finalize(&mut self, reason: ExitReason) {
        self.cell.core.cleanup(reason);
        for element in self.cell.mailbox.close() {
            self.cell.core.bounce_element(&element);
        }
        for element in self.dispatch.take_cache() {
            self.cell.core.bounce_element(&element);
        }
        self.ctx.drop_pending();
    }

    /// Terminate when the thread closure returns; uses a pending `quit`
    /// reason when one is set, normal exit otherwise.
    pub(crate) fn shutdown(&mut self) {
        if self.exited() {
            return;
        }
        let reason = self.ctx.take_quit().unwrap_or(ExitReason::NORMAL);
        self.finalize(reason);
    }
}
