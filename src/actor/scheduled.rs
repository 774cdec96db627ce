//! Event-based actors executed by the cooperative scheduler.
//!
//! A scheduled actor is resumed by worker tasks with a throughput budget
//! and never blocks: when its mailbox runs dry it reports
//! `AwaitingMessage` and is rescheduled by the next enqueue. Behavior
//! timeouts are delivered as timeout messages armed per behavior
//! activation.

// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

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
use crate::scheduler::{ExecutionUnit, Resumable, ResumeResult, RunState, Schedulable, Scheduler};
use crate::system::ActorSystem;
use crate::util::ActorId;

pub(crate) type InitFn = Box<dyn FnOnce(&mut ActorContext) -> Behavior + Send>;

struct ActorInner {
    ctx: ActorContext,
    dispatch: DispatchState,
    init: Option<InitFn>,
}

enum Step {
    Terminate(ExitReason),
    Await,
    BudgetExhausted,
}

/// A cooperatively scheduled, event-based actor.
pub struct ScheduledActor {
    core: ActorCore,
    mailbox: Mailbox,
    run_state: RunState,
    scheduler: Scheduler,
    // exclusively held by the worker currently running the actor
    inner: Mutex<Option<ActorInner>>,
    self_weak: OnceLock<Weak<ScheduledActor>>,
}

impl ScheduledActor {
    pub(crate) fn create(system: &ActorSystem, init: InitFn) -> Arc<ScheduledActor> {
        let actor = Arc::new(ScheduledActor {
            core: ActorCore::new(ActorId::next(), system.node(), false),
            mailbox: Mailbox::new(),
            run_state: RunState::new(),
            scheduler: system.scheduler().clone(),
            inner: Mutex::new(None),
            self_weak: OnceLock::new(),
        });
        let actor_dyn: Arc<dyn AbstractActor> = actor.clone();
        let weak: Weak<dyn AbstractActor> = Arc::downgrade(&actor_dyn);
        actor.core.init_self_ref(weak);
        let _ = actor.self_weak.set(Arc::downgrade(&actor));
        let ctx = ActorContext::new(system.clone(), actor.core.address());
        *actor.inner.lock() = Some(ActorInner {
            ctx,
            dispatch: DispatchState::new(),
            init: Some(init),
        });
        actor
    }

    fn wakeup(&self) {
        if let Some(actor) = self.self_weak.get().and_then(Weak::upgrade) {
            self.scheduler.schedule(actor);
        }
    }

    /// Process a single element through the dispatch pipeline. Returns
    /// `true` when the element was consumed.
    fn process_element(
        &self,
        inner: &mut ActorInner,
        unit: &mut ExecutionUnit,
        element: MailboxElement,
    ) -> bool {
        if let Some(timeout) = element.payload.downcast_ref::<TimeoutMsg>() {
            if inner.dispatch.timeout_is_current(timeout.timeout_id) {
                if let Some(behavior) = inner.dispatch.current() {
                    dispatch::run_timeout_handler(&mut inner.ctx, &behavior);
                }
                inner.dispatch.timeout_fired();
                self.apply_effects(inner);
                self.arm_timeout_if_needed(inner, unit);
            }
            return true;
        }
        match dispatch::preprocess(&mut inner.ctx, element) {
            Preprocessed::Consumed => {
                self.apply_effects(inner);
                true
            }
            Preprocessed::User(element) => {
                let Some(behavior) = inner.dispatch.current() else {
                    inner.dispatch.push_cache(element);
                    return false;
                };
                match dispatch::invoke_behavior(&mut inner.ctx, &behavior, &element) {
                    DispatchResult::Handled => {
                        self.apply_effects(inner);
                        true
                    }
                    DispatchResult::Skipped | DispatchResult::NoMatch => {
                        inner.dispatch.push_cache(element);
                        false
                    }
                }
            }
        }
    }

    fn apply_effects(&self, inner: &mut ActorInner) {
        if let Some(change) = inner.ctx.take_behavior_change() {
            inner.dispatch.apply(change);
        }
    }

    fn arm_timeout_if_needed(&self, inner: &mut ActorInner, unit: &mut ExecutionUnit) {
        if !inner.dispatch.timeout_needs_arm() {
            return;
        }
        let Some(duration) = inner
            .dispatch
            .current()
            .and_then(|b| b.timeout().map(|t| t.duration()))
        else {
            inner.dispatch.timeout_not_needed();
            return;
        };
        let timeout_id = inner.dispatch.arm_timeout();
        let addr = self.core.address();
        unit.runtime().spawn(async move {
            tokio::time::sleep(duration).await;
            addr.enqueue(
                ActorAddr::invalid(),
                MessageId::ASYNC,
                Payload::new(TimeoutMsg { timeout_id }),
            );
        });
    }

    fn run_loop(
        &self,
        inner: &mut ActorInner,
        unit: &mut ExecutionUnit,
        max_throughput: usize,
    ) -> Step {
        // first resume installs the initial behavior
        if let Some(init) = inner.init.take() {
            match catch_unwind(AssertUnwindSafe(|| init(&mut inner.ctx))) {
                Ok(behavior) => {
                    inner.dispatch.install(behavior);
                    self.apply_effects(inner);
                }
                Err(_) => return Step::Terminate(ExitReason::UNHANDLED_EXCEPTION),
            }
        }
        let mut handled = 0usize;
        loop {
            if let Some(reason) = inner.ctx.take_quit() {
                return Step::Terminate(reason);
            }
            if inner.dispatch.is_inert() && !inner.ctx.has_pending_requests() {
                return Step::Terminate(ExitReason::NORMAL);
            }
            self.arm_timeout_if_needed(inner, unit);
            if inner.dispatch.take_scan_flag() && inner.dispatch.cache_len() > 0 {
                let mut cached = inner.dispatch.take_cache();
                while let Some(element) = cached.pop_front() {
                    if self.process_element(inner, unit, element) {
                        handled += 1;
                    }
                    if let Some(reason) = inner.ctx.take_quit() {
                        inner.dispatch.restore_cache(cached);
                        return Step::Terminate(reason);
                    }
                    if handled >= max_throughput {
                        inner.dispatch.restore_cache(cached);
                        return Step::BudgetExhausted;
                    }
                }
                continue;
            }
            match self.mailbox.pop() {
                Some(element) => {
                    if self.process_element(inner, unit, element) {
                        handled += 1;
                    }
                    if handled >= max_throughput {
                        return Step::BudgetExhausted;
                    }
                }
                None => return Step::Await,
            }
        }
    }

    fn finalize(&self, inner: Option<ActorInner>, reason: ExitReason) {
        self.core.cleanup(reason);
        for element in self.mailbox.close() {
            self.core.bounce_element(&element);
        }
        if let Some(mut inner) = inner {
            for element in inner.dispatch.take_cache() {
                self.core.bounce_element(&element);
            }
            inner.ctx.drop_pending();
        }
    }
}

impl Channel for ScheduledActor {
    fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        if self.core.exited() {
            self.core.bounce_request(&sender, mid);
            return;
        }
        let element = MailboxElement::new(sender.clone(), self.core.address(), mid, payload);
        if !self.mailbox.push(element) {
            // closed concurrently by finalize
            self.core.bounce_request(&sender, mid);
            return;
        }
        self.wakeup();
    }
}

impl AbstractActor for ScheduledActor {
    fn core(&self) -> &ActorCore {
        &self.core
    }
}

impl Resumable for ScheduledActor {
    fn resume(&self, unit: &mut ExecutionUnit, max_throughput: usize) -> ResumeResult {
        if unit.shutdown_requested() {
            return ResumeResult::ShutdownExecutionUnit;
        }
        let mut guard = self.inner.lock();
        let Some(inner) = guard.as_mut() else {
            return ResumeResult::Done;
        };
        match self.run_loop(inner, unit, max_throughput.max(1)) {
            Step::Terminate(reason) => {
                let inner = guard.take();
                drop(guard);
                self.finalize(inner, reason);
                ResumeResult::Done
            }
            Step::Await => ResumeResult::AwaitingMessage,
            Step::BudgetExhausted => ResumeResult::ResumeLater,
        }
    }
}

impl Schedulable for ScheduledActor {
    fn run_state(&self) -> &RunState {
        &self.run_state
    }

    fn has_pending_input(&self) -> bool {
        !self.mailbox.is_empty()
    }
}
