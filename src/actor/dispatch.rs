//! Shared per-element dispatch machinery.
//!
//! Both scheduled and detached actors funnel every mailbox element
//! through the same pipeline: response routing into the pending-request
//! table, implicit exit handling (unless trapped), then behavior
//! invocation with the unmatched-message cache as fallback. Panics that
//! escape user handlers are caught here and become the actor's exit
//! reason.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

// Layer 2: Third-party crate imports
use tracing::{error, trace};

// Layer 3: Internal module imports
use super::context::{ActorContext, BehaviorChange};
use super::exit_reason::ExitReason;
use crate::behavior::{Behavior, DispatchResult};
use crate::message::{ExitMsg, MailboxElement};

/// Result of the system-level stage of the pipeline.
pub(crate) enum Preprocessed {
    /// The element was consumed by the runtime.
    Consumed,
    /// The element is user-level and goes to behavior dispatch.
    User(MailboxElement),
}

/// Route responses and implicit exit messages.
pub(crate) fn preprocess(ctx: &mut ActorContext, element: MailboxElement) -> Preprocessed {
    if element.mid.is_response() {
        if let Some(mut pending) = ctx.take_pending(element.mid) {
            if let Some(continuation) = pending.take_continuation() {
                let payload = element.payload;
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| continuation(ctx, payload)));
                if outcome.is_err() {
                    error!("panic in response continuation");
                    ctx.quit(ExitReason::UNHANDLED_EXCEPTION);
                }
            }
        } else {
            // late response after timeout, or response to a response
            trace!(mid = %element.mid, "dropping unmatched response");
        }
        return Preprocessed::Consumed;
    }
    if !ctx.trap_exit() {
        if let Some(exit) = element.payload.downcast_ref::<ExitMsg>() {
            if !exit.reason.is_normal() {
                ctx.quit(exit.reason);
            }
            return Preprocessed::Consumed;
        }
    }
    Preprocessed::User(element)
}

/// Offer an element to `behavior`, running the one-shot continuation on
/// success.
pub(crate) fn invoke_behavior(
    ctx: &mut ActorContext,
    behavior: &Behavior,
    element: &MailboxElement,
) -> DispatchResult {
    ctx.set_current(element.sender.clone(), element.mid);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let result = behavior.invoke(ctx, &element.payload);
        if result == DispatchResult::Handled {
            behavior.run_continuation(ctx);
        }
        result
    }));
    ctx.clear_current();
    match outcome {
        Ok(result) => result,
        Err(_) => {
            error!(payload = element.payload.type_name(), "panic in message handler");
            ctx.quit(ExitReason::UNHANDLED_EXCEPTION);
            DispatchResult::Handled
        }
    }
}

/// Run the timeout handler of `behavior`, if it has one.
pub(crate) fn run_timeout_handler(ctx: &mut ActorContext, behavior: &Behavior) {
    if let Some(timeout) = behavior.timeout() {
        let outcome = catch_unwind(AssertUnwindSafe(|| timeout.run(ctx)));
        if outcome.is_err() {
            error!("panic in timeout handler");
            ctx.quit(ExitReason::UNHANDLED_EXCEPTION);
        }
    }
}

enum TimeoutState {
    /// Behavior was (re)activated; a timer must be armed if it has one.
    NeedsArm,
    /// A timer task for the current generation is outstanding.
    Armed,
    /// The current behavior has no timeout.
    Unarmed,
}

/// Behavior stack, unmatched-message cache, and timeout generation of a
/// single actor. Accessed only by the thread currently running the actor.
pub(crate) struct DispatchState {
    stack: Vec<Behavior>,
    cache: VecDeque<MailboxElement>,
    scan_cache: bool,
    timeout_gen: u32,
    timeout_state: TimeoutState,
}

impl DispatchState {
    pub(crate) fn new() -> Self {
        Self {
            stack: Vec::new(),
            cache: VecDeque::new(),
            scan_cache: false,
            timeout_gen: 0,
            timeout_state: TimeoutState::Unarmed,
        }
    }

    pub(crate) fn install(&mut self, behavior: Behavior) {
        self.stack = vec![behavior];
        self.activated();
    }

    pub(crate) fn apply(&mut self, change: BehaviorChange) {
        match change {
            BehaviorChange::Replace(behavior) => {
                self.stack.pop();
                self.stack.push(behavior);
            }
            BehaviorChange::Push(behavior) => self.stack.push(behavior),
            BehaviorChange::Pop => {
                self.stack.pop();
            }
        }
        self.activated();
    }

    // every behavior change re-scans the cache and restarts the timeout
    fn activated(&mut self) {
        self.scan_cache = true;
        self.timeout_gen = self.timeout_gen.wrapping_add(1);
        self.timeout_state = TimeoutState::NeedsArm;
    }

    pub(crate) fn current(&self) -> Option<Behavior> {
        self.stack.last().cloned()
    }

    /// Whether dispatch has nothing left to match against: no behavior,
    /// or a behavior with neither cases nor timeout.
    pub(crate) fn is_inert(&self) -> bool {
        match self.stack.last() {
            None => true,
            Some(behavior) => behavior.is_empty() && behavior.timeout().is_none(),
        }
    }

    pub(crate) fn take_scan_flag(&mut self) -> bool {
        std::mem::take(&mut self.scan_cache)
    }

    pub(crate) fn push_cache(&mut self, element: MailboxElement) {
        self.cache.push_back(element);
    }

    /// Return the unscanned remainder of an interrupted cache scan.
    ///
    /// Elements already scanned and left unmatched sit at the front of
    /// the cache again, so the remainder is appended behind them to
    /// keep the original order.
    pub(crate) fn restore_cache(&mut self, elements: VecDeque<MailboxElement>) {
        self.cache.extend(elements);
        self.scan_cache = true;
    }

    pub(crate) fn take_cache(&mut self) -> VecDeque<MailboxElement> {
        std::mem::take(&mut self.cache)
    }

    pub(crate) fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Whether a timer needs arming for the current behavior activation.
    pub(crate) fn timeout_needs_arm(&self) -> bool {
        matches!(self.timeout_state, TimeoutState::NeedsArm)
    }

    /// Mark the current activation armed and return its generation.
    pub(crate) fn arm_timeout(&mut self) -> u32 {
        self.timeout_state = TimeoutState::Armed;
        self.timeout_gen
    }

    /// Record that the current behavior carries no timeout.
    pub(crate) fn timeout_not_needed(&mut self) {
        self.timeout_state = TimeoutState::Unarmed;
    }

    /// Whether a timeout message with `id` belongs to the current
    /// activation.
    pub(crate) fn timeout_is_current(&self, id: u32) -> bool {
        matches!(self.timeout_state, TimeoutState::Armed) && id == self.timeout_gen
    }

    /// Invalidate the fired generation and request re-arming.
    pub(crate) fn timeout_fired(&mut self) {
        self.timeout_gen = self.timeout_gen.wrapping_add(1);
        self.timeout_state = TimeoutState::NeedsArm;
    }
}
