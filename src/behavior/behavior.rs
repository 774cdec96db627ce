// Layer 1: Standard library imports
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::actor::ActorContext;
use crate::message::Payload;

/// Result of offering a message to a behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// A case matched and its handler ran.
    Handled,
    /// A case matched but declined the message; it goes to the cache.
    Skipped,
    /// No case matched; the caller decides (same as skip at this level).
    NoMatch,
}

/// Outcome returned by a case handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOutcome {
    /// The message was consumed.
    Handled,
    /// The handler declined after inspecting the message.
    Skip,
}

type Matcher = Box<dyn Fn(&Payload) -> bool + Send + Sync>;
type Handler = Box<dyn Fn(&mut ActorContext, &Payload) -> CaseOutcome + Send + Sync>;
type Continuation = Box<dyn FnOnce(&mut ActorContext) + Send>;

struct Case {
    matcher: Matcher,
    handler: Handler,
}

/// Timeout definition attached to a behavior: a duration and the handler
/// to run when it expires before any matching message arrives.
#[derive(Clone)]
pub struct TimeoutDef {
    duration: Duration,
    handler: Arc<dyn Fn(&mut ActorContext) + Send + Sync>,
}

impl TimeoutDef {
    /// The timeout duration, measured from behavior activation.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn run(&self, ctx: &mut ActorContext) {
        (self.handler)(ctx);
    }
}

trait BehaviorNode: Send + Sync {
    fn invoke(&self, ctx: &mut ActorContext, payload: &Payload) -> DispatchResult;
    fn defined_at(&self, payload: &Payload) -> bool;
    fn is_empty(&self) -> bool;
}

struct CaseList {
    cases: Vec<Case>,
}

impl BehaviorNode for CaseList {
    fn invoke(&self, ctx: &mut ActorContext, payload: &Payload) -> DispatchResult {
        for case in &self.cases {
            if (case.matcher)(payload) {
                return match (case.handler)(ctx, payload) {
                    CaseOutcome::Handled => DispatchResult::Handled,
                    CaseOutcome::Skip => DispatchResult::Skipped,
                };
            }
        }
        DispatchResult::NoMatch
    }

    fn defined_at(&self, payload: &Payload) -> bool {
        self.cases.iter().any(|case| (case.matcher)(payload))
    }

    fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

struct OrElse {
    first: Arc<dyn BehaviorNode>,
    second: Arc<dyn BehaviorNode>,
}

impl BehaviorNode for OrElse {
    fn invoke(&self, ctx: &mut ActorContext, payload: &Payload) -> DispatchResult {
        match self.first.invoke(ctx, payload) {
            DispatchResult::NoMatch => self.second.invoke(ctx, payload),
            other => other,
        }
    }

    fn defined_at(&self, payload: &Payload) -> bool {
        self.first.defined_at(payload) || self.second.defined_at(payload)
    }

    fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }
}

/// A reference-counted, immutable partial function over messages.
///
/// Behaviors are built from typed cases and optionally carry a timeout
/// and a one-shot continuation that runs after the first successful
/// dispatch. Cloning a behavior clones an `Arc`.
///
/// # Example
/// ```rust
/// use swarm_rt::behavior::Behavior;
/// use swarm_rt::message::Payload;
///
/// let behavior = Behavior::builder()
///     .on::<i32, _>(|ctx, n| {
///         ctx.respond(Payload::new(n + 1));
///     })
///     .build();
/// assert!(behavior.defined_at(&Payload::new(41i32)));
/// assert!(!behavior.defined_at(&Payload::new("nope")));
/// ```
#[derive(Clone)]
pub struct Behavior {
    node: Arc<dyn BehaviorNode>,
    timeout: Option<TimeoutDef>,
    continuation: Option<Arc<Mutex<Option<Continuation>>>>,
}

impl Behavior {
    /// Start building a behavior from typed cases.
    pub fn builder() -> BehaviorBuilder {
        BehaviorBuilder {
            cases: Vec::new(),
            timeout: None,
        }
    }

    /// The behavior matching nothing; installing it (alone) terminates
    /// the actor normally.
    pub fn empty() -> Behavior {
        Behavior::builder().build()
    }

    /// Offer a message to this behavior.
    pub fn invoke(&self, ctx: &mut ActorContext, payload: &Payload) -> DispatchResult {
        self.node.invoke(ctx, payload)
    }

    /// Whether any case would accept `payload`.
    pub fn defined_at(&self, payload: &Payload) -> bool {
        self.node.defined_at(payload)
    }

    /// Whether this behavior has no cases at all.
    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// Left-biased combination: try `self` first, fall back to `other`.
    ///
    /// The combined behavior's timeout is `other`'s.
    pub fn or_else(&self, other: &Behavior) -> Behavior {
        Behavior {
            node: Arc::new(OrElse {
                first: Arc::clone(&self.node),
                second: Arc::clone(&other.node),
            }),
            timeout: other.timeout.clone(),
            continuation: None,
        }
    }

    /// Decorate with a one-shot continuation that runs after the first
    /// successful dispatch.
    pub fn with_continuation<F>(mut self, f: F) -> Behavior
    where
        F: FnOnce(&mut ActorContext) + Send + 'static,
    {
        self.continuation = Some(Arc::new(Mutex::new(Some(Box::new(f)))));
        self
    }

    /// The timeout definition, if any.
    pub fn timeout(&self) -> Option<&TimeoutDef> {
        self.timeout.as_ref()
    }

    pub(crate) fn run_continuation(&self, ctx: &mut ActorContext) {
        if let Some(slot) = &self.continuation {
            if let Some(f) = slot.lock().take() {
                f(ctx);
            }
        }
    }
}

/// Builder assembling a [`Behavior`] from typed cases.
pub struct BehaviorBuilder {
    cases: Vec<Case>,
    timeout: Option<TimeoutDef>,
}

impl BehaviorBuilder {
    /// Add a case matching any payload of type `T`.
    pub fn on<T, F>(mut self, handler: F) -> Self
    where
        T: Any + Clone + Send + Sync + 'static,
        F: Fn(&mut ActorContext, T) + Send + Sync + 'static,
    {
        self.cases.push(Case {
            matcher: Box::new(|payload| payload.is::<T>()),
            handler: Box::new(move |ctx, payload| match payload.downcast_cloned::<T>() {
                Some(value) => {
                    handler(ctx, value);
                    CaseOutcome::Handled
                }
                None => CaseOutcome::Skip,
            }),
        });
        self
    }

    /// Add a guarded case: matches payloads of type `T` for which the
    /// predicate holds.
    pub fn on_match<T, P, F>(mut self, predicate: P, handler: F) -> Self
    where
        T: Any + Clone + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(&mut ActorContext, T) + Send + Sync + 'static,
    {
        self.cases.push(Case {
            matcher: Box::new(move |payload| {
                payload.downcast_ref::<T>().is_some_and(&predicate)
            }),
            handler: Box::new(move |ctx, payload| match payload.downcast_cloned::<T>() {
                Some(value) => {
                    handler(ctx, value);
                    CaseOutcome::Handled
                }
                None => CaseOutcome::Skip,
            }),
        });
        self
    }

    /// Add a case with full control over the outcome, allowing a handler
    /// to decline a message after inspecting it.
    pub fn on_fallible<T, F>(mut self, handler: F) -> Self
    where
        T: Any + Clone + Send + Sync + 'static,
        F: Fn(&mut ActorContext, T) -> CaseOutcome + Send + Sync + 'static,
    {
        self.cases.push(Case {
            matcher: Box::new(|payload| payload.is::<T>()),
            handler: Box::new(move |ctx, payload| match payload.downcast_cloned::<T>() {
                Some(value) => handler(ctx, value),
                None => CaseOutcome::Skip,
            }),
        });
        self
    }

    /// Arm a timeout: if no matching message arrives within `duration`
    /// of behavior activation, `handler` runs.
    pub fn with_timeout<F>(mut self, duration: Duration, handler: F) -> Self
    where
        F: Fn(&mut ActorContext) + Send + Sync + 'static,
    {
        self.timeout = Some(TimeoutDef {
            duration,
            handler: Arc::new(handler),
        });
        self
    }

    /// Finish building.
    pub fn build(self) -> Behavior {
        Behavior {
            node: Arc::new(CaseList { cases: self.cases }),
            timeout: self.timeout,
            continuation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined_at_by_type() {
        let behavior = Behavior::builder().on::<i32, _>(|_, _| {}).build();

        assert!(behavior.defined_at(&Payload::new(1i32)));
        assert!(!behavior.defined_at(&Payload::new(1u64)));
        assert!(!behavior.defined_at(&Payload::new("text")));
    }

    #[test]
    fn test_guarded_case() {
        let behavior = Behavior::builder()
            .on_match::<i32, _, _>(|n| *n > 10, |_, _| {})
            .build();

        assert!(behavior.defined_at(&Payload::new(11i32)));
        assert!(!behavior.defined_at(&Payload::new(5i32)));
    }

    #[test]
    fn test_or_else_is_left_biased() {
        let first = Behavior::builder().on::<i32, _>(|_, _| {}).build();
        let second = Behavior::builder()
            .on::<i32, _>(|_, _| {})
            .on::<String, _>(|_, _| {})
            .build();

        let combined = first.or_else(&second);
        assert!(combined.defined_at(&Payload::new(1i32)));
        assert!(combined.defined_at(&Payload::new(String::from("x"))));
        assert!(!combined.defined_at(&Payload::new(1.0f64)));
    }

    #[test]
    fn test_or_else_takes_second_timeout() {
        let first = Behavior::builder()
            .with_timeout(Duration::from_secs(1), |_| {})
            .build();
        let second = Behavior::builder()
            .with_timeout(Duration::from_secs(9), |_| {})
            .build();

        let combined = first.or_else(&second);
        let timeout = combined.timeout().map(TimeoutDef::duration);
        assert_eq!(timeout, Some(Duration::from_secs(9)));

        let without = first.or_else(&Behavior::empty());
        assert!(without.timeout().is_none());
    }

    #[test]
    fn test_empty_behavior() {
        assert!(Behavior::empty().is_empty());
        assert!(!Behavior::builder().on::<u8, _>(|_, _| {}).build().is_empty());
    }

    #[test]
    fn test_clone_shares_cases() {
        let behavior = Behavior::builder().on::<i32, _>(|_, _| {}).build();
        let cloned = behavior.clone();
        assert!(cloned.defined_at(&Payload::new(3i32)));
    }
}
