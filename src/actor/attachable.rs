// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::address::ActorAddr;
use super::exit_reason::ExitReason;
use crate::message::{DownMsg, MessageId, Payload};

/// Token identifying an attachable for [`detach`](super::ActorCore::detach).
#[derive(Debug, Clone, PartialEq)]
pub enum AttachToken {
    /// Identifies the monitor installed on behalf of `observer`.
    Monitor(ActorAddr),
}

/// A callback owned by the actor it is attached to, executed exactly once
/// when that actor terminates.
///
/// If the actor has already exited, the callback runs immediately at
/// attach time and is not retained.
pub trait Attachable: Send {
    /// Invoked with the terminating actor's address and exit reason.
    fn actor_exited(self: Box<Self>, source: &ActorAddr, reason: ExitReason);

    /// Whether this attachable is identified by `token`.
    fn matches(&self, token: &AttachToken) -> bool {
        let _ = token;
        false
    }
}

/// Attachable wrapping a plain closure.
pub struct FunctorAttachable<F: FnOnce(ExitReason) + Send> {
    callback: F,
}

impl<F: FnOnce(ExitReason) + Send> FunctorAttachable<F> {
    /// Wrap `callback` into an attachable.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnOnce(ExitReason) + Send> Attachable for FunctorAttachable<F> {
    fn actor_exited(self: Box<Self>, _source: &ActorAddr, reason: ExitReason) {
        (self.callback)(reason);
    }
}

/// Attachable delivering a [`DownMsg`] to the monitoring actor.
///
/// One monitor attachable is installed per `monitor` call, so an actor
/// that monitors a peer twice receives two down messages.
pub(crate) struct MonitorAttachable {
    observer: ActorAddr,
}

impl MonitorAttachable {
    pub(crate) fn new(observer: ActorAddr) -> Self {
        Self { observer }
    }
}

impl Attachable for MonitorAttachable {
    fn actor_exited(self: Box<Self>, source: &ActorAddr, reason: ExitReason) {
        self.observer.enqueue(
            source.clone(),
            MessageId::ASYNC,
            Payload::new(DownMsg {
                source: source.clone(),
                reason,
            }),
        );
    }

    fn matches(&self, token: &AttachToken) -> bool {
        let AttachToken::Monitor(observer) = token;
        self.observer == *observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_functor_runs_with_reason() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);
        let attachable = Box::new(FunctorAttachable::new(move |reason: ExitReason| {
            seen_clone.store(reason.raw(), Ordering::SeqCst);
        }));

        attachable.actor_exited(&ActorAddr::invalid(), ExitReason::from_raw(9));
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_functor_matches_nothing() {
        let attachable = FunctorAttachable::new(|_| {});
        assert!(!attachable.matches(&AttachToken::Monitor(ActorAddr::invalid())));
    }

    #[test]
    fn test_monitor_matches_own_observer() {
        let attachable = MonitorAttachable::new(ActorAddr::invalid());
        assert!(attachable.matches(&AttachToken::Monitor(ActorAddr::invalid())));
    }
}
