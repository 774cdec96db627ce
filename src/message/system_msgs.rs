//! Messages generated by the runtime itself.
//!
//! These payload types are delivered through ordinary mailbox channels:
//! exit notifications for links, down notifications for monitors, the
//! replies synthesized for synchronous requests that can no longer be
//! answered, and timeout ticks for behaviors.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::{ActorAddr, ExitReason};
use crate::group::Group;

/// Sent to all links when an actor terminates.
///
/// Handled implicitly by the runtime unless the receiving actor has
/// `trap_exit` set, in which case it is delivered like any other message.
#[derive(Debug, Clone)]
pub struct ExitMsg {
    /// The terminated actor.
    pub source: ActorAddr,
    /// The exit reason of the terminated actor.
    pub reason: ExitReason,
}

/// Sent to all monitors of an actor when it terminates.
#[derive(Debug, Clone)]
pub struct DownMsg {
    /// The terminated actor.
    pub source: ActorAddr,
    /// The exit reason of the terminated actor.
    pub reason: ExitReason,
}

/// Reply synthesized when a synchronous request reaches an actor that has
/// already terminated.
#[derive(Debug, Clone)]
pub struct SyncExitedMsg {
    /// The terminated actor the request was addressed to.
    pub source: ActorAddr,
    /// Its final exit reason.
    pub reason: ExitReason,
}

/// Reply synthesized when the deadline of a synchronous request expires.
///
/// Carries no fields; the message id delivered alongside identifies the
/// request that timed out.
#[derive(Debug, Clone)]
pub struct SyncTimeoutMsg;

/// Signals a behavior timeout.
///
/// Handled implicitly by the runtime; a stale `timeout_id` (from a
/// behavior that has since changed) is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutMsg {
    /// Actor-specific timeout generation.
    pub timeout_id: u32,
}

/// Sent to all members of a group when it is dissolved.
#[derive(Debug, Clone)]
pub struct GroupDownMsg {
    /// The now unreachable group.
    pub source: Group,
}

impl PartialEq for ExitMsg {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.reason == other.reason
    }
}

impl PartialEq for DownMsg {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.reason == other.reason
    }
}

impl PartialEq for SyncExitedMsg {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.reason == other.reason
    }
}

impl PartialEq for SyncTimeoutMsg {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}
