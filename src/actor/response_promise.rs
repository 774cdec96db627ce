// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::address::ActorAddr;
use crate::message::{MessageId, Payload};

/// A deferred obligation to answer a specific synchronous request.
///
/// Created by a handler that decides not to reply inline; delivering
/// sends the response exactly once and marks the request answered. A
/// second `deliver` is a no-op, and dropping an undelivered promise is
/// not an error: the requester then only sees a sync timeout (or a
/// sync-exited reply if this actor terminates first).
#[derive(Debug, Clone)]
pub struct ResponsePromise {
    from: ActorAddr,
    to: ActorAddr,
    id: MessageId,
}

impl ResponsePromise {
    pub(crate) fn new(from: ActorAddr, to: ActorAddr, response_id: MessageId) -> Self {
        Self {
            from,
            to,
            id: response_id,
        }
    }

    /// Whether this promise still owes a response.
    pub fn is_pending(&self) -> bool {
        self.to.is_valid() && !self.id.is_answered()
    }

    /// The response id, including the answered bit after delivery.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Send `payload` to the requester and invalidate this promise.
    ///
    /// For a promise made from an asynchronous message the reply is a
    /// plain send. Delivering twice is a no-op.
    pub fn deliver(&mut self, payload: Payload) {
        if !self.is_pending() {
            return;
        }
        self.to.enqueue(self.from.clone(), self.id, payload);
        self.id.mark_as_answered();
        self.to = ActorAddr::invalid();
    }
}
