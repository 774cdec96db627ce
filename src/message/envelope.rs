// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::message_id::MessageId;
use super::payload::Payload;
use crate::actor::ActorAddr;

/// A single entry in an actor's mailbox.
///
/// Carries the sender address (for replies and exit propagation), the
/// receiver, the message id encoding the response/answered/priority bits,
/// and the immutable payload.
///
/// # Example
/// ```rust
/// use swarm_rt::actor::ActorAddr;
/// use swarm_rt::message::{MailboxElement, MessageId, Payload};
///
/// let element = MailboxElement::new(
///     ActorAddr::invalid(),
///     ActorAddr::invalid(),
///     MessageId::ASYNC,
///     Payload::new(42i32),
/// );
/// assert!(!element.mid.is_request());
/// assert!(element.payload.is::<i32>());
/// ```
#[derive(Debug, Clone)]
pub struct MailboxElement {
    /// Address of the sending actor; invalid for anonymous sends.
    pub sender: ActorAddr,
    /// Address of the receiving actor.
    pub receiver: ActorAddr,
    /// Message id of this delivery.
    pub mid: MessageId,
    /// The immutable message content.
    pub payload: Payload,
    /// When the element entered the mailbox.
    pub enqueued_at: DateTime<Utc>,
}

impl MailboxElement {
    /// Create a mailbox element stamped with the current time.
    pub fn new(sender: ActorAddr, receiver: ActorAddr, mid: MessageId, payload: Payload) -> Self {
        Self {
            sender,
            receiver,
            mid,
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_creation() {
        let element = MailboxElement::new(
            ActorAddr::invalid(),
            ActorAddr::invalid(),
            MessageId::request(5),
            Payload::new("ping"),
        );

        assert!(element.mid.is_request());
        assert!(element.payload.is::<&str>());
        assert!(element.enqueued_at <= Utc::now());
    }

    #[test]
    fn test_element_clone_shares_payload() {
        let element = MailboxElement::new(
            ActorAddr::invalid(),
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(vec![1u32, 2, 3]),
        );
        let cloned = element.clone();

        assert_eq!(element.mid, cloned.mid);
        assert_eq!(
            element.payload.downcast_ref::<Vec<u32>>().map(|v| v.as_ptr()),
            cloned.payload.downcast_ref::<Vec<u32>>().map(|v| v.as_ptr()),
        );
    }
}
