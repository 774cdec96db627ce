// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

const RESPONSE_FLAG_MASK: u64 = 0x8000_0000_0000_0000;
const ANSWERED_FLAG_MASK: u64 = 0x4000_0000_0000_0000;
const HIGH_PRIORITY_FLAG_MASK: u64 = 0x2000_0000_0000_0000;
const REQUEST_ID_MASK: u64 = 0x1FFF_FFFF_FFFF_FFFF;

/// Denotes whether a message is asynchronous or part of a synchronous
/// request/response exchange.
///
/// # Bit layout
///
/// ```text
/// bit 63    response:  set iff this message is a reply
/// bit 62    answered:  set iff the request has been answered
/// bit 61    priority:  set iff the message is high priority
/// bits 60..0 request id: 0 means asynchronous, non-zero identifies a request
/// ```
///
/// Request ids are drawn from a per-actor monotonic counter and never
/// reused within that actor's lifetime. The response id is derived from a
/// request id by setting bit 63; deriving a response id from a response
/// collapses to the asynchronous id, so a response to a response is an
/// ordinary asynchronous message.
///
/// # Example
/// ```rust
/// use swarm_rt::message::MessageId;
///
/// let req = MessageId::request(7);
/// assert!(req.is_request());
///
/// let resp = req.response_id();
/// assert!(resp.is_response());
/// assert_eq!(resp.request_id(), req.request_id());
///
/// // the response to a response is asynchronous
/// assert_eq!(resp.response_id(), MessageId::ASYNC);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MessageId(u64);

impl MessageId {
    /// The id carried by all asynchronous messages.
    pub const ASYNC: MessageId = MessageId(0);

    /// Create a request id from a per-actor counter value.
    ///
    /// The counter value is masked to the lower 61 bits; a value of 0
    /// yields the asynchronous id.
    pub fn request(counter: u64) -> Self {
        Self(counter & REQUEST_ID_MASK)
    }

    /// Whether this message is a reply to a request.
    pub fn is_response(&self) -> bool {
        self.0 & RESPONSE_FLAG_MASK != 0
    }

    /// Whether the enclosed request has been answered.
    pub fn is_answered(&self) -> bool {
        self.0 & ANSWERED_FLAG_MASK != 0
    }

    /// Whether the enclosing message is high priority.
    pub fn is_high_priority(&self) -> bool {
        self.0 & HIGH_PRIORITY_FLAG_MASK != 0
    }

    /// Whether the request id portion is non-zero.
    pub fn valid(&self) -> bool {
        self.0 & REQUEST_ID_MASK != 0
    }

    /// Whether this message is an outstanding synchronous request.
    pub fn is_request(&self) -> bool {
        self.valid() && !self.is_response()
    }

    /// Derive the id a reply to this message must carry.
    ///
    /// The response to a response is an asynchronous message.
    pub fn response_id(&self) -> MessageId {
        if self.is_response() {
            return MessageId::ASYNC;
        }
        if self.valid() {
            MessageId(self.0 | RESPONSE_FLAG_MASK)
        } else {
            MessageId::ASYNC
        }
    }

    /// The bare request id with all flag bits cleared.
    pub fn request_id(&self) -> MessageId {
        MessageId(self.0 & REQUEST_ID_MASK)
    }

    /// The raw request counter value.
    pub fn request_value(&self) -> u64 {
        self.0 & REQUEST_ID_MASK
    }

    /// Copy of this id with the priority bit set.
    pub fn with_high_priority(&self) -> MessageId {
        MessageId(self.0 | HIGH_PRIORITY_FLAG_MASK)
    }

    /// Copy of this id with the priority bit cleared.
    pub fn with_normal_priority(&self) -> MessageId {
        MessageId(self.0 & !HIGH_PRIORITY_FLAG_MASK)
    }

    /// Set the answered bit in place.
    pub fn mark_as_answered(&mut self) {
        self.0 |= ANSWERED_FLAG_MASK;
    }

    /// The raw 64-bit representation.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Reconstruct an id from its raw 64-bit representation.
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_id() {
        let id = MessageId::ASYNC;
        assert!(!id.valid());
        assert!(!id.is_request());
        assert!(!id.is_response());
        assert!(!id.is_answered());
        assert!(!id.is_high_priority());
    }

    #[test]
    fn test_request_id() {
        let id = MessageId::request(42);
        assert!(id.valid());
        assert!(id.is_request());
        assert!(!id.is_response());
        assert_eq!(id.request_value(), 42);
    }

    #[test]
    fn test_response_derivation() {
        let req = MessageId::request(7);
        let resp = req.response_id();

        assert!(resp.is_response());
        assert!(!resp.is_request());
        assert_eq!(resp.request_id(), req.request_id());
    }

    #[test]
    fn test_response_of_response_is_async() {
        let resp = MessageId::request(7).response_id();
        assert_eq!(resp.response_id(), MessageId::ASYNC);
    }

    #[test]
    fn test_response_of_async_is_async() {
        assert_eq!(MessageId::ASYNC.response_id(), MessageId::ASYNC);
    }

    #[test]
    fn test_priority_flag() {
        let id = MessageId::request(3).with_high_priority();
        assert!(id.is_high_priority());
        assert!(!id.with_normal_priority().is_high_priority());
    }

    #[test]
    fn test_priority_survives_response_derivation() {
        let req = MessageId::request(3).with_high_priority();
        assert!(req.response_id().is_high_priority());
    }

    #[test]
    fn test_answered_flag() {
        let mut id = MessageId::request(9);
        assert!(!id.is_answered());
        id.mark_as_answered();
        assert!(id.is_answered());
        // the request id portion is untouched
        assert_eq!(id.request_value(), 9);
    }

    #[test]
    fn test_raw_round_trip() {
        let id = MessageId::request(1234).with_high_priority().response_id();
        let restored = MessageId::from_u64(id.as_u64());
        assert_eq!(id, restored);
    }

    #[test]
    fn test_request_counter_masked() {
        let id = MessageId::request(u64::MAX);
        assert!(!id.is_response());
        assert!(!id.is_answered());
        assert!(!id.is_high_priority());
    }
}
