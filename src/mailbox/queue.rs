// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Instant;

// Layer 2: Third-party crate imports
use parking_lot::{Condvar, Mutex};

// Layer 3: Internal module imports
use crate::message::MailboxElement;

struct Lanes {
    high: VecDeque<MailboxElement>,
    normal: VecDeque<MailboxElement>,
    closed: bool,
}

/// Per-actor FIFO message queue with a priority lane.
///
/// Multiple producers push concurrently; the owning actor is the only
/// consumer. Dequeue always drains the priority lane first. FIFO order is
/// preserved between any two messages pushed by the same sender into the
/// same lane; no ordering is promised across lanes or across senders.
///
/// A closed mailbox rejects pushes; the elements drained at close time
/// are handed back to the caller so terminated actors can run the
/// sync-request bouncer over them.
pub struct Mailbox {
    inner: Mutex<Lanes>,
    // wakes detached (blocking) actors parked in wait_nonempty
    nonempty: Condvar,
}

impl Mailbox {
    /// Create an open, empty mailbox.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Lanes {
                high: VecDeque::new(),
                normal: VecDeque::new(),
                closed: false,
            }),
            nonempty: Condvar::new(),
        }
    }

    /// Append an element; returns `false` when the mailbox is closed.
    pub fn push(&self, element: MailboxElement) -> bool {
        {
            let mut lanes = self.inner.lock();
            if lanes.closed {
                return false;
            }
            if element.mid.is_high_priority() {
                lanes.high.push_back(element);
            } else {
                lanes.normal.push_back(element);
            }
        }
        self.nonempty.notify_one();
        true
    }

    /// Remove the next element, priority lane first.
    pub fn pop(&self) -> Option<MailboxElement> {
        let mut lanes = self.inner.lock();
        lanes.high.pop_front().or_else(|| lanes.normal.pop_front())
    }

    /// Whether both lanes are empty.
    pub fn is_empty(&self) -> bool {
        let lanes = self.inner.lock();
        lanes.high.is_empty() && lanes.normal.is_empty()
    }

    /// Number of queued elements across both lanes.
    pub fn len(&self) -> usize {
        let lanes = self.inner.lock();
        lanes.high.len() + lanes.normal.len()
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Close the mailbox and drain all remaining elements in dequeue
    /// order (priority lane first).
    pub fn close(&self) -> Vec<MailboxElement> {
        let mut lanes = self.inner.lock();
        lanes.closed = true;
        let mut drained = Vec::with_capacity(lanes.high.len() + lanes.normal.len());
        drained.extend(lanes.high.drain(..));
        drained.extend(lanes.normal.drain(..));
        drop(lanes);
        self.nonempty.notify_one();
        drained
    }

    /// Block the calling thread until the mailbox is non-empty or closed,
    /// or until `deadline` passes.
    ///
    /// Returns `true` when an element is available, `false` on timeout or
    /// closed-and-empty. Used by detached actors; scheduled actors are
    /// rescheduled through their execution unit instead of blocking.
    pub fn wait_nonempty(&self, deadline: Option<Instant>) -> bool {
        let mut lanes = self.inner.lock();
        loop {
            if !lanes.high.is_empty() || !lanes.normal.is_empty() {
                return true;
            }
            if lanes.closed {
                return false;
            }
            match deadline {
                Some(deadline) => {
                    if self.nonempty.wait_until(&mut lanes, deadline).timed_out() {
                        return !lanes.high.is_empty() || !lanes.normal.is_empty();
                    }
                }
                None => self.nonempty.wait(&mut lanes),
            }
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorAddr;
    use crate::message::{MessageId, Payload};
    use std::time::Duration;

    fn element(mid: MessageId, value: i32) -> MailboxElement {
        MailboxElement::new(
            ActorAddr::invalid(),
            ActorAddr::invalid(),
            mid,
            Payload::new(value),
        )
    }

    #[test]
    fn test_fifo_order() {
        let mailbox = Mailbox::new();
        for i in 0..3 {
            assert!(mailbox.push(element(MessageId::ASYNC, i)));
        }

        for i in 0..3 {
            let el = mailbox.pop().and_then(|e| e.payload.downcast_cloned::<i32>());
            assert_eq!(el, Some(i));
        }
        assert!(mailbox.pop().is_none());
    }

    #[test]
    fn test_priority_lane_drains_first() {
        let mailbox = Mailbox::new();
        mailbox.push(element(MessageId::ASYNC, 1));
        mailbox.push(element(MessageId::ASYNC.with_high_priority(), 2));
        mailbox.push(element(MessageId::ASYNC, 3));

        let order: Vec<i32> = std::iter::from_fn(|| {
            mailbox.pop().and_then(|e| e.payload.downcast_cloned::<i32>())
        })
        .collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_len_and_empty() {
        let mailbox = Mailbox::new();
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.len(), 0);

        mailbox.push(element(MessageId::ASYNC, 1));
        mailbox.push(element(MessageId::ASYNC.with_high_priority(), 2));
        assert_eq!(mailbox.len(), 2);
        assert!(!mailbox.is_empty());
    }

    #[test]
    fn test_close_rejects_and_drains() {
        let mailbox = Mailbox::new();
        mailbox.push(element(MessageId::ASYNC, 1));
        mailbox.push(element(MessageId::ASYNC.with_high_priority(), 2));

        let drained = mailbox.close();
        assert_eq!(drained.len(), 2);
        // drain order follows dequeue order
        assert_eq!(drained[0].payload.downcast_cloned::<i32>(), Some(2));

        assert!(mailbox.is_closed());
        assert!(!mailbox.push(element(MessageId::ASYNC, 3)));
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_wait_nonempty_times_out() {
        let mailbox = Mailbox::new();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!mailbox.wait_nonempty(Some(deadline)));
    }

    #[test]
    fn test_wait_nonempty_wakes_on_push() {
        use std::sync::Arc;
        let mailbox = Arc::new(Mailbox::new());
        let pusher = Arc::clone(&mailbox);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            pusher.push(element(MessageId::ASYNC, 42));
        });

        assert!(mailbox.wait_nonempty(Some(Instant::now() + Duration::from_secs(5))));
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_wait_nonempty_returns_false_when_closed() {
        let mailbox = Mailbox::new();
        mailbox.close();
        assert!(!mailbox.wait_nonempty(None));
    }
}
