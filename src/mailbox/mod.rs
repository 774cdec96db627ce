//! Actor message queuing: the per-actor FIFO with priority lane.

pub mod queue;

pub use queue::Mailbox;
