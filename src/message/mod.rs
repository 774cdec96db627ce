//! Message model: message ids, payloads, mailbox elements, and the
//! messages generated by the runtime itself.

pub mod envelope;
pub mod message_id;
pub mod payload;
pub mod system_msgs;

pub use envelope::MailboxElement;
pub use message_id::MessageId;
pub use payload::Payload;
pub use system_msgs::{DownMsg, ExitMsg, GroupDownMsg, SyncExitedMsg, SyncTimeoutMsg, TimeoutMsg};
