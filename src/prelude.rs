//! Prelude module for convenient imports.
//!
//! Re-exports the types most programs need:
//!
//! ```rust
//! use swarm_rt::prelude::*;
//! ```

// Core actor surface
pub use crate::actor::{
    AbstractActor, ActorAddr, ActorContext, BlockingActor, Channel, ExitReason, ResponsePromise,
    Scoped, INFINITE,
};

// Behaviors
pub use crate::behavior::{Behavior, CaseOutcome, DispatchResult};

// Messaging
pub use crate::message::{
    DownMsg, ExitMsg, MailboxElement, MessageId, Payload, SyncExitedMsg, SyncTimeoutMsg,
};

// Groups
pub use crate::group::{Group, Subscription};

// Networking
pub use crate::net::{ConnectedNode, MiddlemanHandle, Transport};

// System
pub use crate::system::{ActorSystem, SystemConfig, SystemError};

// Identifiers
pub use crate::util::{ActorId, NodeId};
