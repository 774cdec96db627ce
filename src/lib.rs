//! # swarm-rt - Distributed Actor Runtime
//!
//! An in-process and distributed actor runtime: programs compose as
//! isolated actors that communicate exclusively by asynchronous message
//! passing, with network-transparent addressing across processes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use swarm_rt::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = ActorSystem::new(SystemConfig::default());
//!
//!     // an actor that answers any integer with its successor
//!     let adder = system
//!         .spawn(|_ctx| {
//!             Behavior::builder()
//!                 .on::<i32, _>(|ctx, n| ctx.respond(Payload::new(n + 1)))
//!                 .build()
//!         })
//!         .unwrap();
//!
//!     // talk to it from plain async code
//!     let mut scoped = Scoped::new(&system);
//!     let mid = scoped.request(&adder, Payload::new(41i32));
//!     let reply = scoped
//!         .await_response(mid, std::time::Duration::from_secs(1))
//!         .await
//!         .unwrap();
//!     assert_eq!(reply.payload.downcast_cloned::<i32>(), Some(42));
//!
//!     system.shutdown().await.ok();
//! }
//! ```
//!
//! # Core Concepts
//!
//! - **Actors** are isolated units with a mailbox, a behavior, and a
//!   process-unique identity. Scheduled actors run cooperatively on the
//!   async runtime; detached actors own an OS thread with a blocking
//!   receive.
//! - **Behaviors** are composable partial functions over messages with
//!   optional timeouts ([`behavior`]).
//! - **Message ids** encode the synchronous request/response protocol in
//!   a 64-bit word: response, answered, and priority bits plus a
//!   per-actor request id ([`message`]).
//! - **Links and monitors** couple actor lifetimes: links are symmetric
//!   and propagate exits, monitors are one-way down notifications
//!   ([`actor`]).
//! - **Groups** are named multicast channels ([`group`]).
//! - **The namespace and middleman** make addresses network-transparent:
//!   serialized references reify as weak-tracked proxies that tunnel
//!   messages through a transport ([`net`]).
//!
//! # Module Organization
//!
//! - [`actor`] - Actor kinds, addresses, lifecycle, links, monitors
//! - [`behavior`] - Pattern-matched dispatch with timeouts
//! - [`mailbox`] - FIFO queue with priority lane
//! - [`message`] - Message ids, payloads, system messages
//! - [`group`] - Named multicast channels
//! - [`registry`] - Process-wide id → actor map
//! - [`scheduler`] - Resumable interface and cooperative driver
//! - [`net`] - Namespace, proxies, wire format, middleman
//! - [`system`] - Configuration and lifecycle
//! - [`util`] - Actor, node, and host identifiers

pub mod actor;
pub mod behavior;
pub mod group;
pub mod mailbox;
pub mod message;
pub mod net;
pub mod prelude;
pub mod registry;
pub mod scheduler;
pub mod system;
pub mod util;

// Re-export commonly used types
pub use actor::{
    AbstractActor, ActorAddr, ActorContext, Attachable, AttachToken, Channel, ExitReason,
    ResponsePromise, Scoped,
};
pub use behavior::{Behavior, DispatchResult};
pub use group::{Group, GroupManager, Subscription};
pub use mailbox::Mailbox;
pub use message::{
    DownMsg, ExitMsg, GroupDownMsg, MailboxElement, MessageId, Payload, SyncExitedMsg,
    SyncTimeoutMsg, TimeoutMsg,
};
pub use net::{ActorNamespace, ActorProxy, ConnectedNode, Frame, FrameOp, MiddlemanHandle};
pub use registry::ActorRegistry;
pub use scheduler::{Resumable, ResumeResult};
pub use system::{ActorSystem, SystemConfig, SystemError};
pub use util::{ActorId, HostId, NodeId};
