//! Actor lifecycle: identities and addresses, links, monitors,
//! attachables, exit reasons, and the scheduled, detached, and scoped
//! actor kinds.

pub mod address;
pub mod attachable;
pub mod blocking;
pub mod cell;
pub mod context;
pub(crate) mod dispatch;
pub mod exit_reason;
pub mod response_promise;
pub mod scheduled;
pub mod scoped;
pub mod traits;

pub use address::ActorAddr;
pub use attachable::{Attachable, AttachToken, FunctorAttachable};
pub use blocking::{BlockingActor, BlockingActorCell};
pub use cell::ActorCore;
pub use context::{ActorContext, INFINITE};
pub use exit_reason::ExitReason;
pub use response_promise::ResponsePromise;
pub use scheduled::ScheduledActor;
pub use scoped::Scoped;
pub use traits::{AbstractActor, Channel};
