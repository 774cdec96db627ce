//! Utility types: actor, node, and host identifiers.

pub mod ids;

pub use ids::{ActorId, HostId, NodeId, HOST_ID_SIZE};
