// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier for actors within a process.
///
/// Ids are drawn from a process-wide monotonic counter starting at 1;
/// the value 0 is reserved for the invalid id. An actor keeps its id for
/// its entire lifetime, and ids are never reused within a process.
///
/// # Example
/// ```rust
/// use swarm_rt::util::ActorId;
///
/// let id1 = ActorId::next();
/// let id2 = ActorId::next();
/// assert_ne!(id1, id2);
/// assert!(id1.is_valid());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ActorId(u32);

static NEXT_ACTOR_ID: AtomicU32 = AtomicU32::new(1);

impl ActorId {
    /// The invalid actor id (raw value 0).
    pub const INVALID: ActorId = ActorId(0);

    /// Allocate the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create an id from its raw wire representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw wire representation.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Whether this id denotes an actual actor.
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of bytes in a host fingerprint.
pub const HOST_ID_SIZE: usize = 20;

/// A 160-bit hash identifying the host machine.
///
/// The local fingerprint is derived from stable machine inputs (hostname
/// and `/etc/machine-id` where available); when neither is usable, a
/// per-process random salt keeps distinct processes distinguishable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId([u8; HOST_ID_SIZE]);

impl HostId {
    /// The all-zero fingerprint, used only for the invalid address.
    pub const ZERO: HostId = HostId([0u8; HOST_ID_SIZE]);

    /// Build a fingerprint from raw bytes.
    pub fn from_bytes(bytes: [u8; HOST_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; HOST_ID_SIZE] {
        &self.0
    }

    /// Whether all bytes are zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HOST_ID_SIZE]
    }

    /// The fingerprint of this host, computed once per process.
    pub fn local() -> HostId {
        static LOCAL: OnceLock<HostId> = OnceLock::new();
        *LOCAL.get_or_init(|| {
            let mut hasher = Sha256::new();
            if let Ok(hostname) = std::env::var("HOSTNAME") {
                hasher.update(hostname.as_bytes());
            }
            match std::fs::read("/etc/machine-id") {
                Ok(machine_id) => hasher.update(&machine_id),
                // no stable machine identity available: salt per process
                Err(_) => hasher.update(Uuid::new_v4().as_bytes()),
            }
            let digest = hasher.finalize();
            let mut bytes = [0u8; HOST_ID_SIZE];
            bytes.copy_from_slice(&digest[..HOST_ID_SIZE]);
            HostId(bytes)
        })
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identifies a process: process id plus host fingerprint.
///
/// Two nodes are equal iff both fields match. The wire representation is
/// 4 + 20 bytes.
///
/// # Example
/// ```rust
/// use swarm_rt::util::NodeId;
///
/// let local = NodeId::local();
/// assert_eq!(local, NodeId::local());
/// assert!(local != NodeId::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    process_id: u32,
    host_id: HostId,
}

impl NodeId {
    /// The all-zero node id, used only for the invalid address.
    pub const ZERO: NodeId = NodeId {
        process_id: 0,
        host_id: HostId::ZERO,
    };

    /// Create a node id from its parts.
    pub fn new(process_id: u32, host_id: HostId) -> Self {
        Self {
            process_id,
            host_id,
        }
    }

    /// The id of the running process, computed once.
    pub fn local() -> NodeId {
        static LOCAL: OnceLock<NodeId> = OnceLock::new();
        *LOCAL.get_or_init(|| NodeId {
            process_id: std::process::id(),
            host_id: HostId::local(),
        })
    }

    /// System-wide unique process identifier.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Fingerprint of the host system.
    pub fn host_id(&self) -> &HostId {
        &self.host_id
    }

    /// Whether both fields are zero.
    pub fn is_zero(&self) -> bool {
        self.process_id == 0 && self.host_id.is_zero()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.process_id, self.host_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_monotonic() {
        let id1 = ActorId::next();
        let id2 = ActorId::next();

        assert!(id2.raw() > id1.raw());
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_actor_id_invalid() {
        assert!(!ActorId::INVALID.is_valid());
        assert_eq!(ActorId::INVALID.raw(), 0);
        assert!(ActorId::next().is_valid());
    }

    #[test]
    fn test_actor_id_round_trip() {
        let id = ActorId::from_raw(42);
        assert_eq!(id.raw(), 42);
    }

    #[test]
    fn test_host_id_local_stable() {
        assert_eq!(HostId::local(), HostId::local());
        assert!(!HostId::local().is_zero());
    }

    #[test]
    fn test_host_id_display_hex() {
        let id = HostId::from_bytes([0xab; HOST_ID_SIZE]);
        let display = format!("{id}");

        assert_eq!(display.len(), HOST_ID_SIZE * 2);
        assert!(display.starts_with("abab"));
    }

    #[test]
    fn test_node_id_equality() {
        let a = NodeId::new(7, HostId::from_bytes([1; HOST_ID_SIZE]));
        let b = NodeId::new(7, HostId::from_bytes([1; HOST_ID_SIZE]));
        let c = NodeId::new(8, HostId::from_bytes([1; HOST_ID_SIZE]));
        let d = NodeId::new(7, HostId::from_bytes([2; HOST_ID_SIZE]));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_node_id_local() {
        let local = NodeId::local();
        assert_eq!(local.process_id(), std::process::id());
        assert!(!local.is_zero());
    }

    #[test]
    fn test_node_id_zero() {
        assert!(NodeId::ZERO.is_zero());
        assert!(NodeId::ZERO < NodeId::local());
    }
}
