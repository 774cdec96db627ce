// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Exit reason of a terminated actor.
///
/// An actor transitions exactly once from [`ExitReason::NOT_EXITED`] to a
/// terminal value. Codes below [`ExitReason::USER_DEFINED`] are reserved
/// for the runtime; user code picks codes at or above it (or any raw
/// value when interoperating with foreign peers).
///
/// # Example
/// ```rust
/// use swarm_rt::actor::ExitReason;
///
/// let reason = ExitReason::user_defined(2);
/// assert!(!reason.is_normal());
/// assert!(!reason.is_not_exited());
/// assert_eq!(reason.raw(), ExitReason::USER_DEFINED.raw() + 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ExitReason(u32);

impl ExitReason {
    /// The actor is still alive; only legal while it has not terminated.
    pub const NOT_EXITED: ExitReason = ExitReason(0x0000);

    /// Regular termination.
    pub const NORMAL: ExitReason = ExitReason(0x0001);

    /// A panic escaped user code.
    pub const UNHANDLED_EXCEPTION: ExitReason = ExitReason(0x0002);

    /// Termination for an unknown reason.
    pub const UNKNOWN: ExitReason = ExitReason(0x0006);

    /// The node hosting a remote actor became unreachable.
    pub const REMOTE_NODE_UNREACHABLE: ExitReason = ExitReason(0x0101);

    /// First code available to user-defined reasons.
    pub const USER_DEFINED: ExitReason = ExitReason(0x10000);

    /// Create a user-defined reason offset from [`ExitReason::USER_DEFINED`].
    pub fn user_defined(offset: u32) -> Self {
        Self(Self::USER_DEFINED.0 + offset)
    }

    /// Reconstruct a reason from its raw code.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw 32-bit code.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Whether this is the alive marker.
    pub fn is_not_exited(&self) -> bool {
        *self == Self::NOT_EXITED
    }

    /// Whether this denotes regular termination.
    pub fn is_normal(&self) -> bool {
        *self == Self::NORMAL
    }
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NOT_EXITED => write!(f, "not_exited"),
            Self::NORMAL => write!(f, "normal"),
            Self::UNHANDLED_EXCEPTION => write!(f, "unhandled_exception"),
            Self::UNKNOWN => write!(f, "unknown"),
            Self::REMOTE_NODE_UNREACHABLE => write!(f, "remote_node_unreachable"),
            other => write!(f, "exit_reason({:#x})", other.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_exited_is_zero() {
        assert_eq!(ExitReason::NOT_EXITED.raw(), 0);
        assert!(ExitReason::NOT_EXITED.is_not_exited());
        assert!(ExitReason::default().is_not_exited());
    }

    #[test]
    fn test_normal() {
        assert!(ExitReason::NORMAL.is_normal());
        assert!(!ExitReason::NORMAL.is_not_exited());
    }

    #[test]
    fn test_user_defined_offset() {
        let reason = ExitReason::user_defined(5);
        assert_eq!(reason.raw(), 0x10000 + 5);
        assert!(!reason.is_normal());
    }

    #[test]
    fn test_raw_round_trip() {
        let reason = ExitReason::from_raw(7);
        assert_eq!(reason.raw(), 7);
        assert_eq!(reason, ExitReason::from_raw(7));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ExitReason::NORMAL.to_string(), "normal");
        assert_eq!(
            ExitReason::UNHANDLED_EXCEPTION.to_string(),
            "unhandled_exception"
        );
        assert!(ExitReason::from_raw(0x12345).to_string().contains("0x12345"));
    }
}
