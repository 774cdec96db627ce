// Layer 1: Standard library imports
use std::any::Any;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

/// An immutable, cheaply clonable, type-erased message value.
///
/// Payloads are shared copy-on-write: cloning a payload clones an `Arc`,
/// never the value inside. Handlers read payloads by downcasting; a
/// handler that needs an owned value clones it out of the shared cell.
///
/// # Example
/// ```rust
/// use swarm_rt::message::Payload;
///
/// let payload = Payload::new(41i32);
/// assert!(payload.is::<i32>());
/// assert_eq!(payload.downcast_ref::<i32>(), Some(&41));
/// assert_eq!(payload.downcast_cloned::<i32>(), Some(41));
/// assert!(payload.downcast_ref::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Payload {
    /// Wrap a value into a shared payload.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The empty payload, carrying the unit value.
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Whether the payload holds a value of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrow the payload as `T`, if it holds one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Clone the payload value out as an owned `T`, if it holds one.
    pub fn downcast_cloned<T: Any + Clone>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }

    /// Name of the contained type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_downcast() {
        let payload = Payload::new("hello".to_string());

        assert!(payload.is::<String>());
        assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(payload.downcast_ref::<i32>().is_none());
    }

    #[test]
    fn test_payload_clone_shares_value() {
        let payload = Payload::new(vec![1u8, 2, 3]);
        let cloned = payload.clone();

        let a = payload.downcast_ref::<Vec<u8>>().map(|v| v.as_ptr());
        let b = cloned.downcast_ref::<Vec<u8>>().map(|v| v.as_ptr());
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_downcast_cloned() {
        let payload = Payload::new(7u64);
        assert_eq!(payload.downcast_cloned::<u64>(), Some(7));
        assert_eq!(payload.downcast_cloned::<u32>(), None);
    }

    #[test]
    fn test_empty_payload() {
        let payload = Payload::empty();
        assert!(payload.is::<()>());
    }

    #[test]
    fn test_type_name() {
        let payload = Payload::new(1i32);
        assert!(payload.type_name().contains("i32"));
    }
}
