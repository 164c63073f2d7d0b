//! Packet model: the opaque unit of data flowing along pads.
//!
//! The engine never inspects packet contents. Within a process packets are
//! passed by shared ownership ([`PacketRef`]); only packets that implement
//! the serialization hooks can cross a shared-memory boundary.

use std::any::Any;
use std::sync::Arc;

/// An opaque unit of data routed between nodes.
///
/// Both methods are optional. Packets that do not implement them are still
/// fully routable inside a single process; they simply cannot be carried by
/// transports that need a byte representation.
pub trait Packet: Any + Send + Sync {
    /// Serialize the packet into `buf`, returning the number of bytes
    /// written, or `None` when `buf` is too small.
    fn serialize_to(&self, buf: &mut [u8]) -> Option<usize> {
        let _ = buf;
        None
    }

    /// Reconstruct the packet contents from `buf`. Returns `false` when the
    /// bytes cannot be decoded.
    fn deserialize_from(&mut self, buf: &[u8]) -> bool {
        let _ = buf;
        false
    }
}

/// Shared handle to a packet, as routed by pads.
pub type PacketRef = Arc<dyn Packet>;

/// Runtime downcast helpers for [`PacketRef`].
///
/// Type-dispatching nodes use these to recover the concrete packet type; a
/// failed downcast is how the engine expresses "this handler does not accept
/// that packet".
pub trait PacketExt {
    /// Downcast to a concrete packet type, consuming the handle.
    fn downcast<T: Packet>(self) -> Option<Arc<T>>;

    /// Whether the packet is of concrete type `T`.
    fn is<T: Packet>(&self) -> bool;
}

impl PacketExt for PacketRef {
    fn downcast<T: Packet>(self) -> Option<Arc<T>> {
        let any: Arc<dyn Any + Send + Sync> = self;
        any.downcast::<T>().ok()
    }

    fn is<T: Packet>(&self) -> bool {
        let any: &dyn Any = &**self;
        any.is::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;
    impl Packet for Empty {}

    struct Numbered(u32);
    impl Packet for Numbered {}

    #[test]
    fn test_default_hooks_are_inert() {
        let packet = Empty;
        let mut buf = [0u8; 16];
        assert_eq!(packet.serialize_to(&mut buf), None);

        let mut packet = Empty;
        assert!(!packet.deserialize_from(&buf));
    }

    #[test]
    fn test_downcast_success() {
        let packet: PacketRef = Arc::new(Numbered(7));
        assert!(packet.is::<Numbered>());

        let concrete = packet.downcast::<Numbered>().expect("should downcast");
        assert_eq!(concrete.0, 7);
    }

    #[test]
    fn test_downcast_mismatch() {
        let packet: PacketRef = Arc::new(Empty);
        assert!(!packet.is::<Numbered>());
        assert!(packet.downcast::<Numbered>().is_none());
    }
}
