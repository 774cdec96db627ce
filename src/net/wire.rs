//! Frame layout of the peer-to-peer protocol.
//!
//! A frame carries an operation tag, sender and receiver identity
//! triples, the message id, and a serializer-opaque payload. Length
//! prefixing, TLS, and reconnection are the transport's concern.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::serialize::{Deserializer, Serializer, WireError};
use crate::message::{MessageId, Payload};
use crate::util::{ActorId, HostId, NodeId, HOST_ID_SIZE};

/// Operation tag of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOp {
    /// Peer announces that an actor id is reachable on its node.
    AnnounceProxy,
    /// Peer asks us to keep an actor addressable for it.
    RequestProxy,
    /// Peer terminated an actor we hold proxies for.
    KillProxy,
    /// Ordinary message delivery.
    DispatchMessage,
    /// First half of the connection handshake.
    ClientHandshake,
    /// Second half of the connection handshake.
    ServerHandshake,
}

impl FrameOp {
    /// The wire tag of this operation.
    pub fn tag(&self) -> u8 {
        match self {
            Self::AnnounceProxy => 0,
            Self::RequestProxy => 1,
            Self::KillProxy => 2,
            Self::DispatchMessage => 3,
            Self::ClientHandshake => 4,
            Self::ServerHandshake => 5,
        }
    }

    /// Decode a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Self::AnnounceProxy),
            1 => Ok(Self::RequestProxy),
            2 => Ok(Self::KillProxy),
            3 => Ok(Self::DispatchMessage),
            4 => Ok(Self::ClientHandshake),
            5 => Ok(Self::ServerHandshake),
            other => Err(WireError::InvalidOperation(other)),
        }
    }
}

/// Serialized actor identity: `(actor_id, process_id, host_id)`.
///
/// The all-zero triple denotes "none" (an invalid address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddrTriple {
    /// The actor id on its node.
    pub actor: ActorId,
    /// The node the actor lives on.
    pub node: NodeId,
}

impl AddrTriple {
    /// The zero triple.
    pub const NONE: AddrTriple = AddrTriple {
        actor: ActorId::INVALID,
        node: NodeId::ZERO,
    };

    /// Whether this triple denotes no actor.
    pub fn is_none(&self) -> bool {
        !self.actor.is_valid() && self.node.is_zero()
    }

    /// Emit as 4 + 4 + 20 bytes.
    pub fn write(&self, sink: &mut dyn Serializer) {
        sink.write_u32(self.actor.raw());
        sink.write_u32(self.node.process_id());
        sink.write_raw(self.node.host_id().as_bytes());
    }

    /// Read a triple emitted by [`write`](Self::write).
    pub fn read(source: &mut dyn Deserializer) -> Result<AddrTriple, WireError> {
        let actor = ActorId::from_raw(source.read_u32()?);
        let process_id = source.read_u32()?;
        let mut host = [0u8; HOST_ID_SIZE];
        source.read_raw(&mut host)?;
        Ok(AddrTriple {
            actor,
            node: NodeId::new(process_id, HostId::from_bytes(host)),
        })
    }
}

/// Header of a frame, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Operation tag.
    pub op: FrameOp,
    /// Sending actor, or the zero triple.
    pub source: AddrTriple,
    /// Receiving actor, or the zero triple.
    pub dest: AddrTriple,
    /// Message id.
    pub mid: MessageId,
}

impl FrameHeader {
    /// Emit the header.
    pub fn write(&self, sink: &mut dyn Serializer) {
        sink.write_u8(self.op.tag());
        self.source.write(sink);
        self.dest.write(sink);
        sink.write_u64(self.mid.as_u64());
    }

    /// Read a header emitted by [`write`](Self::write).
    pub fn read(source: &mut dyn Deserializer) -> Result<FrameHeader, WireError> {
        let op = FrameOp::from_tag(source.read_u8()?)?;
        let src = AddrTriple::read(source)?;
        let dest = AddrTriple::read(source)?;
        let mid = MessageId::from_u64(source.read_u64()?);
        Ok(FrameHeader {
            op,
            source: src,
            dest,
            mid,
        })
    }
}

/// A complete frame: header plus serializer-opaque payload.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Operation tag.
    pub op: FrameOp,
    /// Sending actor, or the zero triple.
    pub source: AddrTriple,
    /// Receiving actor, or the zero triple.
    pub dest: AddrTriple,
    /// Message id.
    pub mid: MessageId,
    /// The payload, opaque to the wire layer.
    pub payload: Payload,
}

impl Frame {
    /// The header of this frame.
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            op: self.op,
            source: self.source,
            dest: self.dest,
            mid: self.mid,
        }
    }
}

/// Data exchanged when two nodes connect: the node identity, the
/// published actor, and its interface set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The sending node.
    pub node: NodeId,
    /// Actor published on the connected port, if any.
    pub published_actor: ActorId,
    /// Interface names the published actor implements.
    pub interfaces: Vec<String>,
}

impl Handshake {
    /// Emit the handshake record.
    pub fn write(&self, sink: &mut dyn Serializer) {
        sink.write_u32(self.node.process_id());
        sink.write_raw(self.node.host_id().as_bytes());
        sink.write_u32(self.published_actor.raw());
        sink.write_u32(self.interfaces.len() as u32);
        for interface in &self.interfaces {
            sink.write_str(interface);
        }
    }

    /// Read a handshake emitted by [`write`](Self::write).
    pub fn read(source: &mut dyn Deserializer) -> Result<Handshake, WireError> {
        let process_id = source.read_u32()?;
        let mut host = [0u8; HOST_ID_SIZE];
        source.read_raw(&mut host)?;
        let published_actor = ActorId::from_raw(source.read_u32()?);
        let count = source.read_u32()? as usize;
        let mut interfaces = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            interfaces.push(source.read_str()?);
        }
        Ok(Handshake {
            node: NodeId::new(process_id, HostId::from_bytes(host)),
            published_actor,
            interfaces,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::net::serialize::{BinaryDeserializer, BinarySerializer};

    #[test]
    fn test_op_tags_round_trip() {
        for op in [
            FrameOp::AnnounceProxy,
            FrameOp::RequestProxy,
            FrameOp::KillProxy,
            FrameOp::DispatchMessage,
            FrameOp::ClientHandshake,
            FrameOp::ServerHandshake,
        ] {
            assert_eq!(FrameOp::from_tag(op.tag()).unwrap(), op);
        }
        assert_eq!(
            FrameOp::from_tag(200),
            Err(WireError::InvalidOperation(200))
        );
    }

    #[test]
    fn test_addr_triple_round_trip() {
        let triple = AddrTriple {
            actor: ActorId::from_raw(99),
            node: NodeId::new(7, HostId::from_bytes([3; HOST_ID_SIZE])),
        };
        let mut sink = BinarySerializer::new();
        triple.write(&mut sink);

        let mut source = BinaryDeserializer::new(sink.into_bytes());
        assert_eq!(AddrTriple::read(&mut source).unwrap(), triple);
    }

    #[test]
    fn test_none_triple() {
        let mut sink = BinarySerializer::new();
        AddrTriple::NONE.write(&mut sink);
        let bytes = sink.into_bytes();
        assert_eq!(bytes.len(), 4 + 4 + HOST_ID_SIZE);
        assert!(bytes.iter().all(|b| *b == 0));

        let mut source = BinaryDeserializer::new(bytes);
        assert!(AddrTriple::read(&mut source).unwrap().is_none());
    }

    #[test]
    fn test_header_round_trip() {
        let header = FrameHeader {
            op: FrameOp::DispatchMessage,
            source: AddrTriple {
                actor: ActorId::from_raw(1),
                node: NodeId::new(10, HostId::from_bytes([1; HOST_ID_SIZE])),
            },
            dest: AddrTriple {
                actor: ActorId::from_raw(2),
                node: NodeId::new(20, HostId::from_bytes([2; HOST_ID_SIZE])),
            },
            mid: MessageId::request(42).with_high_priority(),
        };
        let mut sink = BinarySerializer::new();
        header.write(&mut sink);

        let mut source = BinaryDeserializer::new(sink.into_bytes());
        assert_eq!(FrameHeader::read(&mut source).unwrap(), header);
    }

    #[test]
    fn test_handshake_round_trip() {
        let handshake = Handshake {
            node: NodeId::new(5, HostId::from_bytes([9; HOST_ID_SIZE])),
            published_actor: ActorId::from_raw(77),
            interfaces: vec!["calculator".to_string(), "logger".to_string()],
        };
        let mut sink = BinarySerializer::new();
        handshake.write(&mut sink);

        let mut source = BinaryDeserializer::new(sink.into_bytes());
        assert_eq!(Handshake::read(&mut source).unwrap(), handshake);
    }
}
