//! The network edge: address serialization, proxies, the wire format,
//! the transport seam, and the middleman actor.

pub mod middleman;
pub mod namespace;
pub mod proxy;
pub mod serialize;
pub mod transport;
pub mod wire;

pub use middleman::{
    Ack, BoundPort, BrokerBind, BrokerClose, BrokerConnect, BrokerConnected, BrokerSpawnRemote,
    BrokerSpawned, ClosePort, Connect, ConnectedNode, ErrorMsg, GetNode, MiddlemanHandle,
    NodeInfo, Open, Publish, Published, RegisterTransport, RemoteActor, SpawnRemote, Unpublish,
};
pub use namespace::{ActorNamespace, NewElementCallback, ProxyFactory};
pub use proxy::ActorProxy;
pub use serialize::{BinaryDeserializer, BinarySerializer, Deserializer, Serializer, WireError};
pub use transport::{FrameSink, NetworkError, Transport};
pub use wire::{AddrTriple, Frame, FrameHeader, FrameOp, Handshake};
