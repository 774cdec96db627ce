//! The per-process networking orchestrator.
//!
//! The middleman is a hidden actor owning the actor namespace, the
//! per-node transports, the endpoint cache, and the pending-connection
//! queues. Socket work is delegated to an endpoint-broker actor driven
//! with request continuations; proxies divert their traffic here, and
//! transports push incoming frames back in through a [`FrameSink`].

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::namespace::ActorNamespace;
use super::proxy::{ActorProxy, ForwardedMessage};
use super::transport::{FrameSink, IncomingFrame, Transport, TransportFailed};
use super::wire::{AddrTriple, Frame, FrameOp};
use crate::actor::{
    AbstractActor, ActorAddr, ActorContext, ExitReason, FunctorAttachable, ResponsePromise,
    Scoped, INFINITE,
};
use crate::behavior::Behavior;
use crate::message::{DownMsg, MessageId, Payload, SyncExitedMsg};
use crate::system::{ActorSystem, SystemError};
use crate::util::{ActorId, NodeId};

// --- protocol with the outside world ---------------------------------

/// Publish `whom` on `port` (0 lets the OS choose).
#[derive(Debug, Clone)]
pub struct Publish {
    /// Requested port, 0 for any.
    pub port: u16,
    /// The actor to publish.
    pub whom: ActorAddr,
    /// Interface names advertised in the handshake.
    pub interfaces: Vec<String>,
    /// Local address to bind, if restricted.
    pub addr: Option<String>,
    /// Whether to set the reuse-address option.
    pub reuse: bool,
}

/// Open a port without publishing an actor.
#[derive(Debug, Clone)]
pub struct Open {
    /// Requested port, 0 for any.
    pub port: u16,
    /// Local address to bind, if restricted.
    pub addr: Option<String>,
    /// Whether to set the reuse-address option.
    pub reuse: bool,
}

/// Connect to a peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connect {
    /// Peer hostname.
    pub host: String,
    /// Peer port.
    pub port: u16,
}

/// Stop publishing `whom` on `port`.
#[derive(Debug, Clone)]
pub struct Unpublish {
    /// The published actor.
    pub whom: ActorAddr,
    /// The port it was published on.
    pub port: u16,
}

/// Close an open port.
#[derive(Debug, Clone)]
pub struct ClosePort {
    /// The port to close.
    pub port: u16,
}

/// Ask a peer node to spawn an actor.
#[derive(Clone)]
pub struct SpawnRemote {
    /// The node to spawn on.
    pub node: NodeId,
    /// Registered actor type name on the peer.
    pub type_name: String,
    /// Constructor arguments.
    pub args: Payload,
}

/// Query connection data for a node.
#[derive(Debug, Clone)]
pub struct GetNode {
    /// The node to look up.
    pub node: NodeId,
}

/// Reply to [`Publish`] and [`Open`]: the actually bound port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// The chosen port.
    pub port: u16,
}

/// Reply to [`Connect`]: the peer node, the proxy for its published
/// actor, and the advertised interface set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedNode {
    /// Identity of the peer node.
    pub node: NodeId,
    /// Proxy for the actor published on the connected port.
    pub remote: ActorAddr,
    /// Interface names the published actor advertises.
    pub interfaces: Vec<String>,
}

/// Reply to [`GetNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// The node.
    pub node: NodeId,
    /// Hostname the connection was made to.
    pub host: String,
    /// Port the connection was made to.
    pub port: u16,
}

/// Reply to [`SpawnRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteActor {
    /// Proxy for the freshly spawned actor.
    pub actor: ActorAddr,
}

/// Positive reply without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Error reply payload.
#[derive(Debug, Clone)]
pub struct ErrorMsg {
    /// What went wrong.
    pub error: SystemError,
}

// --- protocol with the endpoint broker --------------------------------

/// Broker request: bind a listening port.
#[derive(Debug, Clone)]
pub struct BrokerBind {
    /// Requested port, 0 for any.
    pub port: u16,
    /// Local address to bind, if restricted.
    pub addr: Option<String>,
    /// Whether to set the reuse-address option.
    pub reuse: bool,
}

/// Broker reply: the port actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPort(pub u16);

/// Broker request: connect and run the handshake.
#[derive(Debug, Clone)]
pub struct BrokerConnect {
    /// Peer hostname.
    pub host: String,
    /// Peer port.
    pub port: u16,
}

/// Broker reply: handshake data plus the established transport.
#[derive(Clone)]
pub struct BrokerConnected {
    /// Identity of the peer node.
    pub node: NodeId,
    /// Id of the actor published on the connected port.
    pub remote_id: ActorId,
    /// Advertised interfaces.
    pub interfaces: Vec<String>,
    /// The connection, ready for frames.
    pub transport: Arc<dyn Transport>,
}

/// Broker request: stop listening on a port.
#[derive(Debug, Clone)]
pub struct BrokerClose {
    /// The port to close.
    pub port: u16,
}

/// Broker request: forward a spawn to a peer node.
#[derive(Clone)]
pub struct BrokerSpawnRemote {
    /// The node to spawn on.
    pub node: NodeId,
    /// Registered actor type name on the peer.
    pub type_name: String,
    /// Constructor arguments.
    pub args: Payload,
}

/// Broker reply: identity of the spawned actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSpawned {
    /// The node the actor was spawned on.
    pub node: NodeId,
    /// Its id there.
    pub actor_id: ActorId,
}

/// Register an established transport for a node (used by brokers on the
/// accept path, where no [`Connect`] round-trip exists).
#[derive(Clone)]
pub struct RegisterTransport {
    /// The peer node the transport reaches.
    pub node: NodeId,
    /// The connection.
    pub transport: Arc<dyn Transport>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShutdownMiddleman;

// --- middleman internals ----------------------------------------------

type Endpoint = (String, u16);

struct TransportLink {
    tx: mpsc::UnboundedSender<Frame>,
    transport: Arc<dyn Transport>,
    pump: JoinHandle<()>,
}

struct InFlight {
    requester: ActorAddr,
    mid: MessageId,
    dest: ActorId,
}

struct PublishedPort {
    whom: ActorAddr,
    interfaces: Vec<String>,
}

struct MiddlemanState {
    namespace: ActorNamespace,
    broker: ActorAddr,
    transports: HashMap<NodeId, TransportLink>,
    cached: HashMap<Endpoint, ConnectedNode>,
    pending: HashMap<Endpoint, Vec<ResponsePromise>>,
    open_ports: HashMap<u16, PublishedPort>,
    in_flight: HashMap<NodeId, Vec<InFlight>>,
}

impl MiddlemanState {
    fn register_transport(
        &mut self,
        ctx: &ActorContext,
        node: NodeId,
        transport: Arc<dyn Transport>,
    ) {
        if self.transports.contains_key(&node) {
            debug!(%node, "transport already registered");
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        let sink = FrameSink::new(ctx.address().clone());
        let pump_transport = Arc::clone(&transport);
        let pump = ctx.system().runtime_handle().spawn(async move {
            while let Some(frame) = rx.recv().await {
                if pump_transport.send_frame(frame).await.is_err() {
                    sink.connection_closed(node);
                    return;
                }
            }
        });
        self.transports.insert(
            node,
            TransportLink {
                tx,
                transport,
                pump,
            },
        );
    }

    fn drop_transport(&mut self, node: &NodeId) {
        if let Some(link) = self.transports.remove(node) {
            link.pump.abort();
            link.transport.close();
        }
    }

    /// Answer every request forwarded to `node` that never got its
    /// response.
    fn fail_in_flight(&mut self, node: &NodeId, reason: ExitReason) {
        let Some(flights) = self.in_flight.remove(node) else {
            return;
        };
        for flight in flights {
            let source = self
                .namespace
                .get(node, flight.dest)
                .map_or_else(ActorAddr::invalid, |proxy| proxy.address());
            flight.requester.enqueue(
                source.clone(),
                flight.mid.response_id(),
                Payload::new(SyncExitedMsg { source, reason }),
            );
        }
    }
}

fn deliver_all(promises: Vec<ResponsePromise>, payload: Payload) {
    for mut promise in promises {
        promise.deliver(payload.clone());
    }
}

type SharedState = Arc<Mutex<MiddlemanState>>;

fn handle_forwarded(state: &SharedState, msg: ForwardedMessage) {
    let mut st = state.lock();
    let Some(link) = st.transports.get(&msg.node) else {
        if msg.mid.is_request() && msg.sender.is_valid() {
            let source = st
                .namespace
                .get(&msg.node, msg.aid)
                .map_or_else(ActorAddr::invalid, |proxy| proxy.address());
            msg.sender.enqueue(
                source.clone(),
                msg.mid.response_id(),
                Payload::new(SyncExitedMsg {
                    source,
                    reason: ExitReason::REMOTE_NODE_UNREACHABLE,
                }),
            );
        }
        return;
    };
    let tx = link.tx.clone();
    let source = st.namespace.export(&msg.sender);
    let dest = AddrTriple {
        actor: msg.aid,
        node: msg.node,
    };
    if msg.mid.is_request() {
        st.in_flight.entry(msg.node).or_default().push(InFlight {
            requester: msg.sender.clone(),
            mid: msg.mid,
            dest: msg.aid,
        });
    }
    let _ = tx.send(Frame {
        op: FrameOp::DispatchMessage,
        source,
        dest,
        mid: msg.mid,
        payload: msg.payload,
    });
}

fn handle_incoming(state: &SharedState, ctx: &mut ActorContext, frame: Frame) {
    let mut st = state.lock();
    match frame.op {
        FrameOp::DispatchMessage => {
            if frame.mid.is_response() {
                if let Some(flights) = st.in_flight.get_mut(&frame.source.node) {
                    flights.retain(|flight| flight.mid.response_id() != frame.mid);
                }
            }
            let sender = st.namespace.import(frame.source);
            let dest = ctx.system().registry().get(frame.dest.actor);
            match dest {
                Some(actor) => actor.enqueue(sender, frame.mid, frame.payload),
                None => {
                    warn!(actor = %frame.dest.actor, "frame for unknown local actor dropped");
                    if frame.mid.is_request() && sender.is_valid() {
                        sender.enqueue(
                            ActorAddr::invalid(),
                            frame.mid.response_id(),
                            Payload::new(SyncExitedMsg {
                                source: ActorAddr::invalid(),
                                reason: ExitReason::UNKNOWN,
                            }),
                        );
                    }
                }
            }
        }
        FrameOp::KillProxy => {
            let reason = frame
                .payload
                .downcast_cloned::<ExitReason>()
                .unwrap_or(ExitReason::UNKNOWN);
            st.namespace
                .erase_proxy(&frame.source.node, frame.source.actor, reason);
        }
        FrameOp::AnnounceProxy => {
            let _ = st.namespace.get_or_put(frame.source.node, frame.source.actor);
        }
        FrameOp::RequestProxy => {
            // keep the requested actor addressable for the peer
            let aid = frame.dest.actor;
            if let Some(actor) = ctx.system().registry().get(aid) {
                let addr = actor.address();
                let source = st.namespace.export(&addr);
                if let Some(link) = st.transports.get(&frame.source.node) {
                    let _ = link.tx.send(Frame {
                        op: FrameOp::AnnounceProxy,
                        source,
                        dest: frame.source,
                        mid: MessageId::ASYNC,
                        payload: Payload::empty(),
                    });
                }
            }
        }
        FrameOp::ClientHandshake | FrameOp::ServerHandshake => {
            // handshakes run inside the endpoint broker
            debug!(op = ?frame.op, "handshake frame reached middleman");
        }
    }
}

fn make_behavior(state: SharedState) -> Behavior {
    let st_publish = Arc::clone(&state);
    let st_open = Arc::clone(&state);
    let st_connect = Arc::clone(&state);
    let st_unpublish = Arc::clone(&state);
    let st_close = Arc::clone(&state);
    let st_spawn = Arc::clone(&state);
    let st_get = Arc::clone(&state);
    let st_forward = Arc::clone(&state);
    let st_incoming = Arc::clone(&state);
    let st_failed = Arc::clone(&state);
    let st_down = Arc::clone(&state);
    let st_register = Arc::clone(&state);

    Behavior::builder()
        .on::<Publish, _>(move |ctx, msg| {
            let mut promise = ctx.make_response_promise();
            if !msg.whom.is_valid() {
                promise.deliver(Payload::new(ErrorMsg {
                    error: SystemError::InvalidArgument("cannot publish invalid actor".into()),
                }));
                return;
            }
            let state = Arc::clone(&st_publish);
            let broker = state.lock().broker.clone();
            let requested_port = msg.port;
            ctx.request(
                &broker,
                INFINITE,
                Payload::new(BrokerBind {
                    port: msg.port,
                    addr: msg.addr.clone(),
                    reuse: msg.reuse,
                }),
                move |_ctx, reply| match reply.downcast_cloned::<BoundPort>() {
                    Some(BoundPort(port)) => {
                        let mut st = state.lock();
                        // make the actor resolvable for connecting peers
                        let _ = st.namespace.export(&msg.whom);
                        st.open_ports.insert(
                            port,
                            PublishedPort {
                                whom: msg.whom.clone(),
                                interfaces: msg.interfaces.clone(),
                            },
                        );
                        promise.deliver(Payload::new(Published { port }));
                    }
                    None => promise.deliver(Payload::new(ErrorMsg {
                        error: SystemError::BindFailure {
                            port: requested_port,
                        },
                    })),
                },
            );
        })
        .on::<Open, _>(move |ctx, msg| {
            let mut promise = ctx.make_response_promise();
            let state = Arc::clone(&st_open);
            let broker = state.lock().broker.clone();
            let requested_port = msg.port;
            ctx.request(
                &broker,
                INFINITE,
                Payload::new(BrokerBind {
                    port: msg.port,
                    addr: msg.addr,
                    reuse: msg.reuse,
                }),
                move |_ctx, reply| match reply.downcast_cloned::<BoundPort>() {
                    Some(BoundPort(port)) => {
                        state.lock().open_ports.insert(
                            port,
                            PublishedPort {
                                whom: ActorAddr::invalid(),
                                interfaces: Vec::new(),
                            },
                        );
                        promise.deliver(Payload::new(Published { port }));
                    }
                    None => promise.deliver(Payload::new(ErrorMsg {
                        error: SystemError::BindFailure {
                            port: requested_port,
                        },
                    })),
                },
            );
        })
        .on::<Connect, _>(move |ctx, msg| {
            let promise = ctx.make_response_promise();
            let key: Endpoint = (msg.host.clone(), msg.port);
            let state = Arc::clone(&st_connect);
            let broker = {
                let mut st = state.lock();
                if let Some(cached) = st.cached.get(&key) {
                    let mut promise = promise;
                    promise.deliver(Payload::new(cached.clone()));
                    return;
                }
                if let Some(waiting) = st.pending.get_mut(&key) {
                    waiting.push(promise);
                    return;
                }
                st.pending.insert(key.clone(), vec![promise]);
                st.broker.clone()
            };
            let cont_state = Arc::clone(&state);
            ctx.request(
                &broker,
                INFINITE,
                Payload::new(BrokerConnect {
                    host: msg.host.clone(),
                    port: msg.port,
                }),
                move |ctx, reply| {
                    let mut st = cont_state.lock();
                    let promises = st.pending.remove(&key).unwrap_or_default();
                    match reply.downcast_ref::<BrokerConnected>() {
                        Some(connected) => {
                            st.register_transport(
                                ctx,
                                connected.node,
                                Arc::clone(&connected.transport),
                            );
                            let remote = st
                                .namespace
                                .get_or_put(connected.node, connected.remote_id)
                                .map_or_else(ActorAddr::invalid, |proxy| proxy.address());
                            let info = ConnectedNode {
                                node: connected.node,
                                remote,
                                interfaces: connected.interfaces.clone(),
                            };
                            st.cached.insert(key, info.clone());
                            drop(st);
                            // invalidated again when the remote goes down
                            ctx.monitor(&info.remote);
                            deliver_all(promises, Payload::new(info));
                        }
                        None => {
                            drop(st);
                            deliver_all(
                                promises,
                                Payload::new(ErrorMsg {
                                    error: SystemError::CannotConnectToNode {
                                        host: key.0.clone(),
                                        port: key.1,
                                    },
                                }),
                            );
                        }
                    }
                },
            );
        })
        .on::<Unpublish, _>(move |ctx, msg| {
            let mut promise = ctx.make_response_promise();
            let state = Arc::clone(&st_unpublish);
            let broker = {
                let st = state.lock();
                let published_here = st
                    .open_ports
                    .get(&msg.port)
                    .is_some_and(|published| published.whom == msg.whom);
                published_here.then(|| st.broker.clone())
            };
            let Some(broker) = broker else {
                promise.deliver(Payload::new(ErrorMsg {
                    error: SystemError::InvalidArgument(format!(
                        "actor not published on port {}",
                        msg.port
                    )),
                }));
                return;
            };
            ctx.request(
                &broker,
                INFINITE,
                Payload::new(BrokerClose { port: msg.port }),
                move |_ctx, _reply| {
                    state.lock().open_ports.remove(&msg.port);
                    promise.deliver(Payload::new(Ack));
                },
            );
        })
        .on::<ClosePort, _>(move |ctx, msg| {
            let mut promise = ctx.make_response_promise();
            let state = Arc::clone(&st_close);
            let broker = state.lock().broker.clone();
            ctx.request(
                &broker,
                INFINITE,
                Payload::new(BrokerClose { port: msg.port }),
                move |_ctx, _reply| {
                    state.lock().open_ports.remove(&msg.port);
                    promise.deliver(Payload::new(Ack));
                },
            );
        })
        .on::<SpawnRemote, _>(move |ctx, msg| {
            let mut promise = ctx.make_response_promise();
            if msg.node.is_zero() || msg.type_name.is_empty() {
                promise.deliver(Payload::new(ErrorMsg {
                    error: SystemError::InvalidArgument(
                        "remote spawn needs a valid node and type name".into(),
                    ),
                }));
                return;
            }
            let state = Arc::clone(&st_spawn);
            let broker = state.lock().broker.clone();
            ctx.request(
                &broker,
                INFINITE,
                Payload::new(BrokerSpawnRemote {
                    node: msg.node,
                    type_name: msg.type_name.clone(),
                    args: msg.args.clone(),
                }),
                move |_ctx, reply| match reply.downcast_cloned::<BrokerSpawned>() {
                    Some(spawned) => {
                        let mut st = state.lock();
                        let actor = st
                            .namespace
                            .get_or_put(spawned.node, spawned.actor_id)
                            .map_or_else(ActorAddr::invalid, |proxy| proxy.address());
                        drop(st);
                        promise.deliver(Payload::new(RemoteActor { actor }));
                    }
                    None => promise.deliver(Payload::new(ErrorMsg {
                        error: SystemError::Network("remote spawn failed".into()),
                    })),
                },
            );
        })
        .on::<GetNode, _>(move |ctx, msg| {
            let mut promise = ctx.make_response_promise();
            if msg.node.is_zero() {
                promise.deliver(Payload::new(ErrorMsg {
                    error: SystemError::InvalidArgument("invalid node id".into()),
                }));
                return;
            }
            let st = st_get.lock();
            let info = st
                .cached
                .iter()
                .find(|(_, entry)| entry.node == msg.node)
                .map(|((host, port), entry)| NodeInfo {
                    node: entry.node,
                    host: host.clone(),
                    port: *port,
                });
            drop(st);
            match info {
                Some(info) => promise.deliver(Payload::new(info)),
                None => promise.deliver(Payload::new(ErrorMsg {
                    error: SystemError::InvalidArgument("unknown node".into()),
                })),
            }
        })
        .on::<ForwardedMessage, _>(move |_ctx, msg| {
            handle_forwarded(&st_forward, msg);
        })
        .on::<IncomingFrame, _>(move |ctx, msg| {
            handle_incoming(&st_incoming, ctx, msg.0);
        })
        .on::<TransportFailed, _>(move |_ctx, msg| {
            let mut st = st_failed.lock();
            debug!(node = %msg.node, "connection lost");
            st.drop_transport(&msg.node);
            st.fail_in_flight(&msg.node, ExitReason::REMOTE_NODE_UNREACHABLE);
            st.namespace
                .erase_node(&msg.node, ExitReason::REMOTE_NODE_UNREACHABLE);
        })
        .on::<RegisterTransport, _>(move |ctx, msg| {
            st_register
                .lock()
                .register_transport(ctx, msg.node, msg.transport);
        })
        .on::<DownMsg, _>(move |_ctx, msg| {
            // a cached remote actor went down: invalidate its endpoints
            let mut st = st_down.lock();
            st.cached.retain(|_, entry| entry.remote != msg.source);
        })
        .on::<ShutdownMiddleman, _>(|ctx, _msg: ShutdownMiddleman| {
            ctx.quit(ExitReason::NORMAL);
        })
        .build()
}

/// Clonable handle to the middleman actor with async convenience
/// wrappers around its message protocol.
#[derive(Clone)]
pub struct MiddlemanHandle {
    addr: ActorAddr,
    system: ActorSystem,
    state: SharedState,
}

impl MiddlemanHandle {
    /// The middleman's actor address.
    pub fn address(&self) -> &ActorAddr {
        &self.addr
    }

    /// The sink transports push incoming frames into.
    pub fn frame_sink(&self) -> FrameSink {
        FrameSink::new(self.addr.clone())
    }

    /// Register an established transport for `node` (accept path).
    pub fn register_transport(&self, node: NodeId, transport: Arc<dyn Transport>) {
        self.addr.enqueue(
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(RegisterTransport { node, transport }),
        );
    }

    /// Number of cached endpoints (one per successful connect).
    pub fn cached_endpoints(&self) -> usize {
        self.state.lock().cached.len()
    }

    /// Publish `whom`; resolves to the chosen port.
    pub async fn publish(
        &self,
        port: u16,
        whom: ActorAddr,
        interfaces: Vec<String>,
        reuse: bool,
    ) -> Result<u16, SystemError> {
        let reply = self
            .ask(Payload::new(Publish {
                port,
                whom,
                interfaces,
                addr: None,
                reuse,
            }))
            .await?;
        match reply.downcast_cloned::<Published>() {
            Some(published) => Ok(published.port),
            None => Err(Self::as_error(&reply)),
        }
    }

    /// Open a port without publishing; resolves to the chosen port.
    pub async fn open(&self, port: u16, reuse: bool) -> Result<u16, SystemError> {
        let reply = self
            .ask(Payload::new(Open {
                port,
                addr: None,
                reuse,
            }))
            .await?;
        match reply.downcast_cloned::<Published>() {
            Some(published) => Ok(published.port),
            None => Err(Self::as_error(&reply)),
        }
    }

    /// Connect to `host:port`; resolves to the peer's identity triple.
    pub async fn connect(&self, host: &str, port: u16) -> Result<ConnectedNode, SystemError> {
        let reply = self
            .ask(Payload::new(Connect {
                host: host.to_string(),
                port,
            }))
            .await?;
        match reply.downcast_cloned::<ConnectedNode>() {
            Some(connected) => Ok(connected),
            None => Err(Self::as_error(&reply)),
        }
    }

    /// Stop publishing `whom` on `port`.
    pub async fn unpublish(&self, whom: ActorAddr, port: u16) -> Result<(), SystemError> {
        let reply = self.ask(Payload::new(Unpublish { whom, port })).await?;
        match reply.downcast_ref::<Ack>() {
            Some(_) => Ok(()),
            None => Err(Self::as_error(&reply)),
        }
    }

    /// Close an open port.
    pub async fn close_port(&self, port: u16) -> Result<(), SystemError> {
        let reply = self.ask(Payload::new(ClosePort { port })).await?;
        match reply.downcast_ref::<Ack>() {
            Some(_) => Ok(()),
            None => Err(Self::as_error(&reply)),
        }
    }

    /// Spawn an actor of `type_name` on `node`.
    pub async fn spawn_remote(
        &self,
        node: NodeId,
        type_name: &str,
        args: Payload,
    ) -> Result<ActorAddr, SystemError> {
        let reply = self
            .ask(Payload::new(SpawnRemote {
                node,
                type_name: type_name.to_string(),
                args,
            }))
            .await?;
        match reply.downcast_cloned::<RemoteActor>() {
            Some(remote) => Ok(remote.actor),
            None => Err(Self::as_error(&reply)),
        }
    }

    /// Query connection data for `node`.
    pub async fn get_node(&self, node: NodeId) -> Result<NodeInfo, SystemError> {
        let reply = self.ask(Payload::new(GetNode { node })).await?;
        match reply.downcast_cloned::<NodeInfo>() {
            Some(info) => Ok(info),
            None => Err(Self::as_error(&reply)),
        }
    }

    pub(crate) fn shutdown(&self) {
        self.addr.enqueue(
            ActorAddr::invalid(),
            MessageId::ASYNC,
            Payload::new(ShutdownMiddleman),
        );
    }

    async fn ask(&self, payload: Payload) -> Result<Payload, SystemError> {
        let mut scoped = Scoped::new(&self.system);
        let mid = scoped.request(&self.addr, payload);
        let timeout = self.system.config().default_request_timeout;
        match scoped.await_response(mid, timeout).await {
            Some(element) => {
                if let Some(exited) = element.payload.downcast_ref::<SyncExitedMsg>() {
                    return Err(SystemError::SyncExited {
                        reason: exited.reason,
                    });
                }
                Ok(element.payload)
            }
            None => Err(SystemError::SyncTimeout),
        }
    }

    fn as_error(reply: &Payload) -> SystemError {
        match reply.downcast_cloned::<ErrorMsg>() {
            Some(msg) => msg.error,
            None => SystemError::Network(format!(
                "unexpected middleman reply of type {}",
                reply.type_name()
            )),
        }
    }
}

/// Spawn the middleman singleton, wiring its namespace to `broker`.
pub(crate) fn spawn_middleman(
    system: &ActorSystem,
    broker: ActorAddr,
) -> Result<MiddlemanHandle, SystemError> {
    let state = Arc::new(Mutex::new(MiddlemanState {
        namespace: ActorNamespace::new(system.node(), Arc::clone(system.registry())),
        broker,
        transports: HashMap::new(),
        cached: HashMap::new(),
        pending: HashMap::new(),
        open_ports: HashMap::new(),
        in_flight: HashMap::new(),
    }));

    let init_state = Arc::clone(&state);
    let addr = system.spawn_hidden(move |ctx| {
        let forwarder = ctx.address().clone();
        {
            let mut st = init_state.lock();
            st.namespace.set_proxy_factory(Box::new(move |aid, node| {
                ActorProxy::new(aid, node, forwarder.clone())
            }));
        }
        make_behavior(Arc::clone(&init_state))
    })?;

    let exit_state = Arc::clone(&state);
    if let Some(actor) = addr.actor() {
        actor.attach(Box::new(FunctorAttachable::new(move |_reason| {
            let mut st = exit_state.lock();
            let pending: Vec<(Endpoint, Vec<ResponsePromise>)> = st.pending.drain().collect();
            for ((host, port), promises) in pending {
                deliver_all(
                    promises,
                    Payload::new(ErrorMsg {
                        error: SystemError::CannotConnectToNode { host, port },
                    }),
                );
            }
            let nodes: Vec<NodeId> = st.transports.keys().copied().collect();
            for node in nodes {
                st.drop_transport(&node);
            }
            st.cached.clear();
        })));
    }

    Ok(MiddlemanHandle {
        addr,
        system: system.clone(),
        state,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::traits::Channel;
    use crate::actor::Scoped;
    use crate::behavior::Behavior;
    use crate::net::namespace::ActorNamespace;
    use crate::net::serialize::{BinaryDeserializer, BinarySerializer};
    use crate::net::transport::NetworkError;
    use crate::registry::ActorRegistry;
    use crate::system::SystemConfig;
    use crate::util::{HostId, HOST_ID_SIZE};
    use async_trait::async_trait;
    use std::time::Duration;

    struct ChannelTransport {
        tx: mpsc::UnboundedSender<Frame>,
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn send_frame(&self, frame: Frame) -> Result<(), NetworkError> {
            self.tx.send(frame).map_err(|_| NetworkError::Closed)
        }

        fn close(&self) {}
    }

    fn remote_node() -> NodeId {
        NodeId::new(555, HostId::from_bytes([5; HOST_ID_SIZE]))
    }

    fn spawn_dummy_broker(system: &ActorSystem) -> ActorAddr {
        system
            .spawn(|_ctx| Behavior::builder().on::<u8, _>(|_, _| {}).build())
            .unwrap()
    }

    #[tokio::test]
    async fn test_proxy_enqueue_diverts_into_forwarder() {
        let system = ActorSystem::new(SystemConfig::default());
        let mut hub = Scoped::new(&system);

        let proxy = ActorProxy::new(ActorId::from_raw(31), remote_node(), hub.address());
        proxy.enqueue(ActorAddr::invalid(), MessageId::ASYNC, Payload::new(7i32));

        let wrapped = hub.recv_timeout(Duration::from_secs(5)).await.unwrap();
        let forwarded = wrapped.payload.downcast_ref::<ForwardedMessage>().unwrap();
        assert_eq!(forwarded.node, remote_node());
        assert_eq!(forwarded.aid, ActorId::from_raw(31));
        assert_eq!(forwarded.payload.downcast_cloned::<i32>(), Some(7));
    }

    #[tokio::test]
    async fn test_remote_request_round_trip() {
        // serialize a local address, reify it in a namespace with a
        // different node id, and drive a request through the middleman
        // and a mock transport in both directions
        let system = ActorSystem::new(SystemConfig::default());
        let broker = spawn_dummy_broker(&system);
        let middleman = system.enable_networking(broker).unwrap();

        let echo = system
            .spawn(|_ctx| {
                Behavior::builder()
                    .on::<i32, _>(|ctx, n| ctx.respond(Payload::new(n + 1)))
                    .build()
            })
            .unwrap();

        // local namespace serializes the address to a buffer
        let mut local_ns = ActorNamespace::new(system.node(), Arc::clone(system.registry()));
        let mut sink = BinarySerializer::new();
        local_ns.write(&mut sink, &echo);

        // the simulated remote namespace reifies it as a proxy carrying
        // the original identity
        let mut remote_hub = Scoped::new(&system);
        let hub_addr = remote_hub.address();
        let mut remote_ns = ActorNamespace::new(remote_node(), Arc::new(ActorRegistry::new()));
        remote_ns.set_proxy_factory(Box::new(move |aid, node| {
            ActorProxy::new(aid, node, hub_addr.clone())
        }));
        let mut source = BinaryDeserializer::new(sink.into_bytes());
        let echo_on_remote = remote_ns.read(&mut source).unwrap();
        assert!(echo_on_remote.is_remote());
        assert_eq!(echo_on_remote.id(), echo.id());
        assert_eq!(echo_on_remote.node(), system.node());

        // the remote side's proxy diverts sends into its middleman (the
        // test hub here)
        echo_on_remote.enqueue(ActorAddr::invalid(), MessageId::ASYNC, Payload::new(1i32));
        let diverted = remote_hub.recv_timeout(Duration::from_secs(5)).await.unwrap();
        assert!(diverted.payload.is::<ForwardedMessage>());

        // wire back towards the remote node, observed by the test
        let (tx, mut wire_rx) = mpsc::unbounded_channel();
        middleman.register_transport(remote_node(), Arc::new(ChannelTransport { tx }));

        // a request frame arrives from the remote requester
        let requester = AddrTriple {
            actor: ActorId::from_raw(777),
            node: remote_node(),
        };
        let mid = MessageId::request(1);
        middleman.frame_sink().deliver(Frame {
            op: FrameOp::DispatchMessage,
            source: requester,
            dest: AddrTriple {
                actor: echo.id(),
                node: system.node(),
            },
            mid,
            payload: Payload::new(41i32),
        });

        // the response travels back through the transport
        let out = tokio::time::timeout(Duration::from_secs(5), wire_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.op, FrameOp::DispatchMessage);
        assert_eq!(out.dest, requester);
        assert_eq!(out.source.actor, echo.id());
        assert_eq!(out.source.node, system.node());
        assert_eq!(out.mid, mid.response_id());
        assert_eq!(out.payload.downcast_cloned::<i32>(), Some(42));
    }

    #[tokio::test]
    async fn test_transport_loss_kills_proxies_and_bounces_requests() {
        let system = ActorSystem::new(SystemConfig::default());
        let broker = spawn_dummy_broker(&system);
        let middleman = system.enable_networking(broker).unwrap();

        let (tx, wire_rx) = mpsc::unbounded_channel();
        middleman.register_transport(remote_node(), Arc::new(ChannelTransport { tx }));

        // reify a remote sender so a proxy exists for the node
        middleman.frame_sink().deliver(Frame {
            op: FrameOp::AnnounceProxy,
            source: AddrTriple {
                actor: ActorId::from_raw(88),
                node: remote_node(),
            },
            dest: AddrTriple::NONE,
            mid: MessageId::ASYNC,
            payload: Payload::empty(),
        });

        // an outstanding request towards the node
        let mut requester = Scoped::new(&system);
        let proxy_addr = loop {
            // the announce is processed asynchronously
            let addr = {
                let mut st = middleman.state.lock();
                st.namespace
                    .get(&remote_node(), ActorId::from_raw(88))
                    .map(|proxy| proxy.address())
            };
            if let Some(addr) = addr {
                break addr;
            }
            tokio::task::yield_now().await;
        };
        let mid = requester.request(&proxy_addr, Payload::new(1i32));
        // let the forward reach the wire before failing it
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            let mut rx = wire_rx;
            rx.recv().await
        })
        .await;

        middleman.frame_sink().connection_closed(remote_node());

        let reply = requester
            .await_response(mid, Duration::from_secs(5))
            .await
            .unwrap();
        let exited = reply.payload.downcast_ref::<SyncExitedMsg>().unwrap();
        assert_eq!(exited.reason, ExitReason::REMOTE_NODE_UNREACHABLE);
        assert!(proxy_addr.actor().unwrap().exited());
    }
}
