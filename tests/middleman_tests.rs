//! Middleman behavior: publish, connect caching and deduplication, and
//! synchronous argument validation.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swarm_rt::behavior::Behavior;
use swarm_rt::message::Payload;
use swarm_rt::net::{
    BoundPort, BrokerBind, BrokerConnect, BrokerConnected, Frame, NetworkError, Transport,
};
use swarm_rt::prelude::*;
use swarm_rt::util::{ActorId, HostId, NodeId, HOST_ID_SIZE};

struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send_frame(&self, _frame: Frame) -> Result<(), NetworkError> {
        Ok(())
    }

    fn close(&self) {}
}

fn peer_node() -> NodeId {
    NodeId::new(777, HostId::from_bytes([7; HOST_ID_SIZE]))
}

/// Broker answering binds with a fixed port and connects with a fixed
/// peer, counting the connect round-trips it actually served.
fn spawn_mock_broker(
    system: &ActorSystem,
    connects: Arc<AtomicUsize>,
    reply_delay: Duration,
) -> ActorAddr {
    system
        .spawn(move |_ctx| {
            let connects = Arc::clone(&connects);
            Behavior::builder()
                .on::<BrokerBind, _>(|ctx, bind| {
                    let port = if bind.port == 0 { 34567 } else { bind.port };
                    ctx.respond(Payload::new(BoundPort(port)));
                })
                .on::<BrokerConnect, _>(move |ctx, _connect| {
                    connects.fetch_add(1, Ordering::SeqCst);
                    let mut promise = ctx.make_response_promise();
                    tokio::spawn(async move {
                        tokio::time::sleep(reply_delay).await;
                        promise.deliver(Payload::new(BrokerConnected {
                            node: peer_node(),
                            remote_id: ActorId::from_raw(4242),
                            interfaces: vec!["calculator".to_string()],
                            transport: Arc::new(NullTransport),
                        }));
                    });
                })
                .build()
        })
        .unwrap()
}

#[tokio::test]
async fn test_publish_on_port_zero_returns_chosen_port() {
    let system = ActorSystem::new(SystemConfig::default());
    let broker = spawn_mock_broker(&system, Arc::new(AtomicUsize::new(0)), Duration::ZERO);
    let middleman = system.enable_networking(broker).unwrap();

    let actor = system
        .spawn(|_ctx| Behavior::builder().on::<i32, _>(|_, _| {}).build())
        .unwrap();

    let port = middleman
        .publish(0, actor, vec!["calculator".to_string()], false)
        .await
        .unwrap();
    assert_eq!(port, 34567);
}

#[tokio::test]
async fn test_publish_invalid_actor_rejected() {
    let system = ActorSystem::new(SystemConfig::default());
    let broker = spawn_mock_broker(&system, Arc::new(AtomicUsize::new(0)), Duration::ZERO);
    let middleman = system.enable_networking(broker).unwrap();

    let result = middleman
        .publish(0, ActorAddr::invalid(), Vec::new(), false)
        .await;
    assert!(matches!(result, Err(SystemError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_concurrent_connects_share_one_round_trip() {
    // S6: two concurrent connects resolve identically from one broker
    // round-trip, and the cache ends up with exactly one entry
    let system = ActorSystem::new(SystemConfig::default());
    let connects = Arc::new(AtomicUsize::new(0));
    let broker = spawn_mock_broker(&system, Arc::clone(&connects), Duration::from_millis(100));
    let middleman = system.enable_networking(broker).unwrap();

    let (first, second) = tokio::join!(
        middleman.connect("node7.example", 4000),
        middleman.connect("node7.example", 4000),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.node, peer_node());
    assert!(first.remote.is_remote());
    assert_eq!(first.remote.id(), ActorId::from_raw(4242));
    assert_eq!(first.interfaces, vec!["calculator".to_string()]);

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(middleman.cached_endpoints(), 1);
}

#[tokio::test]
async fn test_cached_connect_skips_broker() {
    let system = ActorSystem::new(SystemConfig::default());
    let connects = Arc::new(AtomicUsize::new(0));
    let broker = spawn_mock_broker(&system, Arc::clone(&connects), Duration::ZERO);
    let middleman = system.enable_networking(broker).unwrap();

    let first = middleman.connect("node7.example", 4000).await.unwrap();
    let second = middleman.connect("node7.example", 4000).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_node_after_connect() {
    let system = ActorSystem::new(SystemConfig::default());
    let broker = spawn_mock_broker(&system, Arc::new(AtomicUsize::new(0)), Duration::ZERO);
    let middleman = system.enable_networking(broker).unwrap();

    middleman.connect("node7.example", 4000).await.unwrap();

    let info = middleman.get_node(peer_node()).await.unwrap();
    assert_eq!(info.node, peer_node());
    assert_eq!(info.host, "node7.example");
    assert_eq!(info.port, 4000);
}

#[tokio::test]
async fn test_connect_failure_surfaces_host_and_port() {
    let system = ActorSystem::new(SystemConfig::default());
    // a broker that answers connects with an error payload
    let broker = system
        .spawn(|_ctx| {
            Behavior::builder()
                .on::<BrokerConnect, _>(|ctx, _connect| {
                    ctx.respond(Payload::new("no route"));
                })
                .build()
        })
        .unwrap();
    let middleman = system.enable_networking(broker).unwrap();

    let result = middleman.connect("unreachable.example", 9).await;
    match result {
        Err(SystemError::CannotConnectToNode { host, port }) => {
            assert_eq!(host, "unreachable.example");
            assert_eq!(port, 9);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_spawn_remote_validates_arguments() {
    let system = ActorSystem::new(SystemConfig::default());
    let broker = spawn_mock_broker(&system, Arc::new(AtomicUsize::new(0)), Duration::ZERO);
    let middleman = system.enable_networking(broker).unwrap();

    let invalid_node = middleman
        .spawn_remote(NodeId::ZERO, "worker", Payload::empty())
        .await;
    assert!(matches!(
        invalid_node,
        Err(SystemError::InvalidArgument(_))
    ));

    let empty_name = middleman
        .spawn_remote(peer_node(), "", Payload::empty())
        .await;
    assert!(matches!(empty_name, Err(SystemError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_enable_networking_is_idempotent() {
    let system = ActorSystem::new(SystemConfig::default());
    let broker = spawn_mock_broker(&system, Arc::new(AtomicUsize::new(0)), Duration::ZERO);

    let first = system.enable_networking(broker.clone()).unwrap();
    let second = system.enable_networking(broker).unwrap();
    assert_eq!(first.address(), second.address());
}
