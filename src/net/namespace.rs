//! Network-transparent address translation.
//!
//! The namespace serializes actor references for the wire and reifies
//! incoming references: local ids resolve through the process-wide
//! registry, remote ids through a per-`(node, id)` map of weak proxy
//! references. It is single-threaded by contract: the middleman actor
//! drives it, and other components reach it by messaging the middleman.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use tracing::{debug, error, warn};

// Layer 3: Internal module imports
use super::proxy::ActorProxy;
use super::serialize::{Deserializer, Serializer, WireError};
use super::wire::AddrTriple;
use crate::actor::{AbstractActor, ActorAddr, ExitReason};
use crate::registry::ActorRegistry;
use crate::util::{ActorId, NodeId};

/// Creates the proxy for a previously unseen remote `(id, node)`.
pub type ProxyFactory = Box<dyn FnMut(ActorId, NodeId) -> Arc<ActorProxy> + Send>;

/// Invoked whenever a proxy is added to the map.
pub type NewElementCallback = Box<dyn FnMut(ActorId, &NodeId) + Send>;

/// Translates actor references to and from their wire representation and
/// owns the process-wide proxy map.
pub struct ActorNamespace {
    node: NodeId,
    registry: Arc<ActorRegistry>,
    factory: Option<ProxyFactory>,
    on_new_element: Option<NewElementCallback>,
    proxies: HashMap<NodeId, HashMap<ActorId, Weak<ActorProxy>>>,
}

impl ActorNamespace {
    /// Create a namespace for the process identified by `node`.
    pub fn new(node: NodeId, registry: Arc<ActorRegistry>) -> Self {
        Self {
            node,
            registry,
            factory: None,
            on_new_element: None,
            proxies: HashMap::new(),
        }
    }

    /// The node this namespace translates for.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Install the factory used to create proxies for unknown remotes.
    pub fn set_proxy_factory(&mut self, factory: ProxyFactory) {
        self.factory = Some(factory);
    }

    /// Install the callback invoked for every new proxy-map entry.
    pub fn set_new_element_callback(&mut self, callback: NewElementCallback) {
        self.on_new_element = Some(callback);
    }

    /// Convert `addr` into its identity triple, registering local actors
    /// in the registry so the remote peer can refer back to them.
    pub fn export(&mut self, addr: &ActorAddr) -> AddrTriple {
        let Some(actor) = addr.actor() else {
            return AddrTriple::NONE;
        };
        if !addr.is_remote() {
            self.registry.put(actor.id(), Arc::clone(actor));
        }
        AddrTriple {
            actor: actor.id(),
            node: actor.node(),
        }
    }

    /// Serialize `addr`; a null address becomes the zero triple.
    pub fn write(&mut self, sink: &mut dyn Serializer, addr: &ActorAddr) {
        self.export(addr).write(sink);
    }

    /// Reify an identity triple into an address.
    pub fn import(&mut self, triple: AddrTriple) -> ActorAddr {
        if triple.is_none() {
            return ActorAddr::invalid();
        }
        if triple.node == self.node {
            match self.registry.get(triple.actor) {
                Some(actor) => actor.address(),
                None => {
                    warn!(actor = %triple.actor, "local actor id not in registry");
                    ActorAddr::invalid()
                }
            }
        } else {
            match self.get_or_put(triple.node, triple.actor) {
                Some(proxy) => proxy.address(),
                None => ActorAddr::invalid(),
            }
        }
    }

    /// Deserialize an address written by [`write`](Self::write).
    pub fn read(&mut self, source: &mut dyn Deserializer) -> Result<ActorAddr, WireError> {
        let triple = AddrTriple::read(source)?;
        Ok(self.import(triple))
    }

    /// Number of proxy-map entries for `node` (live or expired).
    pub fn count_proxies(&self, node: &NodeId) -> usize {
        self.proxies.get(node).map_or(0, HashMap::len)
    }

    /// Look up the proxy for `(node, aid)`; an expired entry is erased
    /// lazily and `None` returned.
    pub fn get(&mut self, node: &NodeId, aid: ActorId) -> Option<Arc<ActorProxy>> {
        let submap = self.proxies.get_mut(node)?;
        let weak = submap.get(&aid)?;
        match weak.upgrade() {
            Some(proxy) => Some(proxy),
            None => {
                debug!(%node, actor = %aid, "proxy instance expired");
                submap.remove(&aid);
                None
            }
        }
    }

    /// Look up or create the proxy for `(node, aid)`.
    ///
    /// Returns `None` when the proxy is unknown and no factory is
    /// installed.
    pub fn get_or_put(&mut self, node: NodeId, aid: ActorId) -> Option<Arc<ActorProxy>> {
        if let Some(existing) = self.get(&node, aid) {
            return Some(existing);
        }
        let mut factory = self.factory.take()?;
        let proxy = factory(aid, node);
        self.factory = Some(factory);
        self.put(node, aid, &proxy);
        Some(proxy)
    }

    /// Store `proxy` under `(node, aid)`.
    ///
    /// An already-present live entry wins, preserving proxy identity;
    /// the attempt is logged as an error.
    pub fn put(&mut self, node: NodeId, aid: ActorId, proxy: &Arc<ActorProxy>) {
        let submap = self.proxies.entry(node).or_default();
        let occupied = submap
            .get(&aid)
            .is_some_and(|existing| existing.upgrade().is_some());
        if occupied {
            error!(%node, actor = %aid, "proxy already exists");
            return;
        }
        submap.insert(aid, Arc::downgrade(proxy));
        if let Some(callback) = self.on_new_element.as_mut() {
            callback(aid, &node);
        }
    }

    /// Evict all proxies for `node`, killing the live ones with
    /// `reason`.
    pub fn erase_node(&mut self, node: &NodeId, reason: ExitReason) {
        let Some(submap) = self.proxies.remove(node) else {
            return;
        };
        debug!(%node, count = submap.len(), "evicting proxies for node");
        for weak in submap.values() {
            if let Some(proxy) = weak.upgrade() {
                proxy.kill(reason);
            }
        }
    }

    /// Evict the proxy for `(node, aid)`, killing it with `reason` when
    /// still alive.
    pub fn erase_proxy(&mut self, node: &NodeId, aid: ActorId, reason: ExitReason) {
        let Some(submap) = self.proxies.get_mut(node) else {
            return;
        };
        if let Some(weak) = submap.remove(&aid) {
            if let Some(proxy) = weak.upgrade() {
                proxy.kill(reason);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::net::serialize::{BinaryDeserializer, BinarySerializer};
    use crate::util::{HostId, HOST_ID_SIZE};

    fn test_namespace() -> ActorNamespace {
        let local = NodeId::new(1, HostId::from_bytes([1; HOST_ID_SIZE]));
        let mut ns = ActorNamespace::new(local, Arc::new(ActorRegistry::new()));
        ns.set_proxy_factory(Box::new(|aid, node| {
            ActorProxy::new(aid, node, ActorAddr::invalid())
        }));
        ns
    }

    fn remote_node() -> NodeId {
        NodeId::new(2, HostId::from_bytes([2; HOST_ID_SIZE]))
    }

    #[test]
    fn test_invalid_addr_round_trip() {
        let mut ns = test_namespace();
        let mut sink = BinarySerializer::new();
        ns.write(&mut sink, &ActorAddr::invalid());

        let bytes = sink.into_bytes();
        assert_eq!(bytes.len(), 4 + 4 + HOST_ID_SIZE);
        assert!(bytes.iter().all(|b| *b == 0));

        let mut source = BinaryDeserializer::new(bytes);
        let addr = ns.read(&mut source).unwrap();
        assert!(!addr.is_valid());
    }

    #[test]
    fn test_remote_addr_round_trip() {
        let mut ns = test_namespace();
        let aid = ActorId::from_raw(17);
        let proxy = ns.get_or_put(remote_node(), aid).unwrap();
        let addr = proxy.address();

        let mut sink = BinarySerializer::new();
        ns.write(&mut sink, &addr);
        let mut source = BinaryDeserializer::new(sink.into_bytes());
        let restored = ns.read(&mut source).unwrap();

        assert_eq!(restored, addr);
        // identity, not just equality: the same proxy instance backs both
        assert_eq!(restored.id(), aid);
        assert!(restored.is_remote());
    }

    #[test]
    fn test_proxy_uniqueness_while_strong_ref_survives() {
        let mut ns = test_namespace();
        let aid = ActorId::from_raw(5);

        let first = ns.get_or_put(remote_node(), aid).unwrap();
        let second = ns.get_or_put(remote_node(), aid).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ns.count_proxies(&remote_node()), 1);
    }

    #[test]
    fn test_lazy_expiry_on_lookup() {
        let mut ns = test_namespace();
        let aid = ActorId::from_raw(5);

        let proxy = ns.get_or_put(remote_node(), aid).unwrap();
        drop(proxy);
        // the weak entry survives until touched
        assert_eq!(ns.count_proxies(&remote_node()), 1);
        assert!(ns.get(&remote_node(), aid).is_none());
        assert_eq!(ns.count_proxies(&remote_node()), 0);
    }

    #[test]
    fn test_new_proxy_after_expiry_is_distinct() {
        let mut ns = test_namespace();
        let aid = ActorId::from_raw(5);

        let first = ns.get_or_put(remote_node(), aid).unwrap();
        let first_addr = first.address();
        drop(first);

        let second = ns.get_or_put(remote_node(), aid).unwrap();
        // same identity triple, fresh instance
        assert_eq!(second.address(), first_addr);
    }

    #[test]
    fn test_put_keeps_existing_entry() {
        let mut ns = test_namespace();
        let aid = ActorId::from_raw(8);

        let original = ns.get_or_put(remote_node(), aid).unwrap();
        let intruder = ActorProxy::new(aid, remote_node(), ActorAddr::invalid());
        ns.put(remote_node(), aid, &intruder);

        let resolved = ns.get(&remote_node(), aid).unwrap();
        assert!(Arc::ptr_eq(&resolved, &original));
    }

    #[test]
    fn test_erase_node_kills_live_proxies() {
        let mut ns = test_namespace();
        let proxy = ns.get_or_put(remote_node(), ActorId::from_raw(3)).unwrap();

        ns.erase_node(&remote_node(), ExitReason::REMOTE_NODE_UNREACHABLE);

        assert!(proxy.exited());
        assert_eq!(proxy.exit_reason(), ExitReason::REMOTE_NODE_UNREACHABLE);
        assert_eq!(ns.count_proxies(&remote_node()), 0);
    }

    #[test]
    fn test_new_element_callback() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let mut ns = test_namespace();
        let added = Arc::new(AtomicUsize::new(0));
        let added_clone = Arc::clone(&added);
        ns.set_new_element_callback(Box::new(move |_, _| {
            added_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let _first = ns.get_or_put(remote_node(), ActorId::from_raw(1)).unwrap();
        let _again = ns.get_or_put(remote_node(), ActorId::from_raw(1)).unwrap();
        let _second = ns.get_or_put(remote_node(), ActorId::from_raw(2)).unwrap();

        assert_eq!(added.load(Ordering::SeqCst), 2);
    }
}
