//! Named multicast groups.
//!
//! A group is an abstract channel: enqueueing into it forwards the
//! message to every current subscriber. Subscriptions are RAII tokens
//! whose drop unsubscribes.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::actor::{ActorAddr, Channel};
use crate::message::{GroupDownMsg, MessageId, Payload};

pub(crate) struct LocalGroup {
    identifier: String,
    subscribers: Mutex<Vec<(u64, ActorAddr)>>,
    next_token: AtomicU64,
}

impl Channel for LocalGroup {
    fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        let subscribers: Vec<ActorAddr> = {
            let subs = self.subscribers.lock();
            subs.iter().map(|(_, addr)| addr.clone()).collect()
        };
        for member in subscribers {
            member.enqueue(sender.clone(), mid, payload.clone());
        }
    }
}

/// Handle to a multicast channel with an identifier and a module name.
///
/// # Example
/// ```rust,no_run
/// use swarm_rt::message::Payload;
/// use swarm_rt::system::{ActorSystem, SystemConfig};
///
/// # async fn example() {
/// let system = ActorSystem::new(SystemConfig::default());
/// let group = system.groups().get_local("news");
/// assert_eq!(group.module_name(), "local");
/// group.enqueue(
///     swarm_rt::actor::ActorAddr::invalid(),
///     swarm_rt::message::MessageId::ASYNC,
///     Payload::new("hello subscribers"),
/// );
/// # }
/// ```
#[derive(Clone)]
pub struct Group {
    inner: Arc<LocalGroup>,
}

impl Group {
    /// The group's name within its module.
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// The module this group belongs to.
    pub fn module_name(&self) -> &'static str {
        "local"
    }

    /// Multicast a message to all current subscribers.
    pub fn enqueue(&self, sender: ActorAddr, mid: MessageId, payload: Payload) {
        self.inner.enqueue(sender, mid, payload);
    }

    /// Subscribe `member`; dropping the returned token unsubscribes.
    pub fn subscribe(&self, member: ActorAddr) -> Subscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((token, member));
        Subscription {
            group: self.clone(),
            token,
        }
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn unsubscribe(&self, token: u64) {
        self.inner.subscribers.lock().retain(|(t, _)| *t != token);
    }

    fn dissolve(&self) {
        let subscribers: Vec<ActorAddr> = {
            let mut subs = self.inner.subscribers.lock();
            subs.drain(..).map(|(_, addr)| addr).collect()
        };
        for member in subscribers {
            member.enqueue(
                ActorAddr::invalid(),
                MessageId::ASYNC,
                Payload::new(GroupDownMsg {
                    source: self.clone(),
                }),
            );
        }
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Group {}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group({}/{})", self.module_name(), self.identifier())
    }
}

/// RAII subscription token; drop to unsubscribe.
pub struct Subscription {
    group: Group,
    token: u64,
}

impl Subscription {
    /// The group this token subscribes to.
    pub fn group(&self) -> &Group {
        &self.group
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.group.unsubscribe(self.token);
    }
}

/// Process-wide directory of named multicast channels.
pub struct GroupManager {
    groups: DashMap<String, Group>,
}

impl GroupManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Get the local group `name`, creating it on first use.
    pub fn get_local(&self, name: &str) -> Group {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group {
                inner: Arc::new(LocalGroup {
                    identifier: name.to_string(),
                    subscribers: Mutex::new(Vec::new()),
                    next_token: AtomicU64::new(1),
                }),
            })
            .clone()
    }

    /// Number of known groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no group exists.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Notify all subscribers of all groups and forget the groups; part
    /// of system teardown.
    pub fn dissolve_all(&self) {
        let groups: Vec<Group> = self.groups.iter().map(|entry| entry.clone()).collect();
        self.groups.clear();
        for group in groups {
            group.dissolve();
        }
    }
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new()
    }
}
