//! Process-wide actor registry with sharded concurrent lookup.
//!
//! Registered actors are addressable by id, which is what the actor
//! namespace relies on when it serializes a local address for a remote
//! peer. The registry also tracks the number of running non-hidden
//! actors so shutdown can await quiescence.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::warn;

// Layer 3: Internal module imports
use crate::actor::AbstractActor;
use crate::util::ActorId;

/// Concurrent id → actor map with O(1) amortized lookup.
pub struct ActorRegistry {
    entries: DashMap<u32, Arc<dyn AbstractActor>>,
    running_tx: watch::Sender<usize>,
}

impl ActorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (running_tx, _) = watch::channel(0usize);
        Self {
            entries: DashMap::new(),
            running_tx,
        }
    }

    /// Register `actor` under `id`. An existing entry wins; ids are
    /// process-unique, so a collision indicates a double registration.
    pub fn put(&self, id: ActorId, actor: Arc<dyn AbstractActor>) {
        if !id.is_valid() {
            return;
        }
        let mut inserted = false;
        self.entries.entry(id.raw()).or_insert_with(|| {
            inserted = true;
            actor
        });
        if !inserted {
            warn!(actor = %id, "registry entry already exists");
        }
    }

    /// Look up an actor by id.
    pub fn get(&self, id: ActorId) -> Option<Arc<dyn AbstractActor>> {
        self.entries.get(&id.raw()).map(|entry| Arc::clone(&entry))
    }

    /// Remove the entry for `id`, if any.
    pub fn erase(&self, id: ActorId) {
        self.entries.remove(&id.raw());
    }

    /// Number of registered actors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no actor is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Account for a newly running non-hidden actor.
    pub fn inc_running(&self) {
        self.running_tx.send_modify(|count| *count += 1);
    }

    /// Account for a terminated non-hidden actor.
    pub fn dec_running(&self) {
        self.running_tx.send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Current number of running non-hidden actors.
    pub fn running_count(&self) -> usize {
        *self.running_tx.borrow()
    }

    /// Wait until all non-hidden actors have terminated.
    pub async fn await_running_count_zero(&self) {
        let mut rx = self.running_tx.subscribe();
        loop {
            if *rx.borrow_and_update() == 0 {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
