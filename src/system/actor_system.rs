//! The actor system: spawning, process-wide collaborators, shutdown.
//!
//! The system owns the three process-wide collaborators in a documented
//! order: registry first, then the group manager, then (on demand) the
//! middleman. Teardown during shutdown runs in reverse.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::debug;

// Layer 3: Internal module imports
use super::config::SystemConfig;
use super::errors::SystemError;
use crate::actor::blocking::{BlockingActor, BlockingActorCell};
use crate::actor::scheduled::ScheduledActor;
use crate::actor::{AbstractActor, ActorAddr, ActorContext, FunctorAttachable};
use crate::behavior::Behavior;
use crate::group::GroupManager;
use crate::net::middleman::{spawn_middleman, MiddlemanHandle};
use crate::registry::ActorRegistry;
use crate::scheduler::Scheduler;
use crate::util::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemState {
    Running,
    ShuttingDown,
    Stopped,
}

pub(crate) struct SystemCore {
    config: SystemConfig,
    node: NodeId,
    registry: Arc<ActorRegistry>,
    groups: Arc<GroupManager>,
    scheduler: Scheduler,
    state: RwLock<SystemState>,
    middleman: RwLock<Option<MiddlemanHandle>>,
}

/// Handle to a running actor system.
///
/// Cloning is cheap and all clones refer to the same system.
///
/// # Examples
///
/// ```rust,no_run
/// use swarm_rt::behavior::Behavior;
/// use swarm_rt::message::Payload;
/// use swarm_rt::system::{ActorSystem, SystemConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let system = ActorSystem::new(SystemConfig::default());
///     let adder = system
///         .spawn(|_ctx| {
///             Behavior::builder()
///                 .on::<i32, _>(|ctx, n| ctx.respond(Payload::new(n + 1)))
///                 .build()
///         })
///         .unwrap();
///     adder.send_anonymous(Payload::new(41i32));
///     system.shutdown().await.ok();
/// }
/// ```
pub struct ActorSystem {
    inner: Arc<SystemCore>,
}

impl ActorSystem {
    /// Create a system bound to the current tokio runtime.
    pub fn new(config: SystemConfig) -> Self {
        let scheduler = Scheduler::new(config.scheduler_throughput);
        Self {
            inner: Arc::new(SystemCore {
                config,
                node: NodeId::local(),
                registry: Arc::new(ActorRegistry::new()),
                groups: Arc::new(GroupManager::new()),
                scheduler,
                state: RwLock::new(SystemState::Running),
                middleman: RwLock::new(None),
            }),
        }
    }

    /// The system configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// The identity of this process.
    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// The process-wide actor registry.
    pub fn registry(&self) -> &Arc<ActorRegistry> {
        &self.inner.registry
    }

    /// The process-wide group manager.
    pub fn groups(&self) -> &Arc<GroupManager> {
        &self.inner.groups
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub(crate) fn runtime_handle(&self) -> &Handle {
        self.inner.scheduler.runtime()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.state.read() != SystemState::Running
    }

    /// Number of running non-hidden actors.
    pub fn running_actors(&self) -> usize {
        self.inner.registry.running_count()
    }

    /// Spawn a scheduled actor; `init` runs first on the actor itself
    /// and returns its initial behavior.
    pub fn spawn<F>(&self, init: F) -> Result<ActorAddr, SystemError>
    where
        F: FnOnce(&mut ActorContext) -> Behavior + Send + 'static,
    {
        self.spawn_impl(Box::new(init), false)
    }

    /// Spawn a scheduled actor that does not count toward
    /// [`await_all_actors_done`](Self::await_all_actors_done).
    pub fn spawn_hidden<F>(&self, init: F) -> Result<ActorAddr, SystemError>
    where
        F: FnOnce(&mut ActorContext) -> Behavior + Send + 'static,
    {
        self.spawn_impl(Box::new(init), true)
    }

    fn spawn_impl(
        &self,
        init: crate::actor::scheduled::InitFn,
        hidden: bool,
    ) -> Result<ActorAddr, SystemError> {
        self.check_spawnable()?;
        let actor = ScheduledActor::create(self, init);
        let addr = actor.address();
        self.register(&*actor, hidden);
        // run the init closure promptly
        self.inner.scheduler.schedule(actor);
        Ok(addr)
    }

    /// Spawn a detached actor on a dedicated OS thread with a blocking
    /// receive.
    pub fn spawn_detached<F>(&self, run: F) -> Result<ActorAddr, SystemError>
    where
        F: FnOnce(&mut BlockingActor) + Send + 'static,
    {
        self.check_spawnable()?;
        let cell = BlockingActorCell::create(self);
        let addr = cell.address();
        self.register(&*cell, false);
        let system = self.clone();
        std::thread::spawn(move || {
            let mut actor = BlockingActor::new(system, cell);
            run(&mut actor);
            actor.shutdown();
        });
        Ok(addr)
    }

    fn check_spawnable(&self) -> Result<(), SystemError> {
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }
        let max = self.inner.config.max_actors;
        if max > 0 {
            let current = self.inner.registry.running_count();
            if current >= max {
                return Err(SystemError::ActorLimitExceeded { current, max });
            }
        }
        Ok(())
    }

    fn register(&self, actor: &dyn AbstractActor, hidden: bool) {
        let id = actor.id();
        let addr = actor.address();
        if let Some(arc) = addr.actor() {
            self.inner.registry.put(id, Arc::clone(arc));
        }
        if !hidden {
            self.inner.registry.inc_running();
        }
        let registry = Arc::clone(&self.inner.registry);
        actor.attach(Box::new(FunctorAttachable::new(move |_reason| {
            registry.erase(id);
            if !hidden {
                registry.dec_running();
            }
        })));
    }

    /// Start the networking singleton, delegating socket work to the
    /// endpoint-broker actor `broker`. Idempotent: a second call returns
    /// the existing handle.
    pub fn enable_networking(&self, broker: ActorAddr) -> Result<MiddlemanHandle, SystemError> {
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }
        {
            let middleman = self.inner.middleman.read();
            if let Some(handle) = middleman.as_ref() {
                return Ok(handle.clone());
            }
        }
        let handle = spawn_middleman(self, broker)?;
        *self.inner.middleman.write() = Some(handle.clone());
        Ok(handle)
    }

    /// The networking singleton, when started.
    pub fn middleman(&self) -> Option<MiddlemanHandle> {
        self.inner.middleman.read().clone()
    }

    /// Wait for all non-hidden actors to terminate.
    pub async fn await_all_actors_done(&self) {
        self.inner.registry.await_running_count_zero().await;
    }

    /// Graceful shutdown: stop accepting spawns, wait for all non-hidden
    /// actors, then tear down middleman and groups in reverse init
    /// order.
    pub async fn shutdown(&self) -> Result<(), SystemError> {
        {
            let mut state = self.inner.state.write();
            if *state != SystemState::Running {
                return Err(SystemError::ShuttingDown);
            }
            *state = SystemState::ShuttingDown;
        }
        debug!("system shutdown initiated");

        let deadline = self.inner.config.shutdown_timeout;
        if timeout(deadline, self.await_all_actors_done()).await.is_err() {
            return Err(SystemError::ShutdownTimeout(deadline));
        }

        if let Some(middleman) = self.inner.middleman.write().take() {
            middleman.shutdown();
        }
        self.inner.groups.dissolve_all();
        self.inner.scheduler.request_shutdown();

        *self.inner.state.write() = SystemState::Stopped;
        Ok(())
    }
}

impl Clone for ActorSystem {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Payload;

    #[tokio::test]
    async fn test_system_creation() {
        let system = ActorSystem::new(SystemConfig::default());
        assert!(!system.is_shutting_down());
        assert_eq!(system.running_actors(), 0);
        assert_eq!(system.node(), NodeId::local());
    }

    #[tokio::test]
    async fn test_spawn_counts_running() {
        let system = ActorSystem::new(SystemConfig::default());
        let addr = system
            .spawn(|_ctx| Behavior::builder().on::<i32, _>(|_, _| {}).build())
            .unwrap();

        assert!(addr.is_valid());
        assert_eq!(system.running_actors(), 1);
    }

    #[tokio::test]
    async fn test_hidden_spawn_not_counted() {
        let system = ActorSystem::new(SystemConfig::default());
        let _addr = system
            .spawn_hidden(|_ctx| Behavior::builder().on::<i32, _>(|_, _| {}).build())
            .unwrap();

        assert_eq!(system.running_actors(), 0);
    }

    #[tokio::test]
    async fn test_actor_limit() {
        let config = SystemConfig::builder().with_max_actors(1).build().unwrap();
        let system = ActorSystem::new(config);

        let _first = system
            .spawn(|_ctx| Behavior::builder().on::<i32, _>(|_, _| {}).build())
            .unwrap();
        let second = system.spawn(|_ctx| Behavior::builder().on::<i32, _>(|_, _| {}).build());

        assert!(matches!(
            second,
            Err(SystemError::ActorLimitExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_spawns() {
        let system = ActorSystem::new(SystemConfig::default());
        system.shutdown().await.unwrap();

        let result = system.spawn(|_ctx| Behavior::empty());
        assert!(matches!(result, Err(SystemError::ShuttingDown)));

        // double shutdown reports ShuttingDown
        assert!(matches!(
            system.shutdown().await,
            Err(SystemError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_actors() {
        let system = ActorSystem::new(SystemConfig::default());
        let addr = system
            .spawn(|_ctx| {
                Behavior::builder()
                    .on::<&'static str, _>(|ctx, msg| {
                        if msg == "stop" {
                            ctx.quit(crate::actor::ExitReason::NORMAL);
                        }
                    })
                    .build()
            })
            .unwrap();

        addr.send_anonymous(Payload::new("stop"));
        system.shutdown().await.unwrap();
        assert_eq!(system.running_actors(), 0);
    }
}
