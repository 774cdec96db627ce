//! Scheduler coupling: the resumable interface and the cooperative
//! driver that executes actors on the async runtime's worker threads.
//!
//! Actors move between idle, ready, and running through a single atomic
//! state word, so a single actor is never executed on two workers at
//! once. A resumed actor drains its mailbox until it runs out of
//! messages (`AwaitingMessage`), spends its throughput budget
//! (`ResumeLater`), or terminates (`Done`).

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::runtime::Handle;

// Layer 3: Internal module imports
// (none)

/// Verdict of a single `resume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeResult {
    /// Budget exhausted; re-queue the actor.
    ResumeLater,
    /// Mailbox drained; park until the next enqueue.
    AwaitingMessage,
    /// The actor terminated.
    Done,
    /// The execution unit is shutting down.
    ShutdownExecutionUnit,
}

/// Context handed to a resumed actor: access to the runtime for timer
/// arming and the shutdown flag of the executing unit.
pub struct ExecutionUnit {
    handle: Handle,
    shutdown: Arc<AtomicBool>,
}

impl ExecutionUnit {
    /// Runtime handle for spawning timers and auxiliary tasks.
    pub fn runtime(&self) -> &Handle {
        &self.handle
    }

    /// Whether the scheduler was asked to stop executing actors.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// An entity the scheduler can execute.
pub trait Resumable: Send + Sync {
    /// Run until a budget of `max_throughput` messages is spent, the
    /// mailbox drains, or the actor terminates.
    fn resume(&self, unit: &mut ExecutionUnit, max_throughput: usize) -> ResumeResult;
}

const IDLE: u8 = 0;
const READY: u8 = 1;
const RUNNING: u8 = 2;

/// The atomic idle/ready/running word enforcing single execution.
pub struct RunState(AtomicU8);

impl RunState {
    /// New state word in `idle`.
    pub fn new() -> Self {
        Self(AtomicU8::new(IDLE))
    }

    /// Attempt the idle → ready transition; the winner must schedule the
    /// actor.
    pub fn try_ready(&self) -> bool {
        self.0
            .compare_exchange(IDLE, READY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Enter `running` (from `ready`).
    pub fn set_running(&self) {
        self.0.store(RUNNING, Ordering::Release);
    }

    /// Re-enter `ready` while keeping the driver alive.
    pub fn set_ready(&self) {
        self.0.store(READY, Ordering::Release);
    }

    /// Return to `idle`; a later enqueue may schedule again.
    pub fn set_idle(&self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// A resumable with the hooks the driver needs for wakeup handling.
pub trait Schedulable: Resumable {
    /// The actor's run-state word.
    fn run_state(&self) -> &RunState;

    /// Whether input arrived that would make another resume productive.
    fn has_pending_input(&self) -> bool;
}

/// Cooperative scheduler executing actors as tasks on the enclosing
/// tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    handle: Handle,
    throughput: usize,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler bound to the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, mirroring
    /// [`Handle::current`].
    pub fn new(throughput: usize) -> Self {
        Self {
            handle: Handle::current(),
            throughput: throughput.max(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Messages an actor may process per resume.
    pub fn throughput(&self) -> usize {
        self.throughput
    }

    /// Runtime handle used for actor tasks and timers.
    pub fn runtime(&self) -> &Handle {
        &self.handle
    }

    /// Stop executing actors; outstanding resumes finish their current
    /// message.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Make `actor` ready and drive it; a no-op when it is already ready
    /// or running.
    pub fn schedule<A>(&self, actor: Arc<A>)
    where
        A: Schedulable + 'static,
    {
        if !actor.run_state().try_ready() {
            return;
        }
        let mut unit = ExecutionUnit {
            handle: self.handle.clone(),
            shutdown: Arc::clone(&self.shutdown),
        };
        let throughput = self.throughput;
        self.handle.spawn(async move {
            loop {
                actor.run_state().set_running();
                match actor.resume(&mut unit, throughput) {
                    ResumeResult::ResumeLater => {
                        actor.run_state().set_ready();
                        tokio::task::yield_now().await;
                    }
                    ResumeResult::AwaitingMessage => {
                        actor.run_state().set_idle();
                        // close the lost-wakeup window: input may have
                        // arrived between the drain and the transition
                        if actor.has_pending_input() && actor.run_state().try_ready() {
                            continue;
                        }
                        return;
                    }
                    ResumeResult::Done | ResumeResult::ShutdownExecutionUnit => {
                        actor.run_state().set_idle();
                        return;
                    }
                }
            }
        });
    }
}
