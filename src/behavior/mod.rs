//! Behaviors: composable partial functions over messages with optional
//! timeouts and one-shot continuations.

pub mod behavior;

pub use behavior::{Behavior, BehaviorBuilder, CaseOutcome, DispatchResult, TimeoutDef};
