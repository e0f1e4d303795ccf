//! Graph synchronization
//!
//! [`GraphSyncEngine`] rebuilds the graph from the source store in one full
//! pass. [`RefreshCoordinator`] serializes those passes and coalesces bursts
//! of change notifications. [`PeriodicResync`] triggers a pass on a fixed
//! interval so a lost notification is eventually repaired.

mod coordinator;
mod engine;
mod periodic;
mod report;

pub use coordinator::{CoordinatorStatus, RefreshCoordinator, RunState, SyncRunner, TriggerOutcome};
pub use engine::GraphSyncEngine;
pub use periodic::PeriodicResync;
pub use report::{PhaseOutcome, PhaseStatus, PruneOutcome, SyncPhase, SyncReport};
