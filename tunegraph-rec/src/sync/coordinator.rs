//! Refresh coalescing
//!
//! State machine behind one mutex:
//!
//! ```text
//!   Idle --trigger--> Running{queued: false} --trigger--> Running{queued: true}
//!    ^                        |                                   |
//!    +------- run done -------+        run done: clear queued, run again
//! ```
//!
//! A burst of triggers therefore produces at most two runs: the one in flight
//! and a single trailing run that observes everything that arrived after the
//! first one started.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};
use tunegraph_common::Result;

use super::report::SyncReport;

/// Something that can perform one full sync pass
#[async_trait]
pub trait SyncRunner: Send + Sync {
    async fn run_sync(&self) -> Result<SyncReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { queued: bool },
}

/// What a call to [`RefreshCoordinator::trigger`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Coordinator was idle; a run loop was spawned
    Started,
    /// A run is in flight; a trailing run was scheduled
    Queued,
    /// A trailing run was already scheduled
    AlreadyQueued,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub state: &'static str,
    pub queued: bool,
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub last_report: Option<SyncReport>,
}

pub struct RefreshCoordinator {
    runner: Arc<dyn SyncRunner>,
    state: Mutex<RunState>,
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    last_report: RwLock<Option<SyncReport>>,
    /// `true` while idle
    idle_tx: watch::Sender<bool>,
}

impl RefreshCoordinator {
    pub fn new(runner: Arc<dyn SyncRunner>) -> Arc<Self> {
        let (idle_tx, _) = watch::channel(true);
        Arc::new(Self {
            runner,
            state: Mutex::new(RunState::Idle),
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            last_report: RwLock::new(None),
            idle_tx,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        // Nothing panics while holding the lock; recover the value regardless
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request a full resync
    ///
    /// Never blocks and never waits for the sync; safe to call from any task.
    /// Must be called from within a Tokio runtime.
    pub fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        let mut state = self.lock_state();
        let outcome = match *state {
            RunState::Idle => {
                *state = RunState::Running { queued: false };
                self.idle_tx.send_replace(false);
                let coordinator = Arc::clone(self);
                tokio::spawn(async move { coordinator.run_loop().await });
                TriggerOutcome::Started
            }
            RunState::Running { queued: false } => {
                *state = RunState::Running { queued: true };
                TriggerOutcome::Queued
            }
            RunState::Running { queued: true } => TriggerOutcome::AlreadyQueued,
        };
        drop(state);

        debug!(outcome = ?outcome, "Refresh triggered");
        outcome
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let run = self.runs_started.fetch_add(1, Ordering::SeqCst) + 1;

            // Separate task so a panicking run cannot take the loop down with it
            let runner = Arc::clone(&self.runner);
            let handle = tokio::spawn(async move { runner.run_sync().await });

            match handle.await {
                Ok(Ok(report)) => {
                    debug!(run, run_id = %report.run_id, clean = report.is_clean(), "Sync run finished");
                    *self.last_report.write().await = Some(report);
                }
                Ok(Err(e)) => {
                    self.runs_failed.fetch_add(1, Ordering::SeqCst);
                    error!(run, error = %e, "Sync run failed");
                }
                Err(join_error) => {
                    self.runs_failed.fetch_add(1, Ordering::SeqCst);
                    if join_error.is_panic() {
                        error!(run, "Sync run panicked");
                    } else {
                        warn!(run, "Sync run was cancelled");
                    }
                }
            }
            self.runs_completed.fetch_add(1, Ordering::SeqCst);

            if !self.take_queued() {
                break;
            }
            info!("Changes arrived during sync, running again");
        }
    }

    /// After a run: consume the queued bit, or go idle
    fn take_queued(&self) -> bool {
        let mut state = self.lock_state();
        match *state {
            RunState::Running { queued: true } => {
                *state = RunState::Running { queued: false };
                true
            }
            _ => {
                *state = RunState::Idle;
                self.idle_tx.send_replace(true);
                false
            }
        }
    }

    pub fn state(&self) -> RunState {
        *self.lock_state()
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::SeqCst)
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::SeqCst)
    }

    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Resolves once no run is in flight or queued
    pub async fn wait_until_idle(&self) {
        let mut idle_rx = self.idle_tx.subscribe();
        // Sender is owned by self, so the channel cannot close here
        let _ = idle_rx.wait_for(|idle| *idle).await;
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let (state, queued) = match self.state() {
            RunState::Idle => ("idle", false),
            RunState::Running { queued } => ("running", queued),
        };
        CoordinatorStatus {
            state,
            queued,
            runs_started: self.runs_started(),
            runs_completed: self.runs_completed(),
            runs_failed: self.runs_failed.load(Ordering::SeqCst),
            last_report: self.last_report().await,
        }
    }
}
