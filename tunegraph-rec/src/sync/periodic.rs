//! Interval-driven full resync
//!
//! Change events are delivered at most once. A periodic trigger bounds how
//! long a lost event can leave the graph stale.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::coordinator::{RefreshCoordinator, TriggerOutcome};

pub struct PeriodicResync {
    coordinator: Arc<RefreshCoordinator>,
    period: Duration,
}

impl PeriodicResync {
    pub fn new(coordinator: Arc<RefreshCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
        }
    }

    /// Spawn the background ticker; abort the returned handle to stop it
    ///
    /// The first trigger fires one full period after spawning.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(interval_secs = self.period.as_secs(), "Starting periodic resync");

        tokio::spawn(async move {
            let mut timer = interval(self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            timer.tick().await;

            loop {
                timer.tick().await;
                let outcome = self.coordinator.trigger();
                if outcome != TriggerOutcome::Started {
                    debug!(outcome = ?outcome, "Periodic resync coalesced with in-flight sync");
                }
            }
        })
    }
}
