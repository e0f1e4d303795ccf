//! Per-run sync reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::graph::NodeLabel;

/// Sync pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Constraints,
    ClearRelationships,
    Artists,
    Songs,
    Subscriptions,
    Ratings,
    Prune,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Constraints => "constraints",
            SyncPhase::ClearRelationships => "clear_relationships",
            SyncPhase::Artists => "artists",
            SyncPhase::Songs => "songs",
            SyncPhase::Subscriptions => "subscriptions",
            SyncPhase::Ratings => "ratings",
            SyncPhase::Prune => "prune",
        }
    }

    /// Node labels whose seen sets this phase fills
    pub fn contributes_to(&self) -> &'static [NodeLabel] {
        match self {
            SyncPhase::Artists => &[NodeLabel::Artist],
            SyncPhase::Songs => &[NodeLabel::Song, NodeLabel::Genre, NodeLabel::Artist],
            SyncPhase::Subscriptions => &[NodeLabel::User, NodeLabel::Genre],
            SyncPhase::Ratings => &[NodeLabel::User],
            SyncPhase::Constraints | SyncPhase::ClearRelationships | SyncPhase::Prune => &[],
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Succeeded,
    Failed,
    TimedOut,
    /// Not attempted (pruning of an unobserved label)
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseOutcome {
    pub phase: SyncPhase,
    pub status: PhaseStatus,
    /// Records written (or nodes deleted, for pruning)
    pub records: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneOutcome {
    pub label: NodeLabel,
    pub status: PhaseStatus,
    /// Keys observed in the source for this label
    pub kept: usize,
    pub deleted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one full sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<PhaseOutcome>,
    pub pruned: Vec<PruneOutcome>,
}

impl SyncReport {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            phases: Vec::new(),
            pruned: Vec::new(),
        }
    }

    /// True when no phase or prune step failed or timed out
    pub fn is_clean(&self) -> bool {
        let ok = |status: PhaseStatus| {
            matches!(status, PhaseStatus::Succeeded | PhaseStatus::Skipped)
        };
        self.phases.iter().all(|p| ok(p.status)) && self.pruned.iter().all(|p| ok(p.status))
    }

    pub fn phase(&self, phase: SyncPhase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn prune(&self, label: NodeLabel) -> Option<&PruneOutcome> {
        self.pruned.iter().find(|p| p.label == label)
    }

    pub fn failed_phases(&self) -> Vec<SyncPhase> {
        self.phases
            .iter()
            .filter(|p| matches!(p.status, PhaseStatus::Failed | PhaseStatus::TimedOut))
            .map(|p| p.phase)
            .collect()
    }

    pub fn total_pruned(&self) -> u64 {
        self.pruned.iter().map(|p| p.deleted).sum()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(phase: SyncPhase, status: PhaseStatus) -> PhaseOutcome {
        PhaseOutcome {
            phase,
            status,
            records: 0,
            elapsed_ms: 0,
            error: None,
        }
    }

    #[test]
    fn test_is_clean() {
        let mut report = SyncReport::new();
        report.phases.push(outcome(SyncPhase::Artists, PhaseStatus::Succeeded));
        report.pruned.push(PruneOutcome {
            label: NodeLabel::User,
            status: PhaseStatus::Skipped,
            kept: 0,
            deleted: 0,
            error: None,
        });
        assert!(report.is_clean());

        report.phases.push(outcome(SyncPhase::Ratings, PhaseStatus::TimedOut));
        assert!(!report.is_clean());
        assert_eq!(report.failed_phases(), vec![SyncPhase::Ratings]);
    }

    #[test]
    fn test_serializes_snake_case_phases() {
        let mut report = SyncReport::new();
        report.phases.push(outcome(SyncPhase::ClearRelationships, PhaseStatus::TimedOut));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["phases"][0]["phase"], "clear_relationships");
        assert_eq!(json["phases"][0]["status"], "timed_out");
        assert!(json["phases"][0].get("error").is_none());
    }

    #[test]
    fn test_phase_contributions() {
        assert!(SyncPhase::Songs.contributes_to().contains(&NodeLabel::Artist));
        assert!(SyncPhase::Subscriptions.contributes_to().contains(&NodeLabel::Genre));
        assert!(SyncPhase::Prune.contributes_to().is_empty());
    }
}
