//! Full-resync pipeline
//!
//! Phases run strictly in order and each one under its own deadline:
//!
//! 1. ensure uniqueness constraints
//! 2. clear every derived relationship
//! 3. artists
//! 4. songs, with genres and CREATED_BY resolved through the owning album
//! 5. genre subscriptions
//! 6. ratings
//! 7. prune nodes whose keys were not seen in phases 3-6
//!
//! A failing phase is logged and recorded in the [`SyncReport`]; the pipeline
//! carries on. Labels fed by a failed phase are marked unobserved and are not
//! pruned in that run.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tunegraph_common::Result;

use super::coordinator::SyncRunner;
use super::report::{PhaseOutcome, PhaseStatus, PruneOutcome, SyncPhase, SyncReport};
use crate::graph::{ArtistNode, GraphStore, NodeLabel, RelationshipType, SongNode};
use crate::source::SourceRepository;

/// Keys observed in the source during one run
#[derive(Debug, Default)]
struct SeenKeys {
    songs: HashSet<String>,
    artists: HashSet<String>,
    genres: HashSet<String>,
    users: HashSet<String>,
    unobserved: HashSet<NodeLabel>,
}

impl SeenKeys {
    fn keys(&self, label: NodeLabel) -> &HashSet<String> {
        match label {
            NodeLabel::Song => &self.songs,
            NodeLabel::Artist => &self.artists,
            NodeLabel::Genre => &self.genres,
            NodeLabel::User => &self.users,
        }
    }

    fn is_observed(&self, label: NodeLabel) -> bool {
        !self.unobserved.contains(&label)
    }

    fn mark_unobserved(&mut self, labels: &[NodeLabel]) {
        self.unobserved.extend(labels.iter().copied());
    }
}

pub struct GraphSyncEngine {
    source: Arc<dyn SourceRepository>,
    graph: Arc<dyn GraphStore>,
    phase_timeout: Duration,
}

impl GraphSyncEngine {
    pub fn new(
        source: Arc<dyn SourceRepository>,
        graph: Arc<dyn GraphStore>,
        phase_timeout: Duration,
    ) -> Self {
        Self {
            source,
            graph,
            phase_timeout,
        }
    }

    /// Run every phase once and report what happened
    ///
    /// Never fails as a whole; per-phase failures are in the report.
    pub async fn run_full_sync(&self) -> SyncReport {
        let mut report = SyncReport::new();
        let mut seen = SeenKeys::default();

        info!(run_id = %report.run_id, "Starting full graph sync");

        let outcome = self
            .timed(SyncPhase::Constraints, async {
                self.graph.ensure_constraints().await.map(|_| 0)
            })
            .await;
        report.phases.push(outcome);

        let outcome = self
            .timed(SyncPhase::ClearRelationships, async {
                self.graph.clear_relationships(&RelationshipType::ALL).await
            })
            .await;
        report.phases.push(outcome);

        for phase in [
            SyncPhase::Artists,
            SyncPhase::Songs,
            SyncPhase::Subscriptions,
            SyncPhase::Ratings,
        ] {
            let outcome = self.timed(phase, self.sync_phase(phase, &mut seen)).await;
            if outcome.status != PhaseStatus::Succeeded {
                seen.mark_unobserved(phase.contributes_to());
            }
            report.phases.push(outcome);
        }

        let started = Instant::now();
        let pruned = self.prune(&seen).await;
        let failed = pruned
            .iter()
            .filter(|p| matches!(p.status, PhaseStatus::Failed | PhaseStatus::TimedOut))
            .count();
        report.phases.push(PhaseOutcome {
            phase: SyncPhase::Prune,
            status: if failed == 0 {
                PhaseStatus::Succeeded
            } else {
                PhaseStatus::Failed
            },
            records: pruned.iter().map(|p| p.deleted).sum(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: (failed > 0).then(|| format!("{} label(s) failed to prune", failed)),
        });
        report.pruned = pruned;

        report.finished_at = Utc::now();

        if report.is_clean() {
            info!(
                run_id = %report.run_id,
                elapsed_ms = report.elapsed_ms(),
                pruned = report.total_pruned(),
                "Full graph sync completed"
            );
        } else {
            warn!(
                run_id = %report.run_id,
                elapsed_ms = report.elapsed_ms(),
                failed = ?report.failed_phases(),
                "Full graph sync completed with failures"
            );
        }

        report
    }

    async fn sync_phase(&self, phase: SyncPhase, seen: &mut SeenKeys) -> Result<u64> {
        match phase {
            SyncPhase::Artists => self.sync_artists(seen).await,
            SyncPhase::Songs => self.sync_songs(seen).await,
            SyncPhase::Subscriptions => self.sync_subscriptions(seen).await,
            SyncPhase::Ratings => self.sync_ratings(seen).await,
            SyncPhase::Constraints | SyncPhase::ClearRelationships | SyncPhase::Prune => Ok(0),
        }
    }

    /// Run one phase under the deadline and record its outcome
    async fn timed<F>(&self, phase: SyncPhase, work: F) -> PhaseOutcome
    where
        F: Future<Output = Result<u64>>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.phase_timeout, work).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, records, error) = match result {
            Ok(Ok(records)) => {
                info!(phase = %phase, records, elapsed_ms, "Sync phase completed");
                (PhaseStatus::Succeeded, records, None)
            }
            Ok(Err(e)) => {
                error!(phase = %phase, elapsed_ms, error = %e, "Sync phase failed");
                (PhaseStatus::Failed, 0, Some(e.to_string()))
            }
            Err(_) => {
                error!(
                    phase = %phase,
                    timeout_ms = self.phase_timeout.as_millis() as u64,
                    "Sync phase timed out"
                );
                (
                    PhaseStatus::TimedOut,
                    0,
                    Some(format!("timed out after {:?}", self.phase_timeout)),
                )
            }
        };

        PhaseOutcome {
            phase,
            status,
            records,
            elapsed_ms,
            error,
        }
    }

    async fn sync_artists(&self, seen: &mut SeenKeys) -> Result<u64> {
        let artists = self.source.fetch_artists().await?;
        if artists.is_empty() {
            debug!("No artists in source");
            return Ok(0);
        }

        let nodes: Vec<ArtistNode> = artists
            .into_iter()
            .map(|a| ArtistNode {
                key: a.id,
                name: a.name,
            })
            .collect();

        let written = self.graph.merge_artists(&nodes).await?;
        seen.artists.extend(nodes.into_iter().map(|n| n.key));
        Ok(written as u64)
    }

    async fn sync_songs(&self, seen: &mut SeenKeys) -> Result<u64> {
        let albums = self.source.fetch_albums().await?;
        let songs = self.source.fetch_songs().await?;
        if songs.is_empty() {
            debug!("No songs in source");
            return Ok(0);
        }

        let albums: HashMap<String, _> = albums.into_iter().map(|a| (a.id.clone(), a)).collect();

        let mut nodes = Vec::with_capacity(songs.len());
        for song in songs {
            let (genres, artist_key) = match albums.get(&song.album_id) {
                Some(album) => (album.genres.clone(), album.artist_id.clone()),
                None => {
                    debug!(song_id = %song.id, album_id = %song.album_id, "Song has no known album");
                    (Vec::new(), None)
                }
            };

            nodes.push(SongNode {
                key: song.id,
                title: song.title,
                duration: song.duration,
                track_no: song.track_no,
                album_id: song.album_id,
                genres,
                artist_key,
            });
        }

        let written = self.graph.merge_songs(&nodes).await?;
        for node in nodes {
            seen.genres.extend(node.genres);
            if let Some(artist) = node.artist_key {
                seen.artists.insert(artist);
            }
            seen.songs.insert(node.key);
        }
        Ok(written as u64)
    }

    async fn sync_subscriptions(&self, seen: &mut SeenKeys) -> Result<u64> {
        let subscriptions = self.source.fetch_genre_subscriptions().await?;
        if subscriptions.is_empty() {
            debug!("No genre subscriptions in source");
            return Ok(0);
        }

        let written = self.graph.merge_subscriptions(&subscriptions).await?;
        for sub in subscriptions {
            seen.users.insert(sub.user_id);
            seen.genres.insert(sub.genre);
        }
        Ok(written as u64)
    }

    async fn sync_ratings(&self, seen: &mut SeenKeys) -> Result<u64> {
        let ratings = self.source.fetch_ratings().await?;
        if ratings.is_empty() {
            debug!("No ratings in source");
            return Ok(0);
        }

        let written = self.graph.merge_ratings(&ratings).await?;
        seen.users.extend(ratings.into_iter().map(|r| r.user_id));
        Ok(written as u64)
    }

    async fn prune(&self, seen: &SeenKeys) -> Vec<PruneOutcome> {
        let mut outcomes = Vec::with_capacity(NodeLabel::ALL.len());

        for label in NodeLabel::ALL {
            let keep = seen.keys(label);

            if !seen.is_observed(label) {
                warn!(label = %label, "Source not fully observed, skipping prune");
                outcomes.push(PruneOutcome {
                    label,
                    status: PhaseStatus::Skipped,
                    kept: keep.len(),
                    deleted: 0,
                    error: None,
                });
                continue;
            }

            let (status, deleted, error) =
                match tokio::time::timeout(self.phase_timeout, self.graph.prune_nodes(label, keep))
                    .await
                {
                    Ok(Ok(deleted)) => {
                        if deleted > 0 {
                            info!(label = %label, deleted, "Pruned stale nodes");
                        }
                        (PhaseStatus::Succeeded, deleted, None)
                    }
                    Ok(Err(e)) => {
                        error!(label = %label, error = %e, "Prune failed");
                        (PhaseStatus::Failed, 0, Some(e.to_string()))
                    }
                    Err(_) => {
                        error!(label = %label, "Prune timed out");
                        (
                            PhaseStatus::TimedOut,
                            0,
                            Some(format!("timed out after {:?}", self.phase_timeout)),
                        )
                    }
                };

            outcomes.push(PruneOutcome {
                label,
                status,
                kept: keep.len(),
                deleted,
                error,
            });
        }

        outcomes
    }
}

#[async_trait]
impl SyncRunner for GraphSyncEngine {
    async fn run_sync(&self) -> Result<SyncReport> {
        Ok(self.run_full_sync().await)
    }
}
