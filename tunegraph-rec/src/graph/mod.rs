//! Recommendation graph storage
//!
//! # Model
//!
//! | Label  | Key          | Properties                            |
//! |--------|--------------|---------------------------------------|
//! | Song   | external id  | title, duration, track_no, album_id   |
//! | Artist | external id  | name                                  |
//! | Genre  | name         |                                       |
//! | User   | external id  |                                       |
//!
//! Relationships: `(Song)-[:BELONGS_TO]->(Genre)`, `(Song)-[:CREATED_BY]->(Artist)`,
//! `(User)-[:SUBSCRIBED_TO]->(Genre)`, `(User)-[:RATED {rating}]->(Song)`.
//!
//! Every write is an idempotent merge keyed by the node key (or the node key
//! pair for relationships). Each trait call runs in its own transaction.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tunegraph_common::models::{GenreSubscription, SongRating};
use tunegraph_common::Result;

use crate::recommend::RecommendedSong;

mod sqlite;

pub use sqlite::SqliteGraphStore;

/// Node label families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeLabel {
    Song,
    Artist,
    Genre,
    User,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 4] = [
        NodeLabel::Song,
        NodeLabel::Artist,
        NodeLabel::Genre,
        NodeLabel::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Song => "Song",
            NodeLabel::Artist => "Artist",
            NodeLabel::Genre => "Genre",
            NodeLabel::User => "User",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived relationship types; all of them are rebuilt on every sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    BelongsTo,
    CreatedBy,
    SubscribedTo,
    Rated,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 4] = [
        RelationshipType::BelongsTo,
        RelationshipType::CreatedBy,
        RelationshipType::SubscribedTo,
        RelationshipType::Rated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::BelongsTo => "BELONGS_TO",
            RelationshipType::CreatedBy => "CREATED_BY",
            RelationshipType::SubscribedTo => "SUBSCRIBED_TO",
            RelationshipType::Rated => "RATED",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artist node as written by the artist phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistNode {
    pub key: String,
    pub name: String,
}

/// Song node plus the edges derived from its owning album
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongNode {
    pub key: String,
    pub title: String,
    pub duration: String,
    pub track_no: i64,
    /// Denormalized owning album id (a property, not an edge)
    pub album_id: String,
    /// One BELONGS_TO edge per entry
    pub genres: Vec<String>,
    /// CREATED_BY target, if the album links an artist
    pub artist_key: Option<String>,
}

/// Node and relationship counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub songs: i64,
    pub artists: i64,
    pub genres: i64,
    pub users: i64,
    pub belongs_to: i64,
    pub created_by: i64,
    pub subscribed_to: i64,
    pub rated: i64,
}

/// Property-graph store used by the sync pipeline (writes) and the
/// recommendation engine (reads)
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create uniqueness constraints for every node label (idempotent)
    async fn ensure_constraints(&self) -> Result<()>;

    /// Delete every relationship of the given types graph-wide
    ///
    /// Returns the number of relationships removed.
    async fn clear_relationships(&self, types: &[RelationshipType]) -> Result<u64>;

    /// Upsert Artist nodes
    async fn merge_artists(&self, artists: &[ArtistNode]) -> Result<usize>;

    /// Upsert Song nodes with their Genre/Artist neighbours, BELONGS_TO and CREATED_BY
    async fn merge_songs(&self, songs: &[SongNode]) -> Result<usize>;

    /// Upsert User and Genre nodes and SUBSCRIBED_TO edges
    async fn merge_subscriptions(&self, subscriptions: &[GenreSubscription]) -> Result<usize>;

    /// Upsert User and Song nodes and RATED edges, setting `rating` on each
    async fn merge_ratings(&self, ratings: &[SongRating]) -> Result<usize>;

    /// Detach-delete every node of `label` whose key is not in `keep`
    ///
    /// An empty `keep` removes every node of that label. Returns the number of
    /// nodes deleted.
    async fn prune_nodes(&self, label: NodeLabel, keep: &HashSet<String>) -> Result<u64>;

    /// Songs in genres the user subscribes to, minus songs the user rated below 4
    async fn subscribed_genre_songs(&self, user_key: &str, limit: u32)
        -> Result<Vec<RecommendedSong>>;

    /// Songs in genres the user does not subscribe to carrying at most
    /// `max_ratings` ratings in total
    async fn discover_new_songs(
        &self,
        user_key: &str,
        max_ratings: u32,
        limit: u32,
    ) -> Result<Vec<RecommendedSong>>;

    async fn stats(&self) -> Result<GraphStats>;
}
