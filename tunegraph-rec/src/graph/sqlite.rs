//! SQLite property-graph backend
//!
//! Nodes and relationships live in one table per label / relationship type.
//! Uniqueness constraints are unique indexes on the node keys and on the
//! endpoint pairs of each relationship, which is what makes every merge
//! (`INSERT ... ON CONFLICT`) idempotent.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::debug;
use tunegraph_common::models::{GenreSubscription, SongRating};
use tunegraph_common::Result;

use super::{ArtistNode, GraphStats, GraphStore, NodeLabel, RelationshipType, SongNode};
use crate::recommend::{RecommendedSong, NEGATIVE_RATING_BELOW};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS graph_songs (
        song_key TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        duration TEXT NOT NULL DEFAULT '',
        track_no INTEGER NOT NULL DEFAULT 0,
        album_id TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_artists (
        artist_key TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_genres (
        name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_users (
        user_key TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_belongs_to (
        song_key TEXT NOT NULL,
        genre_name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_created_by (
        song_key TEXT NOT NULL,
        artist_key TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_subscribed_to (
        user_key TEXT NOT NULL,
        genre_name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS graph_rated (
        user_key TEXT NOT NULL,
        song_key TEXT NOT NULL,
        rating INTEGER NOT NULL
    )"#,
];

const CONSTRAINTS: &[&str] = &[
    // Node keys
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_songs_key ON graph_songs(song_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_artists_key ON graph_artists(artist_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_genres_name ON graph_genres(name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_users_key ON graph_users(user_key)",
    // Relationship endpoints (CREATED_BY: at most one per song)
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_belongs_to ON graph_belongs_to(song_key, genre_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_created_by ON graph_created_by(song_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_subscribed_to ON graph_subscribed_to(user_key, genre_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_graph_rated ON graph_rated(user_key, song_key)",
    // Reverse lookups used by the recommendation queries
    "CREATE INDEX IF NOT EXISTS idx_graph_belongs_to_genre ON graph_belongs_to(genre_name)",
    "CREATE INDEX IF NOT EXISTS idx_graph_rated_song ON graph_rated(song_key)",
];

fn node_table(label: NodeLabel) -> (&'static str, &'static str) {
    match label {
        NodeLabel::Song => ("graph_songs", "song_key"),
        NodeLabel::Artist => ("graph_artists", "artist_key"),
        NodeLabel::Genre => ("graph_genres", "name"),
        NodeLabel::User => ("graph_users", "user_key"),
    }
}

/// Relationship columns that point at nodes of `label`
fn attached_edges(label: NodeLabel) -> &'static [(&'static str, &'static str)] {
    match label {
        NodeLabel::Song => &[
            ("graph_belongs_to", "song_key"),
            ("graph_created_by", "song_key"),
            ("graph_rated", "song_key"),
        ],
        NodeLabel::Artist => &[("graph_created_by", "artist_key")],
        NodeLabel::Genre => &[
            ("graph_belongs_to", "genre_name"),
            ("graph_subscribed_to", "genre_name"),
        ],
        NodeLabel::User => &[
            ("graph_subscribed_to", "user_key"),
            ("graph_rated", "user_key"),
        ],
    }
}

fn relationship_table(rel: RelationshipType) -> &'static str {
    match rel {
        RelationshipType::BelongsTo => "graph_belongs_to",
        RelationshipType::CreatedBy => "graph_created_by",
        RelationshipType::SubscribedTo => "graph_subscribed_to",
        RelationshipType::Rated => "graph_rated",
    }
}

const MERGE_USER: &str = "INSERT INTO graph_users (user_key) VALUES (?) ON CONFLICT DO NOTHING";
const MERGE_GENRE: &str = "INSERT INTO graph_genres (name) VALUES (?) ON CONFLICT DO NOTHING";

/// Graph store over a read-write SQLite pool
#[derive(Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn song_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RecommendedSong> {
    Ok(RecommendedSong {
        id: row.try_get("song_key")?,
        title: row.try_get("title")?,
        duration: row.try_get("duration")?,
        track_no: row.try_get("track_no")?,
        album_id: row.try_get("album_id")?,
        genre: row.try_get("genre")?,
    })
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn ensure_constraints(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA.iter().chain(CONSTRAINTS) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_relationships(&self, types: &[RelationshipType]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for rel in types {
            let sql = format!("DELETE FROM {}", relationship_table(*rel));
            removed += sqlx::query(&sql).execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn merge_artists(&self, artists: &[ArtistNode]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for artist in artists {
            sqlx::query(
                r#"
                INSERT INTO graph_artists (artist_key, name) VALUES (?, ?)
                ON CONFLICT(artist_key) DO UPDATE SET name = excluded.name
                "#,
            )
            .bind(&artist.key)
            .bind(&artist.name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(artists.len())
    }

    async fn merge_songs(&self, songs: &[SongNode]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for song in songs {
            sqlx::query(
                r#"
                INSERT INTO graph_songs (song_key, title, duration, track_no, album_id)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(song_key) DO UPDATE SET
                    title = excluded.title,
                    duration = excluded.duration,
                    track_no = excluded.track_no,
                    album_id = excluded.album_id
                "#,
            )
            .bind(&song.key)
            .bind(&song.title)
            .bind(&song.duration)
            .bind(song.track_no)
            .bind(&song.album_id)
            .execute(&mut *tx)
            .await?;

            if let Some(artist_key) = &song.artist_key {
                // Keeps the name written by the artist phase
                sqlx::query(
                    "INSERT INTO graph_artists (artist_key, name) VALUES (?, '') ON CONFLICT DO NOTHING",
                )
                .bind(artist_key)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO graph_created_by (song_key, artist_key) VALUES (?, ?)
                    ON CONFLICT(song_key) DO UPDATE SET artist_key = excluded.artist_key
                    "#,
                )
                .bind(&song.key)
                .bind(artist_key)
                .execute(&mut *tx)
                .await?;
            }

            for genre in &song.genres {
                sqlx::query(MERGE_GENRE).bind(genre).execute(&mut *tx).await?;
                sqlx::query(
                    "INSERT INTO graph_belongs_to (song_key, genre_name) VALUES (?, ?) ON CONFLICT DO NOTHING",
                )
                .bind(&song.key)
                .bind(genre)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(songs.len())
    }

    async fn merge_subscriptions(&self, subscriptions: &[GenreSubscription]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for sub in subscriptions {
            sqlx::query(MERGE_USER).bind(&sub.user_id).execute(&mut *tx).await?;
            sqlx::query(MERGE_GENRE).bind(&sub.genre).execute(&mut *tx).await?;
            sqlx::query(
                "INSERT INTO graph_subscribed_to (user_key, genre_name) VALUES (?, ?) ON CONFLICT DO NOTHING",
            )
            .bind(&sub.user_id)
            .bind(&sub.genre)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(subscriptions.len())
    }

    async fn merge_ratings(&self, ratings: &[SongRating]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for rating in ratings {
            sqlx::query(MERGE_USER).bind(&rating.user_id).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO graph_songs (song_key) VALUES (?) ON CONFLICT DO NOTHING")
                .bind(&rating.song_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"
                INSERT INTO graph_rated (user_key, song_key, rating) VALUES (?, ?, ?)
                ON CONFLICT(user_key, song_key) DO UPDATE SET rating = excluded.rating
                "#,
            )
            .bind(&rating.user_id)
            .bind(&rating.song_id)
            .bind(i64::from(rating.rating))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(ratings.len())
    }

    async fn prune_nodes(&self, label: NodeLabel, keep: &HashSet<String>) -> Result<u64> {
        let keep_json = serde_json::to_string(keep)?;
        let (table, key_column) = node_table(label);

        let mut tx = self.pool.begin().await?;

        // Detach first so no relationship can outlive its endpoint
        let mut detached = 0;
        for (edge_table, edge_column) in attached_edges(label) {
            let sql = format!(
                "DELETE FROM {} WHERE {} NOT IN (SELECT value FROM json_each(?))",
                edge_table, edge_column
            );
            detached += sqlx::query(&sql)
                .bind(&keep_json)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        let sql = format!(
            "DELETE FROM {} WHERE {} NOT IN (SELECT value FROM json_each(?))",
            table, key_column
        );
        let deleted = sqlx::query(&sql)
            .bind(&keep_json)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(label = %label, deleted, detached, "Pruned stale nodes");
        Ok(deleted)
    }

    async fn subscribed_genre_songs(
        &self,
        user_key: &str,
        limit: u32,
    ) -> Result<Vec<RecommendedSong>> {
        let rows = sqlx::query(
            r#"
            SELECT s.song_key, s.title, s.duration, s.track_no, s.album_id,
                   MIN(b.genre_name) AS genre
            FROM graph_subscribed_to st
            JOIN graph_belongs_to b ON b.genre_name = st.genre_name
            JOIN graph_songs s ON s.song_key = b.song_key
            WHERE st.user_key = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM graph_rated r
                  WHERE r.user_key = ?1 AND r.song_key = s.song_key AND r.rating < ?2
              )
            GROUP BY s.song_key
            ORDER BY s.title, s.song_key
            LIMIT ?3
            "#,
        )
        .bind(user_key)
        .bind(i64::from(NEGATIVE_RATING_BELOW))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(song_from_row).collect()
    }

    async fn discover_new_songs(
        &self,
        user_key: &str,
        max_ratings: u32,
        limit: u32,
    ) -> Result<Vec<RecommendedSong>> {
        let rows = sqlx::query(
            r#"
            SELECT s.song_key, s.title, s.duration, s.track_no, s.album_id,
                   MIN(b.genre_name) AS genre
            FROM graph_belongs_to b
            JOIN graph_songs s ON s.song_key = b.song_key
            WHERE NOT EXISTS (
                  SELECT 1 FROM graph_subscribed_to st
                  WHERE st.user_key = ?1 AND st.genre_name = b.genre_name
              )
              AND (SELECT COUNT(*) FROM graph_rated r WHERE r.song_key = s.song_key) <= ?2
            GROUP BY s.song_key
            ORDER BY s.title, s.song_key
            LIMIT ?3
            "#,
        )
        .bind(user_key)
        .bind(i64::from(max_ratings))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(song_from_row).collect()
    }

    async fn stats(&self) -> Result<GraphStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM graph_songs) AS songs,
                (SELECT COUNT(*) FROM graph_artists) AS artists,
                (SELECT COUNT(*) FROM graph_genres) AS genres,
                (SELECT COUNT(*) FROM graph_users) AS users,
                (SELECT COUNT(*) FROM graph_belongs_to) AS belongs_to,
                (SELECT COUNT(*) FROM graph_created_by) AS created_by,
                (SELECT COUNT(*) FROM graph_subscribed_to) AS subscribed_to,
                (SELECT COUNT(*) FROM graph_rated) AS rated
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(GraphStats {
            songs: row.try_get("songs")?,
            artists: row.try_get("artists")?,
            genres: row.try_get("genres")?,
            users: row.try_get("users")?,
            belongs_to: row.try_get("belongs_to")?,
            created_by: row.try_get("created_by")?,
            subscribed_to: row.try_get("subscribed_to")?,
            rated: row.try_get("rated")?,
        })
    }
}
