//! SQLite catalog store adapter
//!
//! Collections are document-style tables owned by the catalog services.
//! Album genres are stored as a JSON array in a TEXT column.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use tunegraph_common::models::{
    GenreSubscription, SongRating, SourceAlbum, SourceArtist, SourceSong,
};
use tunegraph_common::Result;

use super::SourceRepository;

/// Table layout this adapter reads
///
/// Owned by the catalog services; listed here so fixture databases can be built
/// with the same shape.
pub const SOURCE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS artists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS albums (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        genres TEXT NOT NULL DEFAULT '[]',
        artist_id TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS songs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        duration TEXT NOT NULL DEFAULT '',
        track_no INTEGER NOT NULL DEFAULT 0,
        album_id TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS genre_subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        genre TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_ratings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        song_id TEXT NOT NULL,
        rating INTEGER NOT NULL
    )"#,
];

/// Catalog reader over a (read-only) SQLite pool
#[derive(Clone)]
pub struct SqliteSourceRepository {
    pool: SqlitePool,
}

impl SqliteSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Decode every row, skipping (and logging) the ones that don't fit
fn decode_rows<T>(
    collection: &str,
    rows: Vec<SqliteRow>,
    decode: impl Fn(&SqliteRow) -> std::result::Result<T, String>,
) -> Vec<T> {
    let total = rows.len();
    let records: Vec<T> = rows
        .iter()
        .filter_map(|row| match decode(row) {
            Ok(record) => Some(record),
            Err(reason) => {
                warn!(collection, "Skipping undecodable record: {}", reason);
                None
            }
        })
        .collect();

    debug!(collection, total, decoded = records.len(), "Scanned source collection");
    records
}

fn non_empty(value: String, field: &str) -> std::result::Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("empty {}", field))
    } else {
        Ok(trimmed.to_string())
    }
}

#[async_trait]
impl SourceRepository for SqliteSourceRepository {
    async fn fetch_artists(&self) -> Result<Vec<SourceArtist>> {
        let rows = sqlx::query("SELECT id, name FROM artists")
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows("artists", rows, |row| {
            let id: String = row.try_get("id").map_err(|e| e.to_string())?;
            let name: Option<String> = row.try_get("name").map_err(|e| e.to_string())?;
            Ok(SourceArtist {
                id: non_empty(id, "id")?,
                name: name.unwrap_or_default(),
            })
        }))
    }

    async fn fetch_albums(&self) -> Result<Vec<SourceAlbum>> {
        let rows = sqlx::query("SELECT id, genres, artist_id FROM albums")
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows("albums", rows, |row| {
            let id: String = row.try_get("id").map_err(|e| e.to_string())?;
            let genres_json: Option<String> = row.try_get("genres").map_err(|e| e.to_string())?;
            let artist_id: Option<String> = row.try_get("artist_id").map_err(|e| e.to_string())?;

            let genres: Vec<String> = match genres_json.as_deref().map(str::trim) {
                None | Some("") => Vec::new(),
                Some(json) => serde_json::from_str(json)
                    .map_err(|e| format!("album {} has invalid genres: {}", id, e))?,
            };

            Ok(SourceAlbum {
                id: non_empty(id, "id")?,
                genres: genres
                    .into_iter()
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty())
                    .collect(),
                artist_id: artist_id
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty()),
            })
        }))
    }

    async fn fetch_songs(&self) -> Result<Vec<SourceSong>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, CAST(duration AS TEXT) AS duration,
                   CAST(track_no AS INTEGER) AS track_no, album_id
            FROM songs
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows("songs", rows, |row| {
            let id: String = row.try_get("id").map_err(|e| e.to_string())?;
            let title: Option<String> = row.try_get("title").map_err(|e| e.to_string())?;
            let duration: Option<String> = row.try_get("duration").map_err(|e| e.to_string())?;
            let track_no: Option<i64> = row.try_get("track_no").map_err(|e| e.to_string())?;
            let album_id: Option<String> = row.try_get("album_id").map_err(|e| e.to_string())?;

            Ok(SourceSong {
                id: non_empty(id, "id")?,
                title: title.unwrap_or_default(),
                duration: duration.unwrap_or_default(),
                track_no: track_no.unwrap_or(0),
                album_id: album_id.unwrap_or_default(),
            })
        }))
    }

    async fn fetch_genre_subscriptions(&self) -> Result<Vec<GenreSubscription>> {
        let rows = sqlx::query("SELECT user_id, genre FROM genre_subscriptions")
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows("genre_subscriptions", rows, |row| {
            let user_id: String = row.try_get("user_id").map_err(|e| e.to_string())?;
            let genre: String = row.try_get("genre").map_err(|e| e.to_string())?;
            Ok(GenreSubscription {
                user_id: non_empty(user_id, "user_id")?,
                genre: non_empty(genre, "genre")?,
            })
        }))
    }

    async fn fetch_ratings(&self) -> Result<Vec<SongRating>> {
        let rows = sqlx::query("SELECT user_id, song_id, rating FROM user_ratings")
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows("user_ratings", rows, |row| {
            let user_id: String = row.try_get("user_id").map_err(|e| e.to_string())?;
            let song_id: String = row.try_get("song_id").map_err(|e| e.to_string())?;
            let rating: i64 = row.try_get("rating").map_err(|e| e.to_string())?;

            if !SongRating::is_valid_rating(rating) {
                return Err(format!("rating {} out of range", rating));
            }

            Ok(SongRating {
                user_id: non_empty(user_id, "user_id")?,
                song_id: non_empty(song_id, "song_id")?,
                rating: rating as u8,
            })
        }))
    }

    async fn song_exists(&self, song_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs WHERE id = ?")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn artist_exists(&self, artist_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists WHERE id = ?")
            .bind(artist_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}
