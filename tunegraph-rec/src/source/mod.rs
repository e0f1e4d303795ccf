//! Source-of-truth access
//!
//! Read-only bulk scans of the catalog store the graph is derived from, plus
//! the existence checks other services call through the internal API.

use async_trait::async_trait;
use tunegraph_common::models::{
    GenreSubscription, SongRating, SourceAlbum, SourceArtist, SourceSong,
};
use tunegraph_common::Result;

mod sqlite;

pub use sqlite::{SqliteSourceRepository, SOURCE_TABLES};

/// Read-only accessor over the authoritative catalog store
///
/// Every scan returns the complete current collection. Implementations skip
/// individual records that cannot be decoded; a failure to read the
/// collection as a whole is an `Err`, never an empty `Vec`.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn fetch_artists(&self) -> Result<Vec<SourceArtist>>;

    async fn fetch_albums(&self) -> Result<Vec<SourceAlbum>>;

    async fn fetch_songs(&self) -> Result<Vec<SourceSong>>;

    async fn fetch_genre_subscriptions(&self) -> Result<Vec<GenreSubscription>>;

    async fn fetch_ratings(&self) -> Result<Vec<SongRating>>;

    async fn song_exists(&self, song_id: &str) -> Result<bool>;

    async fn artist_exists(&self, artist_id: &str) -> Result<bool>;
}
