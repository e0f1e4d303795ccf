//! Catalog records as read from the source-of-truth store
//!
//! These mirror the documents owned by the catalog services. Identifiers are
//! the stable external ids the graph keys its nodes by.

use serde::{Deserialize, Serialize};

/// Lowest valid listener rating
pub const MIN_RATING: u8 = 1;
/// Highest valid listener rating
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceArtist {
    pub id: String,
    pub name: String,
}

/// Album document; genres live here, not on songs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAlbum {
    pub id: String,
    pub genres: Vec<String>,
    /// Owning artist; `None` when the album has no artist link
    pub artist_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSong {
    pub id: String,
    pub title: String,
    /// Duration as stored by the catalog (e.g. `"3:45"`)
    pub duration: String,
    pub track_no: i64,
    pub album_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreSubscription {
    pub user_id: String,
    pub genre: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRating {
    pub user_id: String,
    pub song_id: String,
    /// 1-5
    pub rating: u8,
}

impl SongRating {
    pub fn is_valid_rating(rating: i64) -> bool {
        (i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&rating)
    }
}
