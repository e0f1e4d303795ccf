//! Recommendation read path

use serde::{Deserialize, Serialize};

mod engine;

pub use engine::RecommendationEngine;

/// Ratings strictly below this count as a dislike for the subscribed-genre list
pub const NEGATIVE_RATING_BELOW: u8 = 4;

/// Song as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedSong {
    pub id: String,
    pub title: String,
    pub duration: String,
    pub track_no: i64,
    pub album_id: String,
    /// Genre through which the song matched
    pub genre: String,
}

/// Both recommendation lists; each is empty rather than absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub subscribed_genre_songs: Vec<RecommendedSong>,
    pub discover_new_songs: Vec<RecommendedSong>,
}
