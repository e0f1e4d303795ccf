use std::sync::Arc;
use tracing::{debug, warn};
use tunegraph_common::config::RecommendationSettings;
use tunegraph_common::Result;

use super::RecommendationResponse;
use crate::graph::GraphStore;

/// Stateless query engine over the graph store
///
/// Both queries run concurrently. If either fails the whole request fails.
#[derive(Clone)]
pub struct RecommendationEngine {
    graph: Arc<dyn GraphStore>,
    settings: RecommendationSettings,
}

impl RecommendationEngine {
    pub fn new(graph: Arc<dyn GraphStore>, settings: RecommendationSettings) -> Self {
        Self { graph, settings }
    }

    pub async fn get_recommendations(&self, user_id: &str) -> Result<RecommendationResponse> {
        let limit = self.settings.limit;

        let (subscribed_genre_songs, discover_new_songs) = tokio::try_join!(
            self.graph.subscribed_genre_songs(user_id, limit),
            self.graph
                .discover_new_songs(user_id, self.settings.discover_max_ratings, limit),
        )
        .map_err(|e| {
            warn!(user_id, error = %e, "Recommendation query failed");
            e
        })?;

        debug!(
            user_id,
            subscribed = subscribed_genre_songs.len(),
            discover = discover_new_songs.len(),
            "Recommendations computed"
        );

        Ok(RecommendationResponse {
            subscribed_genre_songs,
            discover_new_songs,
        })
    }
}
