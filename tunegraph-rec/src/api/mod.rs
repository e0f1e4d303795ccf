//! HTTP API handlers for tunegraph-rec

pub mod auth;
pub mod entities;
pub mod events;
pub mod health;
pub mod recommendations;
pub mod status;

pub use auth::{service_key_middleware, SERVICE_API_KEY_HEADER};
pub use entities::{artist_exists, song_exists};
pub use events::receive_event;
pub use health::liveness;
pub use recommendations::{get_recommendations, USER_ID_HEADER};
pub use status::sync_status;
