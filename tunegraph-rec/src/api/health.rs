//! Liveness endpoint
//!
//! Answers from process state alone. Neither store is consulted, so a slow
//! catalog or a sync in flight never fails the check.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
}

impl Liveness {
    pub const fn current() -> Self {
        Self {
            status: "ok",
            module: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// GET /health
pub async fn liveness() -> Json<Liveness> {
    Json(Liveness::current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_names_this_binary() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.module, "tunegraph-rec");
        assert!(!body.version.is_empty());
    }
}
