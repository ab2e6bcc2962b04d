pub mod feed;
pub mod interactions;
pub mod profile;
pub mod trending;

pub use feed::post_feed;
pub use interactions::track_interaction;
pub use profile::get_profile;
pub use trending::get_trending;

use actix_web::{get, HttpResponse};
use std::sync::Arc;

use crate::services::{AffinityService, FeedService, IngestionService, TrendingService};

/// Shared handler state
pub struct AppState {
    pub feed: Arc<FeedService>,
    pub affinity: Arc<AffinityService>,
    pub trending: Arc<TrendingService>,
    pub ingestion: IngestionService,
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/metrics")]
pub async fn metrics_endpoint() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::render())
}
