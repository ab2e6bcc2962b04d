pub mod cache;
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod openapi;
pub mod services;
pub mod snapshot;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the engine components callers compose
pub use services::{
    AffinityService, ExperimentEngine, FeedPage, FeedQuery, FeedService, IngestionService,
    SimilarityService, TrendingService,
};
