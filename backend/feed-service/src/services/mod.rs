//! Service layer for the discovery feed engine
//!
//! Pipeline: ingestion → affinity → (similarity | trending snapshots) →
//! candidate generators → ranking → diversity filter → feed assembly.

pub mod affinity;
pub mod candidates;
pub mod diversity;
pub mod experiments;
pub mod feed;
pub mod ingestion;
pub mod ranking;
pub mod similarity;
pub mod trending;

pub use affinity::AffinityService;
pub use experiments::ExperimentEngine;
pub use feed::{FeedPage, FeedQuery, FeedService};
pub use ingestion::IngestionService;
pub use similarity::SimilarityService;
pub use trending::TrendingService;
