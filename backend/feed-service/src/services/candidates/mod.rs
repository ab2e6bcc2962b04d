//! Candidate generation layer
//!
//! Six independent strategies each emit a scored candidate list from the
//! same content universe. Generators never communicate with each other and
//! never mutate shared state; the feed assembler fans them out in parallel
//! and a failed generator only degrades the blend, it never aborts the
//! request.

mod collaborative;
mod exploration;
mod followed;
mod location;
mod tag_affinity;
mod trending;

pub use collaborative::CollaborativeGenerator;
pub use exploration::ExplorationGenerator;
pub use followed::FollowedOrgGenerator;
pub use location::LocationGenerator;
pub use tag_affinity::TagAffinityGenerator;
pub use trending::TrendingGenerator;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::metrics;
use crate::models::{Candidate, CandidateSource, ContentRef, GeoPoint, UserProfile};

/// Read-only inputs shared by every generator for one feed request
pub struct CandidateContext {
    pub user_id: Uuid,
    pub profile: UserProfile,
    /// Content the user touched in the last 24h (freshness exclusion)
    pub recent: HashSet<ContentRef>,
    /// Everything the user has ever interacted with (bounded)
    pub seen: HashSet<ContentRef>,
    pub location: Option<GeoPoint>,
    pub now: DateTime<Utc>,
    pub limit: usize,
}

#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>>;
    fn source(&self) -> CandidateSource;
}

/// Run all generators concurrently and pool their candidates.
/// Individual failures are logged and skipped.
pub async fn run_generators(
    generators: &[Arc<dyn CandidateGenerator>],
    ctx: &CandidateContext,
) -> Vec<Candidate> {
    let futures = generators.iter().map(|g| {
        let generator = Arc::clone(g);
        async move { (generator.source(), generator.generate(ctx).await) }
    });

    let mut pooled = Vec::new();
    for (source, outcome) in join_all(futures).await {
        match outcome {
            Ok(candidates) => {
                metrics::record_candidates(source.as_str(), candidates.len());
                pooled.extend(candidates);
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Candidate generator failed, continuing without it");
            }
        }
    }
    pooled
}

/// Normalize raw scores into [0,1] relative to the best item in the list
/// so sources with very different score scales can be blended.
pub fn normalize(
    scored: Vec<(ContentRef, f64, Vec<String>)>,
    source: CandidateSource,
) -> Vec<Candidate> {
    let max = scored
        .iter()
        .map(|(_, s, _)| *s)
        .fold(f64::MIN, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    scored
        .into_iter()
        .filter(|(_, score, _)| *score > 0.0)
        .map(|(content, score, reasons)| Candidate {
            content,
            raw_score: score / max,
            reasons,
            source,
        })
        .collect()
}
