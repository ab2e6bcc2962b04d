//! Collaborative-filtering candidate generator
//!
//! Pulls recent high-value interactions of the user's nearest neighbors
//! (by affinity-vector cosine similarity) on content the user has not
//! seen. A single enthusiastic neighbor is noise; items need at least two
//! distinct neighbors behind them.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{normalize, CandidateContext, CandidateGenerator};
use crate::config::EngineConfig;
use crate::db::interaction_repo::InteractionSample;
use crate::db::InteractionRepo;
use crate::error::Result;
use crate::models::{Candidate, CandidateSource, ContentRef, InteractionType, SimilarUser};
use crate::services::similarity::SimilarityService;

/// Only neighbor interactions inside this window count
const NEIGHBOR_LOOKBACK_DAYS: i64 = 7;
/// Distinct neighbors required before an item is emitted
const MIN_SUPPORTING_NEIGHBORS: usize = 2;

/// Interaction types strong enough to count as an endorsement
fn high_value_types() -> Vec<InteractionType> {
    [
        InteractionType::Like,
        InteractionType::Interest,
        InteractionType::Comment,
        InteractionType::Follow,
        InteractionType::Share,
        InteractionType::Bookmark,
        InteractionType::Register,
        InteractionType::Attend,
        InteractionType::Donate,
    ]
    .to_vec()
}

/// Aggregate neighbor endorsements: Σ similarity × interaction weight,
/// keeping only items backed by enough distinct neighbors.
pub fn aggregate_endorsements(
    neighbors: &[SimilarUser],
    samples: &[InteractionSample],
    seen: &HashSet<ContentRef>,
    min_supporters: usize,
) -> Vec<(ContentRef, f64, usize)> {
    let similarity: HashMap<Uuid, f64> = neighbors
        .iter()
        .map(|n| (n.user_id, n.similarity))
        .collect();

    let mut scores: HashMap<ContentRef, f64> = HashMap::new();
    let mut supporters: HashMap<ContentRef, HashSet<Uuid>> = HashMap::new();

    for sample in samples {
        if seen.contains(&sample.content) {
            continue;
        }
        let Some(sim) = similarity.get(&sample.user_id) else {
            continue;
        };
        *scores.entry(sample.content).or_insert(0.0) +=
            sim * sample.interaction_type.base_weight();
        supporters
            .entry(sample.content)
            .or_default()
            .insert(sample.user_id);
    }

    scores
        .into_iter()
        .filter_map(|(content, score)| {
            let count = supporters.get(&content).map(|s| s.len()).unwrap_or(0);
            (count >= min_supporters).then_some((content, score, count))
        })
        .collect()
}

pub struct CollaborativeGenerator {
    similarity: Arc<SimilarityService>,
    interactions: Arc<InteractionRepo>,
    config: EngineConfig,
}

impl CollaborativeGenerator {
    pub fn new(
        similarity: Arc<SimilarityService>,
        interactions: Arc<InteractionRepo>,
        config: EngineConfig,
    ) -> Self {
        Self {
            similarity,
            interactions,
            config,
        }
    }
}

#[async_trait]
impl CandidateGenerator for CollaborativeGenerator {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>> {
        let neighbors = self
            .similarity
            .find_similar_users(ctx.user_id, self.config.similarity_top_k);
        if neighbors.is_empty() {
            debug!(user_id = %ctx.user_id, "No similar users, skipping collaborative recall");
            return Ok(Vec::new());
        }

        let neighbor_ids: Vec<Uuid> = neighbors.iter().map(|n| n.user_id).collect();
        let samples = self
            .interactions
            .recent_by_users(
                &neighbor_ids,
                ctx.now - Duration::days(NEIGHBOR_LOOKBACK_DAYS),
                &high_value_types(),
            )
            .await?;

        let scored: Vec<(ContentRef, f64, Vec<String>)> =
            aggregate_endorsements(&neighbors, &samples, &ctx.seen, MIN_SUPPORTING_NEIGHBORS)
                .into_iter()
                .map(|(content, score, count)| {
                    (
                        content,
                        score,
                        vec![format!("popular with {} supporters like you", count)],
                    )
                })
                .collect();

        let mut candidates = normalize(scored, self.source());
        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.content.cmp(&b.content))
        });
        candidates.truncate(ctx.limit);
        Ok(candidates)
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Collaborative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use chrono::Utc;

    fn neighbor(user_id: Uuid, similarity: f64) -> SimilarUser {
        SimilarUser {
            user_id,
            similarity,
            shared_tag_count: 3,
        }
    }

    fn sample(content: ContentRef, user: Uuid, t: InteractionType) -> InteractionSample {
        InteractionSample {
            user_id: user,
            content,
            interaction_type: t,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_neighbor_items_filtered() {
        let n1 = Uuid::new_v4();
        let n2 = Uuid::new_v4();
        let neighbors = vec![neighbor(n1, 0.9), neighbor(n2, 0.7)];

        let lonely = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let backed = ContentRef::new(ContentType::Fundraiser, Uuid::new_v4());

        let samples = vec![
            sample(lonely, n1, InteractionType::Donate),
            sample(backed, n1, InteractionType::Like),
            sample(backed, n2, InteractionType::Share),
        ];

        let result = aggregate_endorsements(&neighbors, &samples, &HashSet::new(), 2);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, backed);
        assert_eq!(result[0].2, 2);
        // 0.9 × 0.03 + 0.7 × 0.06
        assert!((result[0].1 - (0.9 * 0.03 + 0.7 * 0.06)).abs() < 1e-9);
    }

    #[test]
    fn test_seen_content_excluded() {
        let n1 = Uuid::new_v4();
        let n2 = Uuid::new_v4();
        let neighbors = vec![neighbor(n1, 0.9), neighbor(n2, 0.7)];
        let content = ContentRef::new(ContentType::Event, Uuid::new_v4());

        let samples = vec![
            sample(content, n1, InteractionType::Like),
            sample(content, n2, InteractionType::Like),
        ];

        let seen: HashSet<ContentRef> = [content].into_iter().collect();
        assert!(aggregate_endorsements(&neighbors, &samples, &seen, 2).is_empty());
    }

    #[test]
    fn test_unknown_users_ignored() {
        let neighbors = vec![neighbor(Uuid::new_v4(), 0.9)];
        let content = ContentRef::new(ContentType::Event, Uuid::new_v4());
        // Interaction from someone outside the neighbor set.
        let samples = vec![sample(content, Uuid::new_v4(), InteractionType::Donate)];
        assert!(aggregate_endorsements(&neighbors, &samples, &HashSet::new(), 1).is_empty());
    }
}
