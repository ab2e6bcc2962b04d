//! Tag-affinity candidate generator
//!
//! The primary personalized signal: content carrying tags the user has
//! demonstrated interest in, weighted by tag relevance × decayed affinity,
//! with a boost for recently created items.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{normalize, CandidateContext, CandidateGenerator};
use crate::db::content_repo::TaggedContent;
use crate::db::ContentRepo;
use crate::error::Result;
use crate::models::{Candidate, CandidateSource, ContentRef};

/// How far back tagged content is considered at all
const CONTENT_LOOKBACK_DAYS: i64 = 30;
/// Items created inside this window get the freshness boost
const RECENCY_BOOST_DAYS: i64 = 7;
const RECENCY_BOOST: f64 = 1.2;

/// Sum tag relevance × user affinity per content item, then apply the
/// freshness boost. Exposed for tests.
pub fn score_tagged_content(
    items: &[TaggedContent],
    affinities: &HashMap<Uuid, f64>,
    now: DateTime<Utc>,
) -> Vec<(ContentRef, f64, DateTime<Utc>)> {
    let mut scores: HashMap<ContentRef, (f64, DateTime<Utc>)> = HashMap::new();
    for item in items {
        let Some(affinity) = affinities.get(&item.tag_id) else {
            continue;
        };
        let entry = scores.entry(item.content).or_insert((0.0, item.created_at));
        entry.0 += item.relevance * affinity;
    }

    scores
        .into_iter()
        .map(|(content, (score, created_at))| {
            let boosted = if now - created_at <= Duration::days(RECENCY_BOOST_DAYS) {
                score * RECENCY_BOOST
            } else {
                score
            };
            (content, boosted, created_at)
        })
        .collect()
}

pub struct TagAffinityGenerator {
    content: Arc<ContentRepo>,
}

impl TagAffinityGenerator {
    pub fn new(content: Arc<ContentRepo>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl CandidateGenerator for TagAffinityGenerator {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>> {
        if ctx.profile.is_cold_start() {
            debug!(user_id = %ctx.user_id, "Cold-start user, skipping tag-affinity recall");
            return Ok(Vec::new());
        }

        let affinities: HashMap<Uuid, f64> = ctx
            .profile
            .top_tags
            .iter()
            .map(|t| (t.tag_id, t.score))
            .collect();
        let tag_ids: Vec<Uuid> = affinities.keys().copied().collect();

        let tagged = self
            .content
            .by_tags(
                &tag_ids,
                ctx.now - Duration::days(CONTENT_LOOKBACK_DAYS),
                (ctx.limit * 5) as i64,
            )
            .await?;

        let scored: Vec<(ContentRef, f64, Vec<String>)> =
            score_tagged_content(&tagged, &affinities, ctx.now)
                .into_iter()
                .filter(|(content, _, _)| !ctx.recent.contains(content))
                .map(|(content, score, _)| {
                    (content, score, vec!["matches your interests".to_string()])
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
        CandidateSource::TagAffinity
    }
}
