//! Followed-organization candidate generator
//!
//! Unseen recent content from organizations the user explicitly follows.
//! An explicit follow is the strongest declared preference we have, so
//! every item recalls at full score and only recency orders them.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use super::{CandidateContext, CandidateGenerator};
use crate::config::EngineConfig;
use crate::db::{ContentRepo, FollowRepo};
use crate::error::Result;
use crate::models::{Candidate, CandidateSource};

pub struct FollowedOrgGenerator {
    follows: Arc<FollowRepo>,
    content: Arc<ContentRepo>,
    config: EngineConfig,
}

impl FollowedOrgGenerator {
    pub fn new(follows: Arc<FollowRepo>, content: Arc<ContentRepo>, config: EngineConfig) -> Self {
        Self {
            follows,
            content,
            config,
        }
    }
}

#[async_trait]
impl CandidateGenerator for FollowedOrgGenerator {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>> {
        let orgs = self.follows.followed_organizations(ctx.user_id).await?;
        if orgs.is_empty() {
            debug!(user_id = %ctx.user_id, "User follows no organizations");
            return Ok(Vec::new());
        }

        let items = self
            .content
            .by_organizations(
                &orgs,
                ctx.now - Duration::days(self.config.followed_recency_days),
                ctx.limit as i64,
            )
            .await?;

        // Already ordered newest-first by the query; rank within the
        // source purely by recency.
        let total = items.len().max(1) as f64;
        let candidates: Vec<Candidate> = items
            .into_iter()
            .filter(|item| !ctx.seen.contains(&item.content))
            .enumerate()
            .map(|(idx, item)| Candidate {
                content: item.content,
                raw_score: 1.0 - idx as f64 / total,
                reasons: vec!["from an organization you follow".to_string()],
                source: CandidateSource::FollowedOrg,
            })
            .collect();

        Ok(candidates)
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::FollowedOrg
    }
}
