//! Trending candidate generator
//!
//! Thin adapter over the trending snapshot; the heavy lifting happens in
//! the background rebuild job.

use async_trait::async_trait;
use std::sync::Arc;

use super::{normalize, CandidateContext, CandidateGenerator};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{Candidate, CandidateSource, ContentRef, TrendingWindow};
use crate::services::trending::TrendingService;

pub struct TrendingGenerator {
    trending: Arc<TrendingService>,
    window: TrendingWindow,
}

impl TrendingGenerator {
    pub fn new(trending: Arc<TrendingService>, config: &EngineConfig) -> Self {
        let window = TrendingWindow::parse(&config.trending_feed_window)
            .unwrap_or(TrendingWindow::TwentyFourHours);
        Self { trending, window }
    }
}

#[async_trait]
impl CandidateGenerator for TrendingGenerator {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>> {
        let entries = self
            .trending
            .top(self.window, ctx.limit);

        let scored: Vec<(ContentRef, f64, Vec<String>)> = entries
            .into_iter()
            .filter(|e| !ctx.recent.contains(&e.content))
            .map(|e| {
                (
                    e.content,
                    e.score,
                    vec![format!(
                        "trending: {} people engaged recently",
                        e.unique_users
                    )],
                )
            })
            .collect();

        Ok(normalize(scored, self.source()))
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Trending
    }
}
