//! Exploration candidate generator
//!
//! Counterweight to the filter bubble: deliberately samples recent content
//! from the tag categories the user has the least affinity for. Weighted
//! low by the ranker but always present in nonzero quantity.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{CandidateContext, CandidateGenerator};
use crate::db::ContentRepo;
use crate::error::Result;
use crate::models::{Candidate, CandidateSource, Tag};

const LOOKBACK_DAYS: i64 = 14;
/// Categories sampled per request
const CATEGORY_SAMPLE: usize = 3;

/// Categories ordered by ascending user affinity; unexplored categories
/// (zero affinity) come first. Deterministic for a fixed catalog+profile.
pub fn least_explored_categories(
    catalog: &[Tag],
    tag_affinities: &HashMap<Uuid, f64>,
    take: usize,
) -> Vec<Uuid> {
    let mut by_category: HashMap<Uuid, f64> = HashMap::new();
    for tag in catalog {
        let affinity = tag_affinities.get(&tag.id).copied().unwrap_or(0.0);
        *by_category.entry(tag.category_id).or_insert(0.0) += affinity;
    }

    let mut categories: Vec<(Uuid, f64)> = by_category.into_iter().collect();
    categories.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    categories.into_iter().take(take).map(|(id, _)| id).collect()
}

pub struct ExplorationGenerator {
    content: Arc<ContentRepo>,
}

impl ExplorationGenerator {
    pub fn new(content: Arc<ContentRepo>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl CandidateGenerator for ExplorationGenerator {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>> {
        let catalog = self.content.tag_catalog().await?;
        if catalog.is_empty() {
            return Ok(Vec::new());
        }

        let affinities: HashMap<Uuid, f64> = ctx
            .profile
            .top_tags
            .iter()
            .map(|t| (t.tag_id, t.score))
            .collect();

        let categories = least_explored_categories(&catalog, &affinities, CATEGORY_SAMPLE);
        let items = self
            .content
            .by_categories(
                &categories,
                ctx.now - Duration::days(LOOKBACK_DAYS),
                ctx.limit as i64,
            )
            .await?;

        // Newest-first from the query; dedupe items that carry several
        // tags in the sampled categories.
        let mut seen_here = std::collections::HashSet::new();
        let total = items.len().max(1) as f64;
        let candidates: Vec<Candidate> = items
            .into_iter()
            .filter(|item| !ctx.recent.contains(&item.content))
            .filter(|item| seen_here.insert(item.content))
            .enumerate()
            .map(|(idx, item)| Candidate {
                content: item.content,
                raw_score: 1.0 - idx as f64 / total,
                reasons: vec!["something outside your usual interests".to_string()],
                source: CandidateSource::Exploration,
            })
            .collect();

        Ok(candidates)
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Exploration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(category_id: Uuid, name: &str) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            category_id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_unexplored_categories_come_first() {
        let loved = Uuid::new_v4();
        let ignored = Uuid::new_v4();
        let catalog = vec![
            tag(loved, "climate"),
            tag(loved, "conservation"),
            tag(ignored, "arts"),
        ];

        let mut affinities = HashMap::new();
        affinities.insert(catalog[0].id, 0.9);
        affinities.insert(catalog[1].id, 0.7);

        let categories = least_explored_categories(&catalog, &affinities, 1);
        assert_eq!(categories, vec![ignored]);
    }

    #[test]
    fn test_deterministic_for_equal_affinity() {
        let cat_a = Uuid::new_v4();
        let cat_b = Uuid::new_v4();
        let catalog = vec![tag(cat_a, "one"), tag(cat_b, "two")];

        let first = least_explored_categories(&catalog, &HashMap::new(), 2);
        let second = least_explored_categories(&catalog, &HashMap::new(), 2);
        assert_eq!(first, second);
    }
}
