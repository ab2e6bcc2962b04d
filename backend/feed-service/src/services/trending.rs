//! Trending computation
//!
//! Sliding-window popularity scoring over the interaction log. Each
//! window's ranking is recomputed on a short schedule and swapped in as a
//! snapshot; a failed rebuild leaves the previous ranking serveable.

use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::config::EngineConfig;
use crate::db::interaction_repo::InteractionSample;
use crate::db::InteractionRepo;
use crate::error::Result;
use crate::models::{ContentRef, InteractionType, TrendingWindow};
use crate::snapshot::SnapshotStore;

/// Number of interaction type variants, for type-diversity normalization
const INTERACTION_TYPE_ARITY: f64 = 11.0;
/// Items kept per window
const MAX_ITEMS_PER_WINDOW: usize = 100;

/// Aggregated engagement stats of one content item inside a window
#[derive(Debug, Clone, Default)]
pub struct ItemStats {
    pub interactions: usize,
    pub unique_users: usize,
    pub weighted_sum: f64,
    pub distinct_types: usize,
}

/// One trending entry
#[derive(Debug, Clone)]
pub struct TrendingEntry {
    pub content: ContentRef,
    pub score: f64,
    pub interactions: usize,
    pub unique_users: usize,
}

/// One complete trending build across all windows
#[derive(Debug, Default)]
pub struct TrendingSnapshot {
    pub by_window: HashMap<TrendingWindow, Vec<TrendingEntry>>,
    pub computed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Velocity × engagement quality × participant diversity blend.
///
/// velocity            interactions per hour over the window
/// engagement quality  average interaction weight (donations trend harder
///                     than drive-by views)
/// user diversity      unique users per interaction
/// type diversity      spread across interaction kinds
pub fn trending_score(stats: &ItemStats, window_hours: i64) -> f64 {
    if stats.interactions == 0 || window_hours <= 0 {
        return 0.0;
    }
    let total = stats.interactions as f64;
    let velocity = total / window_hours as f64;
    let engagement_quality = stats.weighted_sum / total;
    let user_diversity = stats.unique_users as f64 / total;
    let type_diversity = stats.distinct_types as f64 / INTERACTION_TYPE_ARITY;

    velocity * 0.4 + engagement_quality * 0.3 + user_diversity * 0.2 + type_diversity * 0.1
}

/// Whether an item has enough signal to trend at all; tiny samples are
/// excluded no matter how good their ratios look.
pub fn is_eligible(stats: &ItemStats, min_interactions: usize, min_users: usize) -> bool {
    stats.interactions >= min_interactions && stats.unique_users >= min_users
}

/// Aggregate window samples per content item
pub fn aggregate_window(samples: &[InteractionSample]) -> HashMap<ContentRef, ItemStats> {
    let mut users: HashMap<ContentRef, HashSet<uuid::Uuid>> = HashMap::new();
    let mut types: HashMap<ContentRef, HashSet<InteractionType>> = HashMap::new();
    let mut stats: HashMap<ContentRef, ItemStats> = HashMap::new();

    for sample in samples {
        let entry = stats.entry(sample.content).or_default();
        entry.interactions += 1;
        entry.weighted_sum += sample.interaction_type.base_weight();
        users.entry(sample.content).or_default().insert(sample.user_id);
        types
            .entry(sample.content)
            .or_default()
            .insert(sample.interaction_type);
    }

    for (content, entry) in stats.iter_mut() {
        entry.unique_users = users.get(content).map(|s| s.len()).unwrap_or(0);
        entry.distinct_types = types.get(content).map(|s| s.len()).unwrap_or(0);
    }
    stats
}

/// Rank a window's aggregates into an ordered trending list
pub fn rank_window(
    aggregates: HashMap<ContentRef, ItemStats>,
    window: TrendingWindow,
    min_interactions: usize,
    min_users: usize,
) -> Vec<TrendingEntry> {
    let mut entries: Vec<TrendingEntry> = aggregates
        .into_iter()
        .filter(|(_, stats)| is_eligible(stats, min_interactions, min_users))
        .map(|(content, stats)| TrendingEntry {
            content,
            score: trending_score(&stats, window.hours()),
            interactions: stats.interactions,
            unique_users: stats.unique_users,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.content.cmp(&b.content))
    });
    entries.truncate(MAX_ITEMS_PER_WINDOW);
    entries
}

pub struct TrendingService {
    interactions: Arc<InteractionRepo>,
    store: SnapshotStore<TrendingSnapshot>,
    config: EngineConfig,
}

impl TrendingService {
    pub fn new(interactions: Arc<InteractionRepo>, config: EngineConfig) -> Self {
        Self {
            interactions,
            store: SnapshotStore::new(TrendingSnapshot::default()),
            config,
        }
    }

    /// Current trending list for a window
    pub fn top(&self, window: TrendingWindow, limit: usize) -> Vec<TrendingEntry> {
        self.store
            .current()
            .by_window
            .get(&window)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn computed_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.store.current().computed_at
    }

    /// Recompute every window from the interaction log and swap the
    /// snapshot. One query per rebuild, widest window first; narrower
    /// windows filter in memory.
    pub async fn rebuild(&self) -> Result<usize> {
        let now = Utc::now();
        let widest = TrendingWindow::SevenDays;
        let samples = self
            .interactions
            .window_samples(now - Duration::hours(widest.hours()))
            .await?;

        let mut by_window = HashMap::new();
        for window in TrendingWindow::ALL {
            let cutoff = now - Duration::hours(window.hours());
            let in_window: Vec<InteractionSample> = samples
                .iter()
                .filter(|s| s.created_at >= cutoff)
                .cloned()
                .collect();
            let entries = rank_window(
                aggregate_window(&in_window),
                window,
                self.config.trending_min_interactions,
                self.config.trending_min_users,
            );
            by_window.insert(window, entries);
        }

        let total: usize = by_window.values().map(|v| v.len()).sum();
        self.store.swap(TrendingSnapshot {
            by_window,
            computed_at: Some(now),
        });

        info!(
            samples = samples.len(),
            trending_items = total,
            "Trending snapshot rebuilt"
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use uuid::Uuid;

    fn sample(
        content: ContentRef,
        user: Uuid,
        interaction_type: InteractionType,
    ) -> InteractionSample {
        InteractionSample {
            user_id: user,
            content,
            interaction_type,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_six_interactions_four_users_clears_eligibility() {
        let content = ContentRef::new(ContentType::Fundraiser, Uuid::new_v4());
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        let samples = vec![
            sample(content, users[0], InteractionType::View),
            sample(content, users[1], InteractionType::Like),
            sample(content, users[2], InteractionType::Share),
            sample(content, users[3], InteractionType::Donate),
            sample(content, users[0], InteractionType::Comment),
            sample(content, users[1], InteractionType::Bookmark),
        ];

        let aggregates = aggregate_window(&samples);
        let stats = aggregates.get(&content).unwrap();
        assert_eq!(stats.interactions, 6);
        assert_eq!(stats.unique_users, 4);
        assert!(is_eligible(stats, 5, 3));

        let ranked = rank_window(aggregates, TrendingWindow::TwentyFourHours, 5, 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].content, content);
        assert!(ranked[0].score > 0.0);
    }

    #[test]
    fn test_tiny_samples_do_not_trend() {
        let content = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let user = Uuid::new_v4();
        // 4 interactions from one user: fails both minimums.
        let samples: Vec<InteractionSample> = (0..4)
            .map(|_| sample(content, user, InteractionType::Like))
            .collect();

        let ranked = rank_window(
            aggregate_window(&samples),
            TrendingWindow::OneHour,
            5,
            3,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_trending_score_components() {
        let stats = ItemStats {
            interactions: 24,
            unique_users: 12,
            weighted_sum: 1.2,
            distinct_types: 3,
        };
        // velocity = 1/h, quality = 0.05, user diversity = 0.5.
        let score = trending_score(&stats, 24);
        let expected = 1.0 * 0.4 + 0.05 * 0.3 + 0.5 * 0.2 + (3.0 / 11.0) * 0.1;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_trending_score_empty_stats() {
        assert_eq!(trending_score(&ItemStats::default(), 24), 0.0);
    }

    #[test]
    fn test_rank_window_orders_by_score() {
        let hot = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let warm = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let mut samples = Vec::new();
        for _ in 0..10 {
            samples.push(sample(hot, Uuid::new_v4(), InteractionType::Donate));
        }
        for _ in 0..6 {
            samples.push(sample(warm, Uuid::new_v4(), InteractionType::View));
        }

        let ranked = rank_window(
            aggregate_window(&samples),
            TrendingWindow::OneHour,
            5,
            3,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].content, hot);
    }
}
