//! Affinity & Profile Builder
//!
//! Converts raw interaction events into per-tag interest scores and
//! aggregates them into cacheable user profiles. Scores decay lazily at
//! read time; nothing sweeps the table in the background.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::FeedCache;
use crate::config::EngineConfig;
use crate::db::{AffinityRepo, ContentRepo, InteractionRepo};
use crate::error::Result;
use crate::models::{
    AffinityTrend, ContentType, ContentTypePreference, EngagementPattern, InteractionType,
    TagAffinity, TagInterest, UserInteraction, UserProfile,
};

/// Days of history considered the baseline for trend classification
const TREND_BASELINE_DAYS: f64 = 90.0;
/// Days in the recent trend sample
const TREND_RECENT_DAYS: f64 = 14.0;
/// Below this many total interactions a tag's trend is just "stable"
const TREND_MIN_INTERACTIONS: i64 = 5;

/// Time-spent bonus: scales linearly up to the cap at ten minutes.
/// Keeps an idle tab from inflating affinity indefinitely.
pub fn time_bonus(time_spent_secs: Option<u32>, max_bonus: f64) -> f64 {
    match time_spent_secs {
        Some(secs) => (secs as f64 / 600.0 * max_bonus).min(max_bonus),
        None => 0.0,
    }
}

/// Exponential decay of a stored score after `elapsed` since the last
/// qualifying interaction. λ is the weekly decay rate.
pub fn decayed_score(stored: f64, elapsed: Duration, decay_per_week: f64) -> f64 {
    let weeks = elapsed.num_seconds().max(0) as f64 / (7.0 * 86400.0);
    stored * (-decay_per_week * weeks).exp()
}

/// Classify an interest trend by comparing the recent interaction rate
/// against the long-run average rate. Display-only; never feeds ranking.
pub fn classify_trend(recent_count: i64, total_count: i64) -> AffinityTrend {
    if total_count < TREND_MIN_INTERACTIONS {
        return AffinityTrend::Stable;
    }
    let recent_rate = recent_count as f64 / TREND_RECENT_DAYS;
    let baseline_rate = total_count as f64 / TREND_BASELINE_DAYS;
    if baseline_rate <= 0.0 {
        return AffinityTrend::Stable;
    }
    let ratio = recent_rate / baseline_rate;
    if ratio > 1.25 {
        AffinityTrend::Increasing
    } else if ratio < 0.75 {
        AffinityTrend::Decreasing
    } else {
        AffinityTrend::Stable
    }
}

/// Normalized share of weighted interactions per content type
pub fn preference_shares(
    counts: &[(ContentType, InteractionType, i64)],
) -> Vec<ContentTypePreference> {
    let mut weighted: HashMap<ContentType, f64> = HashMap::new();
    for (content_type, interaction_type, n) in counts {
        *weighted.entry(*content_type).or_insert(0.0) +=
            interaction_type.base_weight() * *n as f64;
    }

    let total: f64 = weighted.values().sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut shares: Vec<ContentTypePreference> = weighted
        .into_iter()
        .map(|(content_type, w)| ContentTypePreference {
            content_type,
            share: w / total,
        })
        .collect();
    shares.sort_by(|a, b| {
        b.share
            .partial_cmp(&a.share)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.content_type.cmp(&b.content_type))
    });
    shares
}

/// Top activity buckets from an (hour, weekday, count) histogram
pub fn peak_buckets(buckets: &[crate::db::interaction_repo::ActivityBucket]) -> (Vec<u8>, Vec<u8>) {
    let mut by_hour: HashMap<u8, i64> = HashMap::new();
    let mut by_day: HashMap<u8, i64> = HashMap::new();
    for b in buckets {
        *by_hour.entry(b.hour).or_insert(0) += b.count;
        *by_day.entry(b.weekday).or_insert(0) += b.count;
    }

    let mut hours: Vec<(u8, i64)> = by_hour.into_iter().collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let mut days: Vec<(u8, i64)> = by_day.into_iter().collect();
    days.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    (
        hours.into_iter().take(3).map(|(h, _)| h).collect(),
        days.into_iter().take(2).map(|(d, _)| d).collect(),
    )
}

pub struct AffinityService {
    affinities: Arc<AffinityRepo>,
    interactions: Arc<InteractionRepo>,
    content: Arc<ContentRepo>,
    cache: FeedCache,
    config: EngineConfig,
}

impl AffinityService {
    pub fn new(
        affinities: Arc<AffinityRepo>,
        interactions: Arc<InteractionRepo>,
        content: Arc<ContentRepo>,
        cache: FeedCache,
        config: EngineConfig,
    ) -> Self {
        Self {
            affinities,
            interactions,
            content,
            cache,
            config,
        }
    }

    /// Apply one interaction to the user's tag affinities.
    ///
    /// A missing or failed content-tag lookup skips the event (logged);
    /// it must never poison the ingestion worker.
    pub async fn apply_interaction(&self, interaction: &UserInteraction) -> Result<()> {
        let tags = match self.content.tags_for(&interaction.content).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(
                    content = %interaction.content,
                    error = %e,
                    "Content tag lookup failed, skipping affinity update"
                );
                return Ok(());
            }
        };

        if tags.is_empty() {
            debug!(content = %interaction.content, "No tags on content, nothing to update");
            return Ok(());
        }

        let base = interaction.interaction_type.base_weight();
        let bonus = time_bonus(interaction.time_spent_secs, self.config.max_time_bonus);

        for tag in &tags {
            let boost = base * tag.relevance + bonus;
            self.affinities
                .apply_boost(
                    interaction.user_id,
                    tag.tag_id,
                    boost,
                    interaction.created_at,
                )
                .await?;
        }

        debug!(
            user_id = %interaction.user_id,
            content = %interaction.content,
            tags = tags.len(),
            "Applied affinity boosts"
        );
        Ok(())
    }

    /// Decayed score of a stored affinity row as of `now`
    pub fn effective_score(&self, affinity: &TagAffinity, now: DateTime<Utc>) -> f64 {
        decayed_score(
            affinity.score,
            now - affinity.last_interaction_at,
            self.config.decay_per_week,
        )
    }

    /// Cached profile if fresh, otherwise a full rebuild.
    /// Cold-start users get an empty profile; callers fall back to
    /// non-personalized generators.
    pub async fn get_profile(&self, user_id: Uuid, force_refresh: bool) -> Result<UserProfile> {
        if !force_refresh {
            match self.cache.get_profile(user_id).await {
                Ok(Some(profile)) => return Ok(profile),
                Ok(None) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "Profile cache read failed"),
            }
        }

        let profile = self.build_profile(user_id).await?;

        if let Err(e) = self.cache.set_profile(&profile).await {
            warn!(user_id = %user_id, error = %e, "Profile cache write failed");
        }
        Ok(profile)
    }

    pub async fn invalidate_profile(&self, user_id: Uuid) -> Result<()> {
        self.cache.invalidate_profile(user_id).await
    }

    async fn build_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        let now = Utc::now();
        let rows = self.affinities.for_user(user_id).await?;

        if rows.is_empty() {
            debug!(user_id = %user_id, "No affinities, returning cold-start profile");
            return Ok(UserProfile::empty(user_id, now));
        }

        let recent_counts = self
            .interactions
            .recent_tag_counts(user_id, now - Duration::days(TREND_RECENT_DAYS as i64))
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %user_id, error = %e, "Recent tag counts unavailable");
                HashMap::new()
            });

        let mut top_tags: Vec<TagInterest> = rows
            .iter()
            .filter_map(|row| {
                let score = self.effective_score(row, now);
                if score < self.config.min_affinity {
                    return None;
                }
                let recent = recent_counts.get(&row.tag_id).copied().unwrap_or(0);
                Some(TagInterest {
                    tag_id: row.tag_id,
                    score,
                    interaction_count: row.interaction_count,
                    last_interaction_at: row.last_interaction_at,
                    trend: classify_trend(recent, row.interaction_count),
                })
            })
            .collect();

        top_tags.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.tag_id.cmp(&b.tag_id))
        });
        top_tags.truncate(self.config.profile_top_tags);

        let counts = self.interactions.type_counts(user_id).await?;
        let buckets = self.interactions.activity_histogram(user_id).await?;
        let avg_session_secs = self.interactions.avg_session_secs(user_id).await?;
        let total_interactions: i64 = counts.iter().map(|(_, _, n)| n).sum();
        let (peak_hours, peak_days) = peak_buckets(&buckets);

        Ok(UserProfile {
            user_id,
            top_tags,
            content_type_preferences: preference_shares(&counts),
            engagement: EngagementPattern {
                peak_hours,
                peak_days,
                avg_session_secs,
                total_interactions,
            },
            built_at: now,
        })
    }
}
