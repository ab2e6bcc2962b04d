//! Feed Assembler
//!
//! Fans the candidate generators out in parallel, ranks and filters the
//! pool, and serves paginated slices out of a per-user cached generation.
//! Cursors are only valid within the generation they were minted against;
//! a replaced or expired generation surfaces as `CursorExpired` and the
//! caller restarts from the top.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CachedFeed, FeedCache};
use crate::config::EngineConfig;
use crate::db::{ContentRepo, InteractionRepo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{ContentRef, ContentType, FeedItem, GeoPoint, UserProfile};
use crate::services::affinity::AffinityService;
use crate::services::candidates::{run_generators, CandidateContext, CandidateGenerator};
use crate::services::diversity::{self, DiversityCaps};
use crate::services::experiments::ExperimentEngine;
use crate::services::ranking::{rank, RankingWeights, SourceWeights};

/// How many of the user's seen items are loaded for exclusion
const SEEN_FETCH_LIMIT: i64 = 500;
const MAX_PAGE_LIMIT: usize = 50;

/// One feed request
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub content_types: Option<Vec<ContentType>>,
    pub limit: usize,
    pub cursor: Option<String>,
    pub location: Option<GeoPoint>,
}

/// Response metadata for debugging and explainability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPageMetadata {
    pub generation: Uuid,
    pub built_at: DateTime<Utc>,
    pub cold_start: bool,
    pub experiments: Vec<String>,
}

/// One page of an assembled feed
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
    pub metadata: FeedPageMetadata,
}

/// Cursor format: base64("generation:offset")
pub fn encode_cursor(generation: Uuid, offset: usize) -> String {
    general_purpose::STANDARD.encode(format!("{}:{}", generation, offset))
}

pub fn decode_cursor(cursor: &str) -> Result<(Uuid, usize)> {
    let decoded = general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| AppError::BadRequest("Invalid cursor format".to_string()))?;
    let cursor_str = String::from_utf8(decoded)
        .map_err(|_| AppError::BadRequest("Invalid cursor encoding".to_string()))?;

    let (generation_str, offset_str) = cursor_str
        .split_once(':')
        .ok_or_else(|| AppError::BadRequest("Invalid cursor value".to_string()))?;
    let generation = Uuid::parse_str(generation_str)
        .map_err(|_| AppError::BadRequest("Invalid cursor generation".to_string()))?;
    let offset = offset_str
        .parse::<usize>()
        .map_err(|_| AppError::BadRequest("Invalid cursor offset".to_string()))?;
    Ok((generation, offset))
}

pub struct FeedService {
    affinity: Arc<AffinityService>,
    interactions: Arc<InteractionRepo>,
    content: Arc<ContentRepo>,
    generators: Vec<Arc<dyn CandidateGenerator>>,
    experiments: Arc<ExperimentEngine>,
    cache: FeedCache,
    config: EngineConfig,
    /// Per-user build locks so concurrent misses coalesce into one rebuild
    inflight: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl FeedService {
    pub fn new(
        affinity: Arc<AffinityService>,
        interactions: Arc<InteractionRepo>,
        content: Arc<ContentRepo>,
        generators: Vec<Arc<dyn CandidateGenerator>>,
        experiments: Arc<ExperimentEngine>,
        cache: FeedCache,
        config: EngineConfig,
    ) -> Self {
        Self {
            affinity,
            interactions,
            content,
            generators,
            experiments,
            cache,
            config,
            inflight: DashMap::new(),
        }
    }

    /// Serve one feed page, building a fresh generation on cache miss
    pub async fn generate_feed(&self, user_id: Uuid, query: &FeedQuery) -> Result<FeedPage> {
        let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);

        if let Some(cursor) = query.cursor.as_deref() {
            let (generation, offset) = decode_cursor(cursor)?;
            return match self.cached_feed(user_id).await {
                Some(feed) if feed.generation == generation => {
                    metrics::record_feed_request("hit");
                    Ok(page_from(&feed, offset, limit, query.content_types.as_deref()))
                }
                _ => {
                    metrics::record_feed_request("expired_cursor");
                    Err(AppError::CursorExpired)
                }
            };
        }

        if let Some(feed) = self.cached_feed(user_id).await {
            metrics::record_feed_request("hit");
            return Ok(page_from(&feed, 0, limit, query.content_types.as_deref()));
        }

        metrics::record_feed_request("miss");
        let lock = self
            .inflight
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another request may have finished the build while we waited.
        let feed = match self.cached_feed(user_id).await {
            Some(feed) => feed,
            None => {
                let feed = self.build_feed(user_id, query.location).await?;
                if let Err(e) = self.cache.set_feed(user_id, &feed).await {
                    warn!(user_id = %user_id, error = %e, "Feed cache write failed");
                }
                feed
            }
        };
        self.inflight.remove(&user_id);

        Ok(page_from(&feed, 0, limit, query.content_types.as_deref()))
    }

    /// Cache read that treats a Redis failure as a miss
    async fn cached_feed(&self, user_id: Uuid) -> Option<CachedFeed> {
        match self.cache.get_feed(user_id).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Feed cache read failed, treating as miss");
                None
            }
        }
    }

    /// Full pipeline: profile → generators → rank → diversity filter
    async fn build_feed(&self, user_id: Uuid, location: Option<GeoPoint>) -> Result<CachedFeed> {
        let started = Instant::now();
        let now = Utc::now();

        // Degrade to a cold-start profile rather than failing the feed.
        let profile = match self.affinity.get_profile(user_id, false).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile unavailable, using cold-start fallback");
                UserProfile::empty(user_id, now)
            }
        };
        let cold_start = profile.is_cold_start();

        let recent: HashSet<ContentRef> = match self
            .interactions
            .recent_content(user_id, now - Duration::hours(24))
            .await
        {
            Ok(refs) => refs.into_iter().collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Recent interactions unavailable");
                HashSet::new()
            }
        };

        let seen: HashSet<ContentRef> = match self
            .interactions
            .seen_content(user_id, SEEN_FETCH_LIMIT)
            .await
        {
            Ok(refs) => refs.into_iter().collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Seen set unavailable");
                HashSet::new()
            }
        };

        let recent_type_shares = type_shares(&recent);

        let ctx = CandidateContext {
            user_id,
            profile,
            recent,
            seen,
            location,
            now,
            limit: self.config.candidates_per_source,
        };
        let pooled = run_generators(&self.generators, &ctx).await;

        let refs: Vec<ContentRef> = {
            let unique: HashSet<ContentRef> = pooled.iter().map(|c| c.content).collect();
            unique.into_iter().collect()
        };
        let metadata = self.content.metadata_batch(&refs).await?;

        let (weights, caps, experiments) = self
            .experiments
            .overrides_for(
                user_id,
                RankingWeights::default(),
                DiversityCaps {
                    organization_cap: self.config.organization_cap,
                },
            )
            .await;

        let ranked = rank(
            &pooled,
            &metadata,
            &recent_type_shares,
            &weights,
            &SourceWeights::default(),
            now,
        );
        let filtered = diversity::apply(&ranked, self.config.feed_size, caps);

        let items: Vec<FeedItem> = filtered
            .into_iter()
            .enumerate()
            .map(|(position, r)| FeedItem {
                content_type: r.content.content_type,
                content_id: r.content.content_id,
                score: r.score,
                score_breakdown: r.breakdown,
                reasons: r.reasons,
                position,
            })
            .collect();

        metrics::record_feed_build(started.elapsed());
        info!(
            user_id = %user_id,
            items = items.len(),
            candidates = pooled.len(),
            cold_start,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Feed generation complete"
        );

        Ok(CachedFeed {
            generation: Uuid::new_v4(),
            items,
            cold_start,
            experiments,
            built_at: now,
        })
    }

    /// Invalidate caches after a significant interaction and rebuild the
    /// feed in the background so the next request is warm.
    pub async fn on_significant_interaction(self: Arc<Self>, user_id: Uuid) {
        if let Err(e) = self.cache.invalidate_feed(user_id).await {
            warn!(user_id = %user_id, error = %e, "Feed invalidation failed");
        }
        if let Err(e) = self.affinity.invalidate_profile(user_id).await {
            warn!(user_id = %user_id, error = %e, "Profile invalidation failed");
        }

        let service = Arc::clone(&self);
        tokio::spawn(async move {
            match service.build_feed(user_id, None).await {
                Ok(feed) => {
                    if let Err(e) = service.cache.set_feed(user_id, &feed).await {
                        warn!(user_id = %user_id, error = %e, "Feed recompute cache write failed");
                    } else {
                        debug!(user_id = %user_id, "Feed proactively recomputed");
                    }
                }
                Err(e) => warn!(user_id = %user_id, error = %e, "Proactive feed recompute failed"),
            }
        });
    }
}

/// Slice a cached generation into one page. The optional content-type
/// filter applies before offsets so cursors stay stable for a fixed
/// filter set.
fn page_from(
    feed: &CachedFeed,
    offset: usize,
    limit: usize,
    content_types: Option<&[ContentType]>,
) -> FeedPage {
    let filtered: Vec<&FeedItem> = feed
        .items
        .iter()
        .filter(|item| {
            content_types
                .map(|types| types.contains(&item.content_type))
                .unwrap_or(true)
        })
        .collect();

    let end = (offset + limit).min(filtered.len());
    let items: Vec<FeedItem> = if offset < filtered.len() {
        filtered[offset..end]
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let mut item = (*item).clone();
                item.position = offset + idx;
                item
            })
            .collect()
    } else {
        Vec::new()
    };

    let next_cursor = (end < filtered.len()).then(|| encode_cursor(feed.generation, end));

    FeedPage {
        items,
        next_cursor,
        metadata: FeedPageMetadata {
            generation: feed.generation,
            built_at: feed.built_at,
            cold_start: feed.cold_start,
            experiments: feed.experiments.clone(),
        },
    }
}

/// Share of each content type among a set of recently-touched items
fn type_shares(recent: &HashSet<ContentRef>) -> HashMap<ContentType, f64> {
    if recent.is_empty() {
        return HashMap::new();
    }
    let mut counts: HashMap<ContentType, usize> = HashMap::new();
    for r in recent {
        *counts.entry(r.content_type).or_insert(0) += 1;
    }
    let total = recent.len() as f64;
    counts
        .into_iter()
        .map(|(t, n)| (t, n as f64 / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreBreakdown;

    fn feed_with_items(n: usize) -> CachedFeed {
        CachedFeed {
            generation: Uuid::new_v4(),
            items: (0..n)
                .map(|i| FeedItem {
                    content_type: if i % 2 == 0 {
                        ContentType::Event
                    } else {
                        ContentType::Fundraiser
                    },
                    content_id: Uuid::new_v4(),
                    score: 1.0 - i as f64 * 0.01,
                    score_breakdown: ScoreBreakdown::default(),
                    reasons: Vec::new(),
                    position: i,
                })
                .collect(),
            cold_start: false,
            experiments: Vec::new(),
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_cursor_roundtrip() {
        let generation = Uuid::new_v4();
        let encoded = encode_cursor(generation, 42);
        let (decoded_generation, offset) = decode_cursor(&encoded).unwrap();
        assert_eq!(decoded_generation, generation);
        assert_eq!(offset, 42);
    }

    #[test]
    fn test_cursor_garbage_rejected() {
        assert!(matches!(
            decode_cursor("not-base64!!!"),
            Err(AppError::BadRequest(_))
        ));
        let no_separator = general_purpose::STANDARD.encode("justonefield");
        assert!(matches!(
            decode_cursor(&no_separator),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_page_slicing_and_next_cursor() {
        let feed = feed_with_items(30);
        let first = page_from(&feed, 0, 10, None);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].position, 0);
        let cursor = first.next_cursor.expect("more pages expected");

        let (generation, offset) = decode_cursor(&cursor).unwrap();
        assert_eq!(generation, feed.generation);
        assert_eq!(offset, 10);

        let second = page_from(&feed, offset, 10, None);
        assert_eq!(second.items[0].position, 10);

        let last = page_from(&feed, 20, 10, None);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn test_page_beyond_end_is_empty() {
        let feed = feed_with_items(5);
        let page = page_from(&feed, 50, 10, None);
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_content_type_filter_applies_before_offset() {
        let feed = feed_with_items(20);
        let events_only = page_from(&feed, 0, 5, Some(&[ContentType::Event]));
        assert_eq!(events_only.items.len(), 5);
        assert!(events_only
            .items
            .iter()
            .all(|i| i.content_type == ContentType::Event));
    }

    #[test]
    fn test_type_shares_sum_to_one() {
        let mut recent = HashSet::new();
        for _ in 0..3 {
            recent.insert(ContentRef::new(ContentType::Event, Uuid::new_v4()));
        }
        recent.insert(ContentRef::new(ContentType::Fundraiser, Uuid::new_v4()));

        let shares = type_shares(&recent);
        let total: f64 = shares.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((shares[&ContentType::Event] - 0.75).abs() < 1e-9);
    }
}
