//! Content Scorer / Ranker
//!
//! Pure merge-and-score over pooled candidates. Deterministic for a fixed
//! input snapshot: repeated calls produce identical ordering, which the
//! cursor protocol depends on.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::models::{
    Candidate, CandidateSource, ContentMetadata, ContentRef, ContentType, ScoreBreakdown,
};

/// Blend weights of the final score. Sums to 1 with the defaults; an
/// experiment variant may override individual factors.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RankingWeights {
    #[serde(default = "default_relevance")]
    pub relevance: f64,
    #[serde(default = "default_diversity")]
    pub diversity: f64,
    #[serde(default = "default_trending")]
    pub trending: f64,
    #[serde(default = "default_location")]
    pub location: f64,
    #[serde(default = "default_temporal")]
    pub temporal: f64,
    #[serde(default = "default_social_proof")]
    pub social_proof: f64,
    #[serde(default = "default_quality")]
    pub quality: f64,
}

fn default_relevance() -> f64 {
    0.40
}
fn default_diversity() -> f64 {
    0.15
}
fn default_trending() -> f64 {
    0.10
}
fn default_location() -> f64 {
    0.10
}
fn default_temporal() -> f64 {
    0.10
}
fn default_social_proof() -> f64 {
    0.10
}
fn default_quality() -> f64 {
    0.05
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: default_relevance(),
            diversity: default_diversity(),
            trending: default_trending(),
            location: default_location(),
            temporal: default_temporal(),
            social_proof: default_social_proof(),
            quality: default_quality(),
        }
    }
}

/// Relative trust per candidate source when blending relevance.
/// Exploration is deliberately the weakest signal.
#[derive(Debug, Clone, Copy)]
pub struct SourceWeights {
    pub tag_affinity: f64,
    pub collaborative: f64,
    pub trending: f64,
    pub location: f64,
    pub followed_org: f64,
    pub exploration: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            tag_affinity: 1.0,
            collaborative: 0.9,
            trending: 0.8,
            location: 0.7,
            followed_org: 0.9,
            exploration: 0.3,
        }
    }
}

impl SourceWeights {
    pub fn get(&self, source: CandidateSource) -> f64 {
        match source {
            CandidateSource::TagAffinity => self.tag_affinity,
            CandidateSource::Collaborative => self.collaborative,
            CandidateSource::Trending => self.trending,
            CandidateSource::Location => self.location,
            CandidateSource::FollowedOrg => self.followed_org,
            CandidateSource::Exploration => self.exploration,
        }
    }
}

/// A candidate after merging and final scoring, carrying everything the
/// diversity filter and feed assembler need downstream.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub content: ContentRef,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
    pub sources: BTreeSet<CandidateSource>,
    pub primary_source: CandidateSource,
}

struct MergedCandidate {
    source_scores: BTreeMap<CandidateSource, f64>,
    reasons: Vec<String>,
}

/// Merge duplicate candidates across sources, keyed by content identity.
/// Per-source scores keep the maximum; reasons concatenate in source order.
fn merge_candidates(candidates: &[Candidate]) -> BTreeMap<ContentRef, MergedCandidate> {
    let mut merged: BTreeMap<ContentRef, MergedCandidate> = BTreeMap::new();
    for candidate in candidates {
        let entry = merged
            .entry(candidate.content)
            .or_insert_with(|| MergedCandidate {
                source_scores: BTreeMap::new(),
                reasons: Vec::new(),
            });
        let slot = entry.source_scores.entry(candidate.source).or_insert(0.0);
        *slot = slot.max(candidate.raw_score);
        for reason in &candidate.reasons {
            if !entry.reasons.contains(reason) {
                entry.reasons.push(reason.clone());
            }
        }
    }
    merged
}

/// Boost for events starting soon: strongest in the 24–72h band where a
/// nudge can still convert into attendance.
fn temporal_score(starts_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(starts) = starts_at else {
        return 0.0;
    };
    if starts <= now {
        return 0.0;
    }
    let lead = starts - now;
    if lead <= Duration::hours(24) {
        0.5
    } else if lead <= Duration::hours(72) {
        1.0
    } else {
        0.0
    }
}

/// Share-based diversity: content types the user consumed heavily in the
/// immediate context score lower, unseen types score full.
fn diversity_score(content_type: ContentType, recent_type_shares: &HashMap<ContentType, f64>) -> f64 {
    1.0 - recent_type_shares.get(&content_type).copied().unwrap_or(0.0)
}

/// Rank pooled candidates into a deterministic ordering.
///
/// Candidates without metadata (upstream lookup failed or content
/// unpublished meanwhile) are dropped, never fatal. Ties break by most
/// recent creation, then lexicographic id.
pub fn rank(
    candidates: &[Candidate],
    metadata: &HashMap<ContentRef, ContentMetadata>,
    recent_type_shares: &HashMap<ContentType, f64>,
    weights: &RankingWeights,
    source_weights: &SourceWeights,
    now: DateTime<Utc>,
) -> Vec<RankedCandidate> {
    let merged = merge_candidates(candidates);

    let mut ranked: Vec<RankedCandidate> = merged
        .into_iter()
        .filter_map(|(content, entry)| {
            let meta = metadata.get(&content)?;
            if !meta.status.is_eligible() {
                return None;
            }

            let relevance: f64 = entry
                .source_scores
                .iter()
                .map(|(source, raw)| raw * source_weights.get(*source))
                .sum::<f64>()
                .min(1.0);

            let breakdown = ScoreBreakdown {
                relevance,
                diversity: diversity_score(content.content_type, recent_type_shares),
                trending: entry
                    .source_scores
                    .get(&CandidateSource::Trending)
                    .copied()
                    .unwrap_or(0.0),
                location: entry
                    .source_scores
                    .get(&CandidateSource::Location)
                    .copied()
                    .unwrap_or(0.0),
                temporal: temporal_score(meta.starts_at, now),
                social_proof: if entry.source_scores.contains_key(&CandidateSource::Collaborative) {
                    1.0
                } else {
                    0.0
                },
                quality: meta.quality_score(),
            };

            let score = breakdown.relevance * weights.relevance
                + breakdown.diversity * weights.diversity
                + breakdown.trending * weights.trending
                + breakdown.location * weights.location
                + breakdown.temporal * weights.temporal
                + breakdown.social_proof * weights.social_proof
                + breakdown.quality * weights.quality;

            let primary_source = entry
                .source_scores
                .iter()
                .max_by(|(sa, ra), (sb, rb)| {
                    let wa = *ra * source_weights.get(**sa);
                    let wb = *rb * source_weights.get(**sb);
                    wa.partial_cmp(&wb)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| sb.cmp(sa))
                })
                .map(|(source, _)| *source)?;

            Some(RankedCandidate {
                content,
                organization_id: meta.organization_id,
                created_at: meta.created_at,
                score,
                breakdown,
                reasons: entry.reasons,
                sources: entry.source_scores.keys().copied().collect(),
                primary_source,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.content.content_id.cmp(&b.content.content_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentStatus;

    fn meta(content: ContentRef, created_at: DateTime<Utc>) -> ContentMetadata {
        ContentMetadata {
            content,
            organization_id: Some(Uuid::new_v4()),
            status: ContentStatus::Published,
            created_at,
            starts_at: None,
            location: None,
            title: Some("title".into()),
            summary: None,
            image_url: None,
        }
    }

    fn candidate(content: ContentRef, raw: f64, source: CandidateSource) -> Candidate {
        Candidate {
            content,
            raw_score: raw,
            reasons: vec![format!("reason-{}", source)],
            source,
        }
    }

    #[test]
    fn test_rank_is_deterministic() {
        let now = Utc::now();
        let mut candidates = Vec::new();
        let mut metadata = HashMap::new();
        for i in 0..20 {
            let content = ContentRef::new(ContentType::Event, Uuid::new_v4());
            metadata.insert(content, meta(content, now - Duration::hours(i)));
            candidates.push(candidate(content, 0.5, CandidateSource::Trending));
            if i % 2 == 0 {
                candidates.push(candidate(content, 0.8, CandidateSource::TagAffinity));
            }
        }

        let weights = RankingWeights::default();
        let sources = SourceWeights::default();
        let shares = HashMap::new();

        let first = rank(&candidates, &metadata, &shares, &weights, &sources, now);
        // Shuffle deterministically by reversing; order must not change.
        let reversed: Vec<Candidate> = candidates.into_iter().rev().collect();
        let second = rank(&reversed, &metadata, &shares, &weights, &sources, now);

        let ids_a: Vec<ContentRef> = first.iter().map(|r| r.content).collect();
        let ids_b: Vec<ContentRef> = second.iter().map(|r| r.content).collect();
        assert_eq!(ids_a, ids_b);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_duplicates_merge_and_outrank() {
        let now = Utc::now();
        let created = now - Duration::days(1);

        let single = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let multi = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let mut metadata = HashMap::new();
        metadata.insert(single, meta(single, created));
        metadata.insert(multi, meta(multi, created));

        let candidates = vec![
            candidate(single, 0.9, CandidateSource::TagAffinity),
            candidate(multi, 0.9, CandidateSource::TagAffinity),
            candidate(multi, 0.9, CandidateSource::Collaborative),
        ];

        let ranked = rank(
            &candidates,
            &metadata,
            &HashMap::new(),
            &RankingWeights::default(),
            &SourceWeights::default(),
            now,
        );

        assert_eq!(ranked[0].content, multi);
        assert_eq!(ranked[0].sources.len(), 2);
        assert_eq!(ranked[0].reasons.len(), 2);
        // Collaborative presence sets the social-proof factor.
        assert_eq!(ranked[0].breakdown.social_proof, 1.0);
        assert_eq!(ranked[1].breakdown.social_proof, 0.0);
    }

    #[test]
    fn test_tie_breaks_by_recency_then_id() {
        let now = Utc::now();
        let older = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let newer = ContentRef::new(ContentType::Event, Uuid::new_v4());

        let mut metadata = HashMap::new();
        metadata.insert(older, meta(older, now - Duration::days(5)));
        metadata.insert(newer, meta(newer, now - Duration::days(1)));

        let candidates = vec![
            candidate(older, 0.7, CandidateSource::Trending),
            candidate(newer, 0.7, CandidateSource::Trending),
        ];

        let ranked = rank(
            &candidates,
            &metadata,
            &HashMap::new(),
            &RankingWeights::default(),
            &SourceWeights::default(),
            now,
        );
        assert_eq!(ranked[0].content, newer);
    }

    #[test]
    fn test_missing_metadata_dropped() {
        let now = Utc::now();
        let known = ContentRef::new(ContentType::Event, Uuid::new_v4());
        let unknown = ContentRef::new(ContentType::Event, Uuid::new_v4());

        let mut metadata = HashMap::new();
        metadata.insert(known, meta(known, now));

        let candidates = vec![
            candidate(known, 0.5, CandidateSource::Trending),
            candidate(unknown, 0.9, CandidateSource::Trending),
        ];

        let ranked = rank(
            &candidates,
            &metadata,
            &HashMap::new(),
            &RankingWeights::default(),
            &SourceWeights::default(),
            now,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].content, known);
    }

    #[test]
    fn test_unpublished_content_dropped() {
        let now = Utc::now();
        let content = ContentRef::new(ContentType::Fundraiser, Uuid::new_v4());
        let mut m = meta(content, now);
        m.status = ContentStatus::Draft;
        let metadata: HashMap<ContentRef, ContentMetadata> = [(content, m)].into_iter().collect();

        let ranked = rank(
            &[candidate(content, 0.9, CandidateSource::TagAffinity)],
            &metadata,
            &HashMap::new(),
            &RankingWeights::default(),
            &SourceWeights::default(),
            now,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_temporal_boost_for_upcoming_events() {
        let now = Utc::now();
        assert_eq!(temporal_score(None, now), 0.0);
        assert_eq!(temporal_score(Some(now - Duration::hours(1)), now), 0.0);
        assert_eq!(temporal_score(Some(now + Duration::hours(12)), now), 0.5);
        assert_eq!(temporal_score(Some(now + Duration::hours(48)), now), 1.0);
        assert_eq!(temporal_score(Some(now + Duration::days(10)), now), 0.0);
    }

    #[test]
    fn test_diversity_penalizes_overexposed_type() {
        let mut shares = HashMap::new();
        shares.insert(ContentType::Event, 0.8);
        assert!((diversity_score(ContentType::Event, &shares) - 0.2).abs() < 1e-9);
        assert_eq!(diversity_score(ContentType::Fundraiser, &shares), 1.0);
    }
}
