//! Diversity filter
//!
//! Greedy cap enforcement over the already-ranked list: no content type
//! may exceed ⌈N/3⌉ of the emitted set, no single generator more than
//! ⌈N/5⌉ (attributed by primary source), and no organization more than a
//! fixed cap. Items violating a cap are skipped, not reordered; the pass
//! stops when the target is filled or candidates run out.

use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{CandidateSource, ContentType};
use crate::services::ranking::RankedCandidate;

/// Caps applied to one emitted feed
#[derive(Debug, Clone, Copy)]
pub struct DiversityCaps {
    pub organization_cap: usize,
}

impl Default for DiversityCaps {
    fn default() -> Self {
        Self { organization_cap: 2 }
    }
}

fn ceil_div(n: usize, d: usize) -> usize {
    n.div_ceil(d)
}

/// Apply caps greedily over a sorted candidate list
pub fn apply(
    ranked: &[RankedCandidate],
    target: usize,
    caps: DiversityCaps,
) -> Vec<RankedCandidate> {
    if target == 0 {
        return Vec::new();
    }
    let type_cap = ceil_div(target, 3);
    let source_cap = ceil_div(target, 5);

    let mut by_type: HashMap<ContentType, usize> = HashMap::new();
    let mut by_source: HashMap<CandidateSource, usize> = HashMap::new();
    let mut by_org: HashMap<Uuid, usize> = HashMap::new();

    let mut emitted = Vec::with_capacity(target);
    for candidate in ranked {
        if emitted.len() >= target {
            break;
        }

        let type_count = by_type
            .get(&candidate.content.content_type)
            .copied()
            .unwrap_or(0);
        if type_count >= type_cap {
            continue;
        }

        let source_count = by_source
            .get(&candidate.primary_source)
            .copied()
            .unwrap_or(0);
        if source_count >= source_cap {
            continue;
        }

        if let Some(org) = candidate.organization_id {
            if by_org.get(&org).copied().unwrap_or(0) >= caps.organization_cap {
                continue;
            }
        }

        *by_type.entry(candidate.content.content_type).or_insert(0) += 1;
        *by_source.entry(candidate.primary_source).or_insert(0) += 1;
        if let Some(org) = candidate.organization_id {
            *by_org.entry(org).or_insert(0) += 1;
        }
        emitted.push(candidate.clone());
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentRef, ScoreBreakdown};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn ranked(
        content_type: ContentType,
        org: Option<Uuid>,
        source: CandidateSource,
        score: f64,
    ) -> RankedCandidate {
        RankedCandidate {
            content: ContentRef::new(content_type, Uuid::new_v4()),
            organization_id: org,
            created_at: Utc::now(),
            score,
            breakdown: ScoreBreakdown::default(),
            reasons: Vec::new(),
            sources: BTreeSet::from([source]),
            primary_source: source,
        }
    }

    #[test]
    fn test_type_cap_enforced() {
        // 12 events then 12 fundraisers, all from distinct orgs/sources mixed.
        let mut input = Vec::new();
        for i in 0..12 {
            let source = match i % 5 {
                0 => CandidateSource::TagAffinity,
                1 => CandidateSource::Collaborative,
                2 => CandidateSource::Trending,
                3 => CandidateSource::Location,
                _ => CandidateSource::Exploration,
            };
            input.push(ranked(ContentType::Event, None, source, 1.0 - i as f64 * 0.01));
        }
        for i in 0..12 {
            let source = match i % 5 {
                0 => CandidateSource::TagAffinity,
                1 => CandidateSource::Collaborative,
                2 => CandidateSource::Trending,
                3 => CandidateSource::FollowedOrg,
                _ => CandidateSource::Exploration,
            };
            input.push(ranked(
                ContentType::Fundraiser,
                None,
                source,
                0.5 - i as f64 * 0.01,
            ));
        }

        let target = 12;
        let result = apply(&input, target, DiversityCaps::default());
        let type_cap = target.div_ceil(3);

        let mut counts: HashMap<ContentType, usize> = HashMap::new();
        for item in &result {
            *counts.entry(item.content.content_type).or_insert(0) += 1;
        }
        for (_, count) in counts {
            assert!(count <= type_cap);
        }
    }

    #[test]
    fn test_organization_cap_enforced() {
        let org = Uuid::new_v4();
        let sources = [
            CandidateSource::TagAffinity,
            CandidateSource::Collaborative,
            CandidateSource::Trending,
            CandidateSource::Location,
            CandidateSource::FollowedOrg,
            CandidateSource::Exploration,
        ];
        let types = [
            ContentType::Event,
            ContentType::Fundraiser,
            ContentType::Organization,
        ];
        let input: Vec<RankedCandidate> = (0..10)
            .map(|i| {
                ranked(
                    types[i % 3],
                    Some(org),
                    sources[i % 6],
                    1.0 - i as f64 * 0.05,
                )
            })
            .collect();

        let result = apply(&input, 10, DiversityCaps { organization_cap: 2 });
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.organization_id == Some(org)));
    }

    #[test]
    fn test_generator_cap_enforced() {
        // Everything from one generator; only ⌈N/5⌉ may survive.
        let types = [
            ContentType::Event,
            ContentType::Fundraiser,
            ContentType::Organization,
        ];
        let input: Vec<RankedCandidate> = (0..15)
            .map(|i| {
                ranked(
                    types[i % 3],
                    None,
                    CandidateSource::Trending,
                    1.0 - i as f64 * 0.01,
                )
            })
            .collect();

        let target = 10;
        let result = apply(&input, target, DiversityCaps::default());
        assert_eq!(result.len(), target.div_ceil(5));
    }

    #[test]
    fn test_keeps_sorted_order_and_fills_target() {
        let sources = [
            CandidateSource::TagAffinity,
            CandidateSource::Collaborative,
            CandidateSource::Trending,
            CandidateSource::Location,
            CandidateSource::FollowedOrg,
            CandidateSource::Exploration,
        ];
        let types = [
            ContentType::Event,
            ContentType::Fundraiser,
            ContentType::Organization,
        ];
        let input: Vec<RankedCandidate> = (0..30)
            .map(|i| {
                ranked(
                    types[i % 3],
                    Some(Uuid::new_v4()),
                    sources[i % 6],
                    1.0 - i as f64 * 0.01,
                )
            })
            .collect();

        let result = apply(&input, 12, DiversityCaps::default());
        assert_eq!(result.len(), 12);
        for pair in result.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_zero_target() {
        assert!(apply(&[], 0, DiversityCaps::default()).is_empty());
    }
}
