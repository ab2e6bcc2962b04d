//! End-to-end tests of the pure ranking pipeline: pooled candidates →
//! merge/score → diversity filter. No database or Redis required.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use discovery_engine::models::{
    Candidate, CandidateSource, ContentMetadata, ContentRef, ContentStatus, ContentType,
};
use discovery_engine::services::diversity::{self, DiversityCaps};
use discovery_engine::services::ranking::{rank, RankingWeights, SourceWeights};

fn metadata(
    content: ContentRef,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
) -> ContentMetadata {
    ContentMetadata {
        content,
        organization_id,
        status: ContentStatus::Published,
        created_at,
        starts_at: None,
        location: None,
        title: Some("Community river cleanup".into()),
        summary: Some("Join us on Saturday".into()),
        image_url: None,
    }
}

fn candidate(content: ContentRef, raw: f64, source: CandidateSource) -> Candidate {
    Candidate {
        content,
        raw_score: raw,
        reasons: vec![format!("from {}", source)],
        source,
    }
}

/// A pool mixing all six sources with overlap between them
fn build_pool(now: DateTime<Utc>) -> (Vec<Candidate>, HashMap<ContentRef, ContentMetadata>) {
    let mut pool = Vec::new();
    let mut metas = HashMap::new();
    let types = [
        ContentType::Event,
        ContentType::Fundraiser,
        ContentType::Organization,
    ];
    let sources = [
        CandidateSource::TagAffinity,
        CandidateSource::Collaborative,
        CandidateSource::Trending,
        CandidateSource::Location,
        CandidateSource::FollowedOrg,
        CandidateSource::Exploration,
    ];
    let orgs: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();

    for i in 0..48 {
        let content = ContentRef::new(types[i % 3], Uuid::new_v4());
        metas.insert(
            content,
            metadata(
                content,
                Some(orgs[i % orgs.len()]),
                now - Duration::hours(i as i64),
            ),
        );
        pool.push(candidate(content, 1.0 - i as f64 * 0.015, sources[i % 6]));
        // Every fourth item is also endorsed by a second source.
        if i % 4 == 0 {
            pool.push(candidate(content, 0.6, sources[(i + 1) % 6]));
        }
    }
    (pool, metas)
}

#[test]
fn full_pipeline_is_deterministic() {
    let now = Utc::now();
    let (pool, metas) = build_pool(now);
    let weights = RankingWeights::default();
    let sources = SourceWeights::default();
    let shares = HashMap::new();

    let run = |input: &[Candidate]| {
        let ranked = rank(input, &metas, &shares, &weights, &sources, now);
        diversity::apply(&ranked, 20, DiversityCaps::default())
    };

    let first = run(&pool);
    let reordered: Vec<Candidate> = pool.iter().rev().cloned().collect();
    let second = run(&reordered);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.content, b.content);
        assert_eq!(a.score, b.score);
    }
}

#[test]
fn emitted_page_respects_all_diversity_caps() {
    let now = Utc::now();
    let (pool, metas) = build_pool(now);
    let target = 12;

    let ranked = rank(
        &pool,
        &metas,
        &HashMap::new(),
        &RankingWeights::default(),
        &SourceWeights::default(),
        now,
    );
    let page = diversity::apply(&ranked, target, DiversityCaps::default());
    assert!(!page.is_empty());

    let type_cap = target.div_ceil(3);
    let source_cap = target.div_ceil(5);

    let mut by_type: HashMap<ContentType, usize> = HashMap::new();
    let mut by_source: HashMap<CandidateSource, usize> = HashMap::new();
    let mut by_org: HashMap<Uuid, usize> = HashMap::new();
    for item in &page {
        *by_type.entry(item.content.content_type).or_insert(0) += 1;
        *by_source.entry(item.primary_source).or_insert(0) += 1;
        if let Some(org) = item.organization_id {
            *by_org.entry(org).or_insert(0) += 1;
        }
    }

    assert!(by_type.values().all(|&n| n <= type_cap));
    assert!(by_source.values().all(|&n| n <= source_cap));
    assert!(by_org.values().all(|&n| n <= 2));
}

#[test]
fn cold_start_pool_produces_a_feed() {
    // A user with no profile gets no personalized candidates; trending,
    // exploration and followed-org recall still fill the page.
    let now = Utc::now();
    let mut pool = Vec::new();
    let mut metas = HashMap::new();

    for i in 0..15 {
        let content_type = if i % 2 == 0 {
            ContentType::Fundraiser
        } else {
            ContentType::Event
        };
        let content = ContentRef::new(content_type, Uuid::new_v4());
        metas.insert(
            content,
            metadata(content, Some(Uuid::new_v4()), now - Duration::hours(i)),
        );
        let source = match i % 3 {
            0 => CandidateSource::Trending,
            1 => CandidateSource::Exploration,
            _ => CandidateSource::FollowedOrg,
        };
        pool.push(candidate(content, 1.0 - i as f64 * 0.05, source));
    }

    let ranked = rank(
        &pool,
        &metas,
        &HashMap::new(),
        &RankingWeights::default(),
        &SourceWeights::default(),
        now,
    );
    let page = diversity::apply(&ranked, 10, DiversityCaps::default());

    assert!(!page.is_empty(), "cold-start users must still get a feed");
    assert!(page
        .iter()
        .all(|item| item.primary_source != CandidateSource::TagAffinity));
}

#[test]
fn multi_source_endorsement_outranks_single_source() {
    let now = Utc::now();
    let created = now - Duration::hours(1);

    let solo = ContentRef::new(ContentType::Event, Uuid::new_v4());
    let endorsed = ContentRef::new(ContentType::Event, Uuid::new_v4());

    let mut metas = HashMap::new();
    metas.insert(solo, metadata(solo, None, created));
    metas.insert(endorsed, metadata(endorsed, None, created));

    let pool = vec![
        candidate(solo, 0.8, CandidateSource::TagAffinity),
        candidate(endorsed, 0.8, CandidateSource::TagAffinity),
        candidate(endorsed, 0.7, CandidateSource::Collaborative),
        candidate(endorsed, 0.5, CandidateSource::Trending),
    ];

    let ranked = rank(
        &pool,
        &metas,
        &HashMap::new(),
        &RankingWeights::default(),
        &SourceWeights::default(),
        now,
    );

    assert_eq!(ranked[0].content, endorsed);
    assert_eq!(ranked[1].content, solo);
    assert!(ranked[0].score > ranked[1].score);
    assert_eq!(ranked[0].sources.len(), 3);
}

#[test]
fn exploration_alone_never_dominates_mixed_pool() {
    let now = Utc::now();
    let created = now - Duration::hours(2);
    let mut metas = HashMap::new();

    let personalized = ContentRef::new(ContentType::Event, Uuid::new_v4());
    let explored = ContentRef::new(ContentType::Fundraiser, Uuid::new_v4());
    metas.insert(personalized, metadata(personalized, None, created));
    metas.insert(explored, metadata(explored, None, created));

    let pool = vec![
        candidate(personalized, 1.0, CandidateSource::TagAffinity),
        candidate(explored, 1.0, CandidateSource::Exploration),
    ];

    let ranked = rank(
        &pool,
        &metas,
        &HashMap::new(),
        &RankingWeights::default(),
        &SourceWeights::default(),
        now,
    );

    // Same raw score, but exploration carries a much lower source weight.
    assert_eq!(ranked[0].content, personalized);
    assert!(ranked[0].breakdown.relevance > ranked[1].breakdown.relevance);
}
