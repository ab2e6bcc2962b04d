//! User Similarity Index (collaborative-filtering backbone)
//!
//! Cosine similarity over users' decayed tag-affinity vectors. A full
//! pairwise sweep is avoided with an inverted tag→users index: only pairs
//! sharing at least `min_shared_tags` tags are compared at all. The index
//! is rebuilt wholesale on a schedule and swapped atomically; staleness of
//! minutes is acceptable since it only feeds one of several generators.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db::AffinityRepo;
use crate::error::Result;
use crate::models::{SimilarUser, TagAffinity};
use crate::services::affinity::decayed_score;
use crate::snapshot::SnapshotStore;

/// One complete build of the neighbor lists
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    pub neighbors: HashMap<Uuid, Vec<SimilarUser>>,
    pub user_count: usize,
    pub edge_count: usize,
    pub built_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Cosine similarity between two sparse affinity vectors
pub fn cosine_similarity(a: &HashMap<Uuid, f64>, b: &HashMap<Uuid, f64>) -> f64 {
    // Iterate the smaller map for the dot product.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let dot: f64 = small
        .iter()
        .filter_map(|(tag, weight)| large.get(tag).map(|other| weight * other))
        .sum();

    let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Build neighbor lists from per-user affinity vectors.
///
/// `min_shared_tags` gates which pairs are compared; `min_similarity`
/// gates which edges are kept; each list is truncated to `top_k`.
pub fn build_neighbors(
    vectors: &HashMap<Uuid, HashMap<Uuid, f64>>,
    min_shared_tags: usize,
    min_similarity: f64,
    top_k: usize,
) -> HashMap<Uuid, Vec<SimilarUser>> {
    // Inverted index: tag → users carrying it above the floor.
    let mut by_tag: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (user, vector) in vectors {
        for tag in vector.keys() {
            by_tag.entry(*tag).or_default().push(*user);
        }
    }

    // Count shared tags per unordered pair.
    let mut shared: HashMap<(Uuid, Uuid), usize> = HashMap::new();
    for users in by_tag.values() {
        for i in 0..users.len() {
            for j in (i + 1)..users.len() {
                let pair = if users[i] < users[j] {
                    (users[i], users[j])
                } else {
                    (users[j], users[i])
                };
                *shared.entry(pair).or_insert(0) += 1;
            }
        }
    }

    let mut neighbors: HashMap<Uuid, Vec<SimilarUser>> = HashMap::new();
    for ((a, b), shared_tag_count) in shared {
        if shared_tag_count < min_shared_tags {
            continue;
        }
        let (Some(vec_a), Some(vec_b)) = (vectors.get(&a), vectors.get(&b)) else {
            continue;
        };
        let similarity = cosine_similarity(vec_a, vec_b);
        if similarity < min_similarity {
            continue;
        }
        neighbors.entry(a).or_default().push(SimilarUser {
            user_id: b,
            similarity,
            shared_tag_count,
        });
        neighbors.entry(b).or_default().push(SimilarUser {
            user_id: a,
            similarity,
            shared_tag_count,
        });
    }

    for list in neighbors.values_mut() {
        list.sort_by(|x, y| {
            y.similarity
                .partial_cmp(&x.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.user_id.cmp(&y.user_id))
        });
        list.truncate(top_k);
    }
    neighbors
}

pub struct SimilarityService {
    affinities: Arc<AffinityRepo>,
    store: SnapshotStore<SimilarityIndex>,
    config: EngineConfig,
}

impl SimilarityService {
    pub fn new(affinities: Arc<AffinityRepo>, config: EngineConfig) -> Self {
        Self {
            affinities,
            store: SnapshotStore::new(SimilarityIndex::default()),
            config,
        }
    }

    /// Nearest neighbors of a user from the current snapshot
    pub fn find_similar_users(&self, user_id: Uuid, limit: usize) -> Vec<SimilarUser> {
        self.store
            .current()
            .neighbors
            .get(&user_id)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn current(&self) -> Arc<SimilarityIndex> {
        self.store.current()
    }

    /// Rebuild the whole index and swap it in. On failure the previous
    /// snapshot stays serveable; the scheduler retries next cycle.
    pub async fn rebuild(&self) -> Result<(usize, usize)> {
        let now = Utc::now();
        let rows = self.affinities.above_floor(self.config.min_affinity).await?;

        let vectors = affinity_vectors(
            &rows,
            now,
            self.config.decay_per_week,
            self.config.min_affinity,
        );

        let neighbors = build_neighbors(
            &vectors,
            self.config.min_shared_tags,
            self.config.min_similarity,
            self.config.similarity_top_k,
        );

        let user_count = neighbors.len();
        let edge_count = neighbors.values().map(|v| v.len()).sum::<usize>() / 2;

        self.store.swap(SimilarityIndex {
            neighbors,
            user_count,
            edge_count,
            built_at: Some(now),
        });

        info!(
            users = user_count,
            edges = edge_count,
            source_rows = rows.len(),
            "Similarity index rebuilt"
        );
        Ok((user_count, edge_count))
    }
}

/// Decay stored rows into per-user sparse vectors, dropping entries that
/// fall under the floor once decayed.
fn affinity_vectors(
    rows: &[TagAffinity],
    now: chrono::DateTime<chrono::Utc>,
    decay_per_week: f64,
    min_affinity: f64,
) -> HashMap<Uuid, HashMap<Uuid, f64>> {
    let mut vectors: HashMap<Uuid, HashMap<Uuid, f64>> = HashMap::new();
    for row in rows {
        let score = decayed_score(row.score, now - row.last_interaction_at, decay_per_week);
        if score < min_affinity {
            continue;
        }
        vectors.entry(row.user_id).or_default().insert(row.tag_id, score);
    }
    vectors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(entries: &[(Uuid, f64)]) -> HashMap<Uuid, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let v = vector(&[(t1, 0.5), (t2, 0.3)]);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_disjoint_vectors() {
        let v1 = vector(&[(Uuid::new_v4(), 0.9)]);
        let v2 = vector(&[(Uuid::new_v4(), 0.9)]);
        assert_eq!(cosine_similarity(&v1, &v2), 0.0);
    }

    #[test]
    fn test_cosine_empty_vector_is_zero() {
        let v1 = vector(&[(Uuid::new_v4(), 0.9)]);
        assert_eq!(cosine_similarity(&v1, &HashMap::new()), 0.0);
    }

    #[test]
    fn test_min_shared_tags_gate() {
        let t1 = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut vectors = HashMap::new();
        // Only one shared tag; pair must not be compared.
        vectors.insert(a, vector(&[(t1, 0.9)]));
        vectors.insert(b, vector(&[(t1, 0.9)]));

        let neighbors = build_neighbors(&vectors, 3, 0.3, 10);
        assert!(neighbors.is_empty());
    }

    #[test]
    fn test_four_shared_tags_above_threshold_are_neighbors() {
        let tags: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut vectors = HashMap::new();
        vectors.insert(
            a,
            vector(&[
                (tags[0], 0.8),
                (tags[1], 0.6),
                (tags[2], 0.4),
                (tags[3], 0.2),
            ]),
        );
        // Same tags, weights shuffled: clearly correlated but not identical.
        vectors.insert(
            b,
            vector(&[
                (tags[0], 0.2),
                (tags[1], 0.8),
                (tags[2], 0.6),
                (tags[3], 0.4),
            ]),
        );

        let neighbors = build_neighbors(&vectors, 3, 0.3, 10);
        let list = neighbors.get(&a).expect("a should have neighbors");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user_id, b);
        assert_eq!(list[0].shared_tag_count, 4);
        assert!(list[0].similarity > 0.7, "got {}", list[0].similarity);

        // Symmetric edge.
        let back = neighbors.get(&b).unwrap();
        assert_eq!(back[0].user_id, a);
        assert!((back[0].similarity - list[0].similarity).abs() < 1e-12);
    }

    #[test]
    fn test_top_k_truncation() {
        let tags: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let center = Uuid::new_v4();
        let mut vectors = HashMap::new();
        vectors.insert(
            center,
            vector(&[(tags[0], 0.9), (tags[1], 0.9), (tags[2], 0.9)]),
        );
        for _ in 0..5 {
            vectors.insert(
                Uuid::new_v4(),
                vector(&[(tags[0], 0.5), (tags[1], 0.5), (tags[2], 0.5)]),
            );
        }

        let neighbors = build_neighbors(&vectors, 3, 0.3, 2);
        assert_eq!(neighbors.get(&center).unwrap().len(), 2);
    }
}
