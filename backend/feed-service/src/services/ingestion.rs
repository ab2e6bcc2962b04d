//! Interaction ingestion pipeline
//!
//! Events enter via the track endpoint or the Kafka consumer and are
//! processed by a fixed pool of workers over bounded queues. Events are
//! sharded by user id, which serializes all updates for one user (the
//! read-modify-write on affinity rows needs ordering) while keeping users
//! independent of each other. Queue capacity provides backpressure.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::InteractionRepo;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::UserInteraction;
use crate::services::affinity::AffinityService;
use crate::services::feed::FeedService;

/// Deterministic shard for a user; all of a user's events land on the
/// same worker.
pub fn shard_for(user_id: Uuid, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

#[derive(Clone)]
pub struct IngestionService {
    shards: Vec<mpsc::Sender<UserInteraction>>,
}

impl IngestionService {
    /// Spawn the worker pool and return the enqueue handle
    pub fn start(
        workers: usize,
        queue_capacity: usize,
        interactions: Arc<InteractionRepo>,
        affinity: Arc<AffinityService>,
        feed: Arc<FeedService>,
    ) -> Self {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            shards.push(tx);

            let interactions = Arc::clone(&interactions);
            let affinity = Arc::clone(&affinity);
            let feed = Arc::clone(&feed);
            tokio::spawn(async move {
                run_worker(worker_id, rx, interactions, affinity, feed).await;
            });
        }

        info!(workers, queue_capacity, "Ingestion worker pool started");
        Self { shards }
    }

    /// Enqueue one event. Applies backpressure when the shard queue is
    /// full rather than dropping the event.
    pub async fn enqueue(&self, interaction: UserInteraction) -> Result<()> {
        let shard = shard_for(interaction.user_id, self.shards.len());
        self.shards[shard]
            .send(interaction)
            .await
            .map_err(|_| AppError::Internal("Ingestion queue closed".to_string()))
    }
}

async fn run_worker(
    worker_id: usize,
    mut rx: mpsc::Receiver<UserInteraction>,
    interactions: Arc<InteractionRepo>,
    affinity: Arc<AffinityService>,
    feed: Arc<FeedService>,
) {
    while let Some(event) = rx.recv().await {
        process_event(&event, &interactions, &affinity, &feed).await;
    }
    info!(worker_id, "Ingestion worker stopped");
}

/// Process one event to completion. Nothing here may panic or return:
/// a bad event is logged and dropped, the worker lives on.
async fn process_event(
    event: &UserInteraction,
    interactions: &InteractionRepo,
    affinity: &AffinityService,
    feed: &Arc<FeedService>,
) {
    // The append is the idempotency gate: a duplicate event id means the
    // affinity state already reflects this event.
    let inserted = match interactions.insert(event).await {
        Ok(inserted) => inserted,
        Err(e) => {
            metrics::record_ingestion("error");
            warn!(event_id = %event.id, error = %e, "Interaction append failed");
            return;
        }
    };

    if !inserted {
        metrics::record_ingestion("duplicate");
        debug!(event_id = %event.id, "Duplicate interaction event, skipping");
        return;
    }

    if let Err(e) = affinity.apply_interaction(event).await {
        metrics::record_ingestion("error");
        warn!(event_id = %event.id, error = %e, "Affinity update failed");
        return;
    }

    if event.interaction_type.is_significant() {
        Arc::clone(feed).on_significant_interaction(event.user_id).await;
    }

    metrics::record_ingestion("applied");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_stable_per_user() {
        let user = Uuid::new_v4();
        let first = shard_for(user, 8);
        for _ in 0..10 {
            assert_eq!(shard_for(user, 8), first);
        }
        assert!(first < 8);
    }

    #[test]
    fn test_single_shard_degenerate_case() {
        assert_eq!(shard_for(Uuid::new_v4(), 1), 0);
        assert_eq!(shard_for(Uuid::new_v4(), 0), 0);
    }

    #[test]
    fn test_users_spread_across_shards() {
        let shards = 8;
        let mut hit = vec![false; shards];
        for _ in 0..500 {
            hit[shard_for(Uuid::new_v4(), shards)] = true;
        }
        assert!(hit.iter().all(|h| *h), "500 users should cover all shards");
    }
}
