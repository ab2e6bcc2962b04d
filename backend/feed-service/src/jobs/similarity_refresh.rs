//! Similarity index refresh job
//!
//! Rebuilds the user-user similarity index on a schedule. Per-event
//! maintenance would be far too expensive; staleness here only affects the
//! collaborative generator, which tolerates minutes-old neighbors.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics;
use crate::services::SimilarityService;

/// Initial delay so the service finishes booting before the first sweep
const STARTUP_DELAY: Duration = Duration::from_secs(10);

pub async fn start(similarity: Arc<SimilarityService>, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs.max(60));
    info!(
        interval_secs = interval.as_secs(),
        "Starting similarity refresh job"
    );

    sleep(STARTUP_DELAY).await;

    loop {
        let started = Instant::now();
        match similarity.rebuild().await {
            Ok((users, edges)) => {
                metrics::record_snapshot_rebuild("similarity", "success");
                info!(
                    users,
                    edges,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Similarity refresh cycle complete"
                );
            }
            Err(e) => {
                // Previous snapshot stays serveable; retry next cycle.
                metrics::record_snapshot_rebuild("similarity", "error");
                warn!("Similarity refresh failed: {}", e);
            }
        }
        sleep(interval).await;
    }
}
