//! Trending refresh job
//!
//! Recomputes every trending window on a short cadence and refreshes the
//! experiment set piggy-backed on the same timer (both are cheap reads of
//! slowly-changing state).

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics;
use crate::services::{ExperimentEngine, TrendingService};

const STARTUP_DELAY: Duration = Duration::from_secs(5);

pub async fn start(
    trending: Arc<TrendingService>,
    experiments: Arc<ExperimentEngine>,
    interval_secs: u64,
) {
    let interval = Duration::from_secs(interval_secs.max(30));
    info!(
        interval_secs = interval.as_secs(),
        "Starting trending refresh job"
    );

    sleep(STARTUP_DELAY).await;

    loop {
        let started = Instant::now();
        match trending.rebuild().await {
            Ok(items) => {
                metrics::record_snapshot_rebuild("trending", "success");
                info!(
                    items,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Trending refresh cycle complete"
                );
            }
            Err(e) => {
                metrics::record_snapshot_rebuild("trending", "error");
                warn!("Trending refresh failed: {}", e);
            }
        }

        if let Err(e) = experiments.refresh().await {
            warn!("Experiment refresh failed: {}", e);
        }

        sleep(interval).await;
    }
}
