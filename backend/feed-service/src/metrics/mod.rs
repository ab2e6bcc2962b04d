//! Prometheus metrics for the feed engine

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Histogram, IntCounterVec,
};
use std::time::Duration;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_requests_total",
        "Feed requests by cache outcome (hit/miss/expired_cursor)",
        &["outcome"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_BUILD_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_build_duration_seconds",
        "End-to-end duration of a full feed assembly",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register feed build duration metric")
});

static INTERACTIONS_INGESTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "interactions_ingested_total",
        "Interaction events by ingestion outcome (applied/duplicate/malformed/error)",
        &["outcome"]
    )
    .expect("Failed to register interactions ingested metric")
});

static CANDIDATES_GENERATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "candidates_generated_total",
        "Candidates emitted per generator",
        &["source"]
    )
    .expect("Failed to register candidates generated metric")
});

static SNAPSHOT_REBUILDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "snapshot_rebuilds_total",
        "Background snapshot rebuilds by job and status",
        &["job", "status"]
    )
    .expect("Failed to register snapshot rebuilds metric")
});

pub fn record_feed_request(outcome: &str) {
    FEED_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_feed_build(duration: Duration) {
    FEED_BUILD_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_ingestion(outcome: &str) {
    INTERACTIONS_INGESTED_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_candidates(source: &str, count: usize) {
    CANDIDATES_GENERATED_TOTAL
        .with_label_values(&[source])
        .inc_by(count as u64);
}

pub fn record_snapshot_rebuild(job: &str, status: &str) {
    SNAPSHOT_REBUILDS_TOTAL
        .with_label_values(&[job, status])
        .inc();
}

/// Render all registered metrics in Prometheus text format
pub fn render() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render() {
        record_feed_request("hit");
        record_ingestion("applied");
        record_candidates("trending", 10);
        record_snapshot_rebuild("trending", "success");
        record_feed_build(Duration::from_millis(42));

        let text = render();
        assert!(text.contains("feed_requests_total"));
        assert!(text.contains("interactions_ingested_total"));
    }
}
