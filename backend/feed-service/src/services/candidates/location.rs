//! Location candidate generator
//!
//! Distance-scored recall of geocoded content near the caller-supplied
//! location. Requires both a user location in the request context and
//! coordinates on the content; absent either, it simply emits nothing.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

use super::{normalize, CandidateContext, CandidateGenerator};
use crate::config::EngineConfig;
use crate::db::ContentRepo;
use crate::error::Result;
use crate::models::{Candidate, CandidateSource, ContentRef, GeoPoint};

const LOOKBACK_DAYS: i64 = 30;
const FETCH_LIMIT: i64 = 500;
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Linear falloff to zero at the radius edge
pub fn proximity_score(distance_km: f64, radius_km: f64) -> f64 {
    if radius_km <= 0.0 {
        return 0.0;
    }
    (1.0 - distance_km / radius_km).max(0.0)
}

pub struct LocationGenerator {
    content: Arc<ContentRepo>,
    config: EngineConfig,
}

impl LocationGenerator {
    pub fn new(content: Arc<ContentRepo>, config: EngineConfig) -> Self {
        Self { content, config }
    }
}

#[async_trait]
impl CandidateGenerator for LocationGenerator {
    async fn generate(&self, ctx: &CandidateContext) -> Result<Vec<Candidate>> {
        let Some(user_location) = ctx.location else {
            return Ok(Vec::new());
        };

        let items = self
            .content
            .geocoded_since(ctx.now - Duration::days(LOOKBACK_DAYS), FETCH_LIMIT)
            .await?;

        let radius = self.config.location_radius_km;
        let scored: Vec<(ContentRef, f64, Vec<String>)> = items
            .into_iter()
            .filter(|item| !ctx.recent.contains(&item.content))
            .filter_map(|item| {
                let distance = haversine_km(user_location, item.location);
                let score = proximity_score(distance, radius);
                (score > 0.0).then(|| {
                    (
                        item.content,
                        score,
                        vec![format!("{:.0} km from you", distance)],
                    )
                })
            })
            .collect();

        let mut candidates = normalize(scored, self.source());
        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.content.cmp(&b.content))
        });
        candidates.truncate(ctx.limit);
        Ok(candidates)
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = GeoPoint {
            lat: 40.7128,
            lng: -74.0060,
        };
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // New York → Philadelphia is roughly 130 km.
        let nyc = GeoPoint {
            lat: 40.7128,
            lng: -74.0060,
        };
        let philly = GeoPoint {
            lat: 39.9526,
            lng: -75.1652,
        };
        let d = haversine_km(nyc, philly);
        assert!(d > 120.0 && d < 140.0, "got {}", d);
    }

    #[test]
    fn test_proximity_score_falloff() {
        assert_eq!(proximity_score(0.0, 50.0), 1.0);
        assert!((proximity_score(25.0, 50.0) - 0.5).abs() < 1e-9);
        assert_eq!(proximity_score(50.0, 50.0), 0.0);
        // Outside the radius clamps to zero, never negative.
        assert_eq!(proximity_score(80.0, 50.0), 0.0);
    }
}
