//! A/B experiment layer
//!
//! Deterministic hash bucketing of users into experiment variants. A
//! variant's JSON config may override ranking weights or diversity caps;
//! the override is resolved before ranking and applied as plain values,
//! never by re-fetching candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::ExperimentsRepo;
use crate::error::Result;
use crate::services::diversity::DiversityCaps;
use crate::services::ranking::RankingWeights;

/// Experiment configuration (in-memory representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: Uuid,
    pub name: String,
    pub variants: Vec<Variant>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Experiment variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub name: String,
    /// Percentage of traffic (0-100)
    pub allocation: u8,
    pub config: serde_json::Value,
}

/// Feed-level knobs a variant may override
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedOverrides {
    #[serde(default)]
    pub ranking_weights: Option<RankingWeights>,
    #[serde(default)]
    pub organization_cap: Option<usize>,
}

/// Deterministic bucket in [0, 100) for a (user, experiment) pair
pub fn bucket_user(user_id: Uuid, experiment_name: &str) -> u8 {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    experiment_name.hash(&mut hasher);
    (hasher.finish() % 100) as u8
}

/// Pick the variant whose cumulative allocation range contains the bucket
pub fn assign_variant<'a>(experiment: &'a Experiment, user_id: Uuid) -> Option<&'a Variant> {
    let bucket = bucket_user(user_id, &experiment.name);
    let mut cumulative = 0u16;
    for variant in &experiment.variants {
        cumulative += variant.allocation as u16;
        if (bucket as u16) < cumulative {
            return Some(variant);
        }
    }
    None
}

/// Resolve a user's effective weights and caps across active experiments.
/// Later experiments win on conflicts; in practice at most one feed
/// experiment runs at a time.
pub fn resolve_overrides(
    experiments: &[Experiment],
    user_id: Uuid,
    base_weights: RankingWeights,
    base_caps: DiversityCaps,
) -> (RankingWeights, DiversityCaps, Vec<String>) {
    let mut weights = base_weights;
    let mut caps = base_caps;
    let mut assignments = Vec::new();

    for experiment in experiments {
        let Some(variant) = assign_variant(experiment, user_id) else {
            continue;
        };
        assignments.push(format!("{}:{}", experiment.name, variant.name));

        match serde_json::from_value::<FeedOverrides>(variant.config.clone()) {
            Ok(overrides) => {
                if let Some(w) = overrides.ranking_weights {
                    weights = w;
                }
                if let Some(cap) = overrides.organization_cap {
                    caps.organization_cap = cap;
                }
            }
            Err(e) => warn!(
                experiment = %experiment.name,
                variant = %variant.name,
                error = %e,
                "Unparseable variant config, using defaults"
            ),
        }
    }
    (weights, caps, assignments)
}

/// Holds the active experiment set, refreshed from Postgres on a schedule.
/// Without a repository (tests, minimal deployments) it is an empty no-op.
pub struct ExperimentEngine {
    experiments: Arc<RwLock<Vec<Experiment>>>,
    repo: Option<Arc<ExperimentsRepo>>,
}

impl ExperimentEngine {
    pub fn new(repo: Option<Arc<ExperimentsRepo>>) -> Self {
        Self {
            experiments: Arc::new(RwLock::new(Vec::new())),
            repo,
        }
    }

    /// Reload running experiments from the database
    pub async fn refresh(&self) -> Result<usize> {
        let Some(repo) = &self.repo else {
            debug!("No experiments repository configured, skipping refresh");
            return Ok(0);
        };

        let rows = repo.list_running().await?;
        let mut experiments = Vec::with_capacity(rows.len());
        for row in rows {
            let variants = repo
                .variants_for(row.id)
                .await?
                .into_iter()
                .map(|v| Variant {
                    id: v.id,
                    name: v.variant_name,
                    allocation: v.traffic_allocation.clamp(0, 100) as u8,
                    config: v.variant_config,
                })
                .collect();
            experiments.push(Experiment {
                id: row.id,
                name: row.name,
                variants,
                start_date: row.start_date,
                end_date: row.end_date,
            });
        }

        let count = experiments.len();
        *self.experiments.write().await = experiments;
        info!(experiments = count, "Refreshed active experiments");
        Ok(count)
    }

    /// Current snapshot of active experiments
    pub async fn active(&self) -> Vec<Experiment> {
        self.experiments.read().await.clone()
    }

    /// Effective weights/caps for a user, plus assignment labels for the
    /// response metadata
    pub async fn overrides_for(
        &self,
        user_id: Uuid,
        base_weights: RankingWeights,
        base_caps: DiversityCaps,
    ) -> (RankingWeights, DiversityCaps, Vec<String>) {
        let experiments = self.experiments.read().await;
        resolve_overrides(&experiments, user_id, base_weights, base_caps)
    }
}
