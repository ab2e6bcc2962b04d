//! Experiments Repository
//!
//! Read access to A/B experiment definitions. Experiment lifecycle
//! management (create/pause/complete) belongs to an admin surface outside
//! this service; the engine only consumes running experiments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// Experiment from database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExperimentRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Experiment variant from database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VariantRow {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub variant_name: String,
    pub variant_config: serde_json::Value,
    pub traffic_allocation: i32,
}

pub struct ExperimentsRepo {
    pool: PgPool,
}

impl ExperimentsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Experiments currently running (start date passed, end date not)
    pub async fn list_running(&self) -> Result<Vec<ExperimentRow>> {
        let experiments = sqlx::query_as::<_, ExperimentRow>(
            r#"
            SELECT id, name, description, status, start_date, end_date, created_at
            FROM experiments
            WHERE status = 'running'
              AND (start_date IS NULL OR start_date <= NOW())
              AND (end_date IS NULL OR end_date > NOW())
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(experiments)
    }

    pub async fn variants_for(&self, experiment_id: Uuid) -> Result<Vec<VariantRow>> {
        let variants = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, experiment_id, variant_name, variant_config, traffic_allocation
            FROM experiment_variants
            WHERE experiment_id = $1
            ORDER BY variant_name
            "#,
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }
}
