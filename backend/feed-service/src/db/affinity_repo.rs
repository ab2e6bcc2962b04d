//! Tag Affinity Repository
//!
//! Persists the derived per-(user, tag) interest scores. Rows are created
//! lazily on first qualifying interaction and never hard-deleted; decay is
//! applied at read time by the affinity service.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::TagAffinity;

pub struct AffinityRepo {
    pool: PgPool,
}

impl AffinityRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a boost to one (user, tag) row, clamped to [0,1].
    ///
    /// The clamp lives in SQL so the bound holds no matter how many
    /// concurrent writers race on the same row.
    pub async fn apply_boost(
        &self,
        user_id: Uuid,
        tag_id: Uuid,
        boost: f64,
        occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tag_affinities (user_id, tag_id, score, interaction_count, last_interaction_at)
            VALUES ($1, $2, LEAST(1.0, $3), 1, $4)
            ON CONFLICT (user_id, tag_id) DO UPDATE SET
                score = LEAST(1.0, tag_affinities.score + $3),
                interaction_count = tag_affinities.interaction_count + 1,
                last_interaction_at = GREATEST(tag_affinities.last_interaction_at, $4)
            "#,
        )
        .bind(user_id)
        .bind(tag_id)
        .bind(boost)
        .bind(occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All stored affinities for one user
    pub async fn for_user(&self, user_id: Uuid) -> Result<Vec<TagAffinity>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, tag_id, score, interaction_count, last_interaction_at
            FROM tag_affinities
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_affinity).collect()
    }

    /// Every affinity row above the stored-score floor, across all users.
    /// Input for the similarity index rebuild; the floor keeps noise out
    /// of the inverted index.
    pub async fn above_floor(&self, floor: f64) -> Result<Vec<TagAffinity>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, tag_id, score, interaction_count, last_interaction_at
            FROM tag_affinities
            WHERE score >= $1
            "#,
        )
        .bind(floor)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_affinity).collect()
    }
}

fn parse_affinity(row: sqlx::postgres::PgRow) -> Result<TagAffinity> {
    Ok(TagAffinity {
        user_id: row.try_get("user_id")?,
        tag_id: row.try_get("tag_id")?,
        score: row.try_get("score")?,
        interaction_count: row.try_get("interaction_count")?,
        last_interaction_at: row.try_get("last_interaction_at")?,
    })
}
