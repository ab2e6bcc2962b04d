//! Interaction Log Repository
//!
//! The interactions table is the only durable source of truth in this
//! service; every derived structure (affinities, profiles, similarity,
//! trending) can be recomputed from it.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ContentRef, ContentType, InteractionType, UserInteraction};

/// One interaction row as sampled for trending/collaborative computation
#[derive(Debug, Clone)]
pub struct InteractionSample {
    pub user_id: Uuid,
    pub content: ContentRef,
    pub interaction_type: InteractionType,
    pub created_at: DateTime<Utc>,
}

/// (hour-of-day, day-of-week, count) bucket of a user's activity
#[derive(Debug, Clone, Copy)]
pub struct ActivityBucket {
    pub hour: u8,
    pub weekday: u8,
    pub count: i64,
}

pub struct InteractionRepo {
    pool: PgPool,
}

impl InteractionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an interaction. Returns false when the event id was already
    /// processed; at-least-once redelivery must be a no-op.
    pub async fn insert(&self, interaction: &UserInteraction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO interactions (
                id, user_id, content_type, content_id, interaction_type,
                time_spent_secs, scroll_depth, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(interaction.id)
        .bind(interaction.user_id)
        .bind(interaction.content.content_type.as_str())
        .bind(interaction.content.content_id)
        .bind(interaction.interaction_type.as_str())
        .bind(interaction.time_spent_secs.map(|v| v as i32))
        .bind(interaction.scroll_depth)
        .bind(interaction.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Content the user touched since the given instant (freshness exclusion)
    pub async fn recent_content(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ContentRef>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT content_type, content_id
            FROM interactions
            WHERE user_id = $1 AND created_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(parse_content_refs(rows))
    }

    /// All content the user has ever interacted with, most recent first
    pub async fn seen_content(&self, user_id: Uuid, limit: i64) -> Result<Vec<ContentRef>> {
        let rows = sqlx::query(
            r#"
            SELECT content_type, content_id, MAX(created_at) AS last_at
            FROM interactions
            WHERE user_id = $1
            GROUP BY content_type, content_id
            ORDER BY last_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(parse_content_refs(rows))
    }

    /// Counts grouped by (content type, interaction type) for preference shares
    pub async fn type_counts(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(ContentType, InteractionType, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT content_type, interaction_type, COUNT(*) AS n
            FROM interactions
            WHERE user_id = $1
            GROUP BY content_type, interaction_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let ct: String = row.try_get("content_type")?;
            let it: String = row.try_get("interaction_type")?;
            let n: i64 = row.try_get("n")?;
            match (ContentType::parse(&ct), InteractionType::parse(&it)) {
                (Some(content_type), Some(interaction_type)) => {
                    counts.push((content_type, interaction_type, n));
                }
                _ => warn!(content_type = %ct, interaction_type = %it, "Skipping unknown interaction row"),
            }
        }
        Ok(counts)
    }

    /// Hour-of-day / day-of-week activity histogram
    pub async fn activity_histogram(&self, user_id: Uuid) -> Result<Vec<ActivityBucket>> {
        let rows = sqlx::query(
            r#"
            SELECT EXTRACT(HOUR FROM created_at)::int AS hour,
                   EXTRACT(DOW FROM created_at)::int AS weekday,
                   COUNT(*) AS n
            FROM interactions
            WHERE user_id = $1
            GROUP BY 1, 2
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut buckets = Vec::with_capacity(rows.len());
        for row in rows {
            let hour: i32 = row.try_get("hour")?;
            let weekday: i32 = row.try_get("weekday")?;
            let count: i64 = row.try_get("n")?;
            buckets.push(ActivityBucket {
                hour: hour.clamp(0, 23) as u8,
                weekday: weekday.clamp(0, 6) as u8,
                count,
            });
        }
        Ok(buckets)
    }

    /// Average time spent per interaction, in seconds
    pub async fn avg_session_secs(&self, user_id: Uuid) -> Result<f64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(AVG(time_spent_secs), 0)::float8 AS avg_secs
            FROM interactions
            WHERE user_id = $1 AND time_spent_secs IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("avg_secs")?)
    }

    /// Per-tag interaction counts since the given instant (trend signal)
    pub async fn recent_tag_counts(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<std::collections::HashMap<Uuid, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.tag_id, COUNT(*) AS n
            FROM interactions i
            JOIN content_tags ct
              ON ct.content_type = i.content_type AND ct.content_id = i.content_id
            WHERE i.user_id = $1 AND i.created_at >= $2
            GROUP BY ct.tag_id
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let tag_id: Uuid = row.try_get("tag_id")?;
            let n: i64 = row.try_get("n")?;
            counts.insert(tag_id, n);
        }
        Ok(counts)
    }

    /// Every interaction inside a trending window
    pub async fn window_samples(&self, since: DateTime<Utc>) -> Result<Vec<InteractionSample>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, content_type, content_id, interaction_type, created_at
            FROM interactions
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(parse_samples(rows))
    }

    /// Recent interactions of the given users, restricted to the listed
    /// interaction types (collaborative filtering input)
    pub async fn recent_by_users(
        &self,
        user_ids: &[Uuid],
        since: DateTime<Utc>,
        interaction_types: &[InteractionType],
    ) -> Result<Vec<InteractionSample>> {
        let type_names: Vec<String> = interaction_types
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            r#"
            SELECT user_id, content_type, content_id, interaction_type, created_at
            FROM interactions
            WHERE user_id = ANY($1) AND created_at >= $2 AND interaction_type = ANY($3)
            "#,
        )
        .bind(user_ids)
        .bind(since)
        .bind(&type_names)
        .fetch_all(&self.pool)
        .await?;

        Ok(parse_samples(rows))
    }
}

fn parse_content_refs(rows: Vec<sqlx::postgres::PgRow>) -> Vec<ContentRef> {
    let mut refs = Vec::with_capacity(rows.len());
    for row in rows {
        let ct: String = match row.try_get("content_type") {
            Ok(v) => v,
            Err(_) => continue,
        };
        let id: Uuid = match row.try_get("content_id") {
            Ok(v) => v,
            Err(_) => continue,
        };
        match ContentType::parse(&ct) {
            Some(content_type) => refs.push(ContentRef::new(content_type, id)),
            None => warn!(content_type = %ct, "Skipping row with unknown content type"),
        }
    }
    refs
}

fn parse_samples(rows: Vec<sqlx::postgres::PgRow>) -> Vec<InteractionSample> {
    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        let parsed = (|| -> Option<InteractionSample> {
            let user_id: Uuid = row.try_get("user_id").ok()?;
            let ct: String = row.try_get("content_type").ok()?;
            let content_id: Uuid = row.try_get("content_id").ok()?;
            let it: String = row.try_get("interaction_type").ok()?;
            let created_at: DateTime<Utc> = row.try_get("created_at").ok()?;
            Some(InteractionSample {
                user_id,
                content: ContentRef::new(ContentType::parse(&ct)?, content_id),
                interaction_type: InteractionType::parse(&it)?,
                created_at,
            })
        })();

        match parsed {
            Some(sample) => samples.push(sample),
            None => warn!("Skipping malformed interaction row"),
        }
    }
    samples
}
