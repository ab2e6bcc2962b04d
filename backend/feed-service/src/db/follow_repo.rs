use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;

/// Read view over explicit organization follows
pub struct FollowRepo {
    pool: PgPool,
}

impl FollowRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn followed_organizations(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT organization_id
            FROM organization_follows
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orgs = Vec::with_capacity(rows.len());
        for row in rows {
            orgs.push(row.try_get("organization_id")?);
        }
        Ok(orgs)
    }
}
