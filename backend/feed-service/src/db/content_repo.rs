//! Content & Tag Read Views
//!
//! The engine never owns content; these queries run against read-only
//! views projected from the owning services (events, fundraisers,
//! organizations and their tag assignments).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ContentMetadata, ContentRef, ContentStatus, ContentTag, ContentType, GeoPoint, Tag,
};

/// A content item joined with one of its tag assignments
#[derive(Debug, Clone)]
pub struct TaggedContent {
    pub content: ContentRef,
    pub tag_id: Uuid,
    pub relevance: f64,
    pub created_at: DateTime<Utc>,
}

/// A geocoded content item for the location generator
#[derive(Debug, Clone)]
pub struct GeocodedContent {
    pub content: ContentRef,
    pub location: GeoPoint,
    pub created_at: DateTime<Utc>,
}

/// A content item attributed to its organization
#[derive(Debug, Clone)]
pub struct OrganizationContent {
    pub content: ContentRef,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
}

pub struct ContentRepo {
    pool: PgPool,
}

impl ContentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Weighted tag assignments for one content item
    pub async fn tags_for(&self, content: &ContentRef) -> Result<Vec<ContentTag>> {
        let rows = sqlx::query(
            r#"
            SELECT tag_id, relevance
            FROM content_tags
            WHERE content_type = $1 AND content_id = $2
            "#,
        )
        .bind(content.content_type.as_str())
        .bind(content.content_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(ContentTag {
                tag_id: row.try_get("tag_id")?,
                relevance: row.try_get("relevance")?,
            });
        }
        Ok(tags)
    }

    /// Batch metadata lookup keyed by content ref. Missing items are simply
    /// absent from the result; the caller decides whether that is fatal.
    pub async fn metadata_batch(
        &self,
        refs: &[ContentRef],
    ) -> Result<HashMap<ContentRef, ContentMetadata>> {
        let mut by_type: HashMap<ContentType, Vec<Uuid>> = HashMap::new();
        for r in refs {
            by_type.entry(r.content_type).or_default().push(r.content_id);
        }

        let mut result = HashMap::with_capacity(refs.len());
        for (content_type, ids) in by_type {
            let rows = sqlx::query(
                r#"
                SELECT content_id, organization_id, status, created_at, starts_at,
                       lat, lng, title, summary, image_url
                FROM content_items
                WHERE content_type = $1 AND content_id = ANY($2)
                "#,
            )
            .bind(content_type.as_str())
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                match parse_metadata(content_type, row) {
                    Some(meta) => {
                        result.insert(meta.content, meta);
                    }
                    None => warn!(content_type = %content_type, "Skipping malformed content row"),
                }
            }
        }
        Ok(result)
    }

    /// Eligible content created since `since` carrying any of the given tags
    pub async fn by_tags(
        &self,
        tag_ids: &[Uuid],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TaggedContent>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.tag_id, ct.relevance, c.content_type, c.content_id, c.created_at
            FROM content_tags ct
            JOIN content_items c
              ON c.content_type = ct.content_type AND c.content_id = ct.content_id
            WHERE ct.tag_id = ANY($1)
              AND c.status IN ('published', 'active')
              AND c.created_at >= $2
            ORDER BY c.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(tag_ids)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut tagged = Vec::with_capacity(rows.len());
        for row in rows {
            let ct: String = row.try_get("content_type")?;
            let Some(content_type) = ContentType::parse(&ct) else {
                continue;
            };
            tagged.push(TaggedContent {
                content: ContentRef::new(content_type, row.try_get("content_id")?),
                tag_id: row.try_get("tag_id")?,
                relevance: row.try_get("relevance")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(tagged)
    }

    /// Eligible content from tags in the given categories (exploration input)
    pub async fn by_categories(
        &self,
        category_ids: &[Uuid],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TaggedContent>> {
        let rows = sqlx::query(
            r#"
            SELECT ct.tag_id, ct.relevance, c.content_type, c.content_id, c.created_at
            FROM content_tags ct
            JOIN tags t ON t.id = ct.tag_id
            JOIN content_items c
              ON c.content_type = ct.content_type AND c.content_id = ct.content_id
            WHERE t.category_id = ANY($1)
              AND c.status IN ('published', 'active')
              AND c.created_at >= $2
            ORDER BY c.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(category_ids)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut tagged = Vec::with_capacity(rows.len());
        for row in rows {
            let ct: String = row.try_get("content_type")?;
            let Some(content_type) = ContentType::parse(&ct) else {
                continue;
            };
            tagged.push(TaggedContent {
                content: ContentRef::new(content_type, row.try_get("content_id")?),
                tag_id: row.try_get("tag_id")?,
                relevance: row.try_get("relevance")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(tagged)
    }

    /// Recent eligible content from the given organizations
    pub async fn by_organizations(
        &self,
        organization_ids: &[Uuid],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrganizationContent>> {
        let rows = sqlx::query(
            r#"
            SELECT content_type, content_id, organization_id, created_at
            FROM content_items
            WHERE organization_id = ANY($1)
              AND status IN ('published', 'active')
              AND created_at >= $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(organization_ids)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let ct: String = row.try_get("content_type")?;
            let Some(content_type) = ContentType::parse(&ct) else {
                continue;
            };
            items.push(OrganizationContent {
                content: ContentRef::new(content_type, row.try_get("content_id")?),
                organization_id: row.try_get("organization_id")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(items)
    }

    /// Recent eligible geocoded content. Distance filtering happens in the
    /// location generator; the query only narrows to rows that have
    /// coordinates at all.
    pub async fn geocoded_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<GeocodedContent>> {
        let rows = sqlx::query(
            r#"
            SELECT content_type, content_id, lat, lng, created_at
            FROM content_items
            WHERE lat IS NOT NULL AND lng IS NOT NULL
              AND status IN ('published', 'active')
              AND created_at >= $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let ct: String = row.try_get("content_type")?;
            let Some(content_type) = ContentType::parse(&ct) else {
                continue;
            };
            items.push(GeocodedContent {
                content: ContentRef::new(content_type, row.try_get("content_id")?),
                location: GeoPoint {
                    lat: row.try_get("lat")?,
                    lng: row.try_get("lng")?,
                },
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(items)
    }

    /// Full tag catalog (small reference table, cached by callers)
    pub async fn tag_catalog(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT id, category_id, name
            FROM tags
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(Tag {
                id: row.try_get("id")?,
                category_id: row.try_get("category_id")?,
                name: row.try_get("name")?,
            });
        }
        Ok(tags)
    }
}

fn parse_metadata(content_type: ContentType, row: sqlx::postgres::PgRow) -> Option<ContentMetadata> {
    let content_id: Uuid = row.try_get("content_id").ok()?;
    let status_raw: String = row.try_get("status").ok()?;
    let status = ContentStatus::parse(&status_raw)?;
    let lat: Option<f64> = row.try_get("lat").ok()?;
    let lng: Option<f64> = row.try_get("lng").ok()?;

    Some(ContentMetadata {
        content: ContentRef::new(content_type, content_id),
        organization_id: row.try_get("organization_id").ok()?,
        status,
        created_at: row.try_get("created_at").ok()?,
        starts_at: row.try_get("starts_at").ok()?,
        location: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        },
        title: row.try_get("title").ok()?,
        summary: row.try_get("summary").ok()?,
        image_url: row.try_get("image_url").ok()?,
    })
}
