use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{ContentType, FeedItem, GeoPoint};
use crate::services::feed::{FeedPageMetadata, FeedQuery};

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct FeedRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub content_types: Option<Vec<ContentType>>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub context: Option<RequestContext>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            cursor: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestContext {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub metadata: FeedPageMetadata,
}

#[post("/feed")]
pub async fn post_feed(
    body: web::Json<FeedRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    if request.pagination.limit == 0 {
        return Err(AppError::BadRequest("limit must be positive".to_string()));
    }
    if let Some(types) = &request.content_types {
        if types.is_empty() {
            return Err(AppError::BadRequest(
                "content_types must not be empty when provided".to_string(),
            ));
        }
    }

    let location = request.context.as_ref().and_then(|ctx| match (ctx.lat, ctx.lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    });

    debug!(
        user_id = %request.user_id,
        limit = request.pagination.limit,
        has_cursor = request.pagination.cursor.is_some(),
        "Feed request"
    );

    let query = FeedQuery {
        content_types: request.content_types,
        limit: request.pagination.limit,
        cursor: request.pagination.cursor,
        location,
    };

    let page = state.feed.generate_feed(request.user_id, &query).await?;

    Ok(HttpResponse::Ok().json(FeedResponse {
        items: page.items,
        next_cursor: page.next_cursor,
        metadata: page.metadata,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_request_deserializes_with_defaults() {
        let raw = serde_json::json!({ "user_id": Uuid::new_v4() });
        let request: FeedRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.pagination.limit, 20);
        assert!(request.pagination.cursor.is_none());
        assert!(request.content_types.is_none());
    }

    #[test]
    fn test_feed_request_with_filters() {
        let raw = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "content_types": ["event", "fundraiser"],
            "pagination": { "limit": 10, "cursor": "abc" },
            "context": { "lat": 40.7, "lng": -74.0 }
        });
        let request: FeedRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(
            request.content_types.unwrap(),
            vec![ContentType::Event, ContentType::Fundraiser]
        );
        assert_eq!(request.pagination.limit, 10);
        assert!(request.context.unwrap().lat.is_some());
    }
}
