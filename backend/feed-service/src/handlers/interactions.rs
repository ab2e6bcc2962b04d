use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::models::{ContentRef, ContentType, InteractionType, UserInteraction};

/// Track request. `id` is the caller-supplied idempotency key; omitted
/// ids get one minted here (retries of such requests are not deduped).
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub content_type: ContentType,
    pub content_id: Uuid,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub time_spent_secs: Option<u32>,
    #[serde(default)]
    pub scroll_depth: Option<f32>,
}

/// Fire-and-forget from the caller's perspective: the event is queued and
/// acknowledged; processing happens asynchronously in the worker pool.
#[post("/interactions/track")]
pub async fn track_interaction(
    body: web::Json<TrackRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    let event_id = request.id.unwrap_or_else(Uuid::new_v4);

    let interaction = UserInteraction {
        id: event_id,
        user_id: request.user_id,
        content: ContentRef::new(request.content_type, request.content_id),
        interaction_type: request.interaction_type,
        time_spent_secs: request.time_spent_secs,
        scroll_depth: request.scroll_depth,
        created_at: Utc::now(),
    };

    debug!(
        event_id = %event_id,
        user_id = %interaction.user_id,
        interaction_type = %interaction.interaction_type,
        "Tracking interaction"
    );

    state.ingestion.enqueue(interaction).await?;

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "status": "accepted",
        "event_id": event_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_request_minimal() {
        let raw = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "content_type": "event",
            "content_id": Uuid::new_v4(),
            "interaction_type": "click_through"
        });
        let request: TrackRequest = serde_json::from_value(raw).unwrap();
        assert!(request.id.is_none());
        assert_eq!(request.interaction_type, InteractionType::ClickThrough);
    }
}
