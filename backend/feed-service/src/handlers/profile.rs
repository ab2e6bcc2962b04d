use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// Profile inspection endpoint, primarily for debugging and
/// explainability ("why am I seeing this feed").
#[get("/profile/{user_id}")]
pub async fn get_profile(
    path: web::Path<Uuid>,
    query: web::Query<ProfileQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let profile = state.affinity.get_profile(user_id, query.refresh).await?;
    Ok(HttpResponse::Ok().json(profile))
}
