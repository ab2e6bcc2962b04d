use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{ContentRef, TrendingWindow};

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub items: Vec<TrendingResponseItem>,
    pub window: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponseItem {
    pub rank: usize,
    #[serde(flatten)]
    pub content: ContentRef,
    pub score: f64,
    pub interactions: usize,
    pub unique_users: usize,
}

/// Non-personalized trending surface (guest browsing, debugging)
#[get("/trending")]
pub async fn get_trending(
    query: web::Query<TrendingQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let window = match query.window.as_deref() {
        Some(raw) => TrendingWindow::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid window '{}'. Must be one of: 1h, 6h, 24h, 7d",
                raw
            ))
        })?,
        None => TrendingWindow::TwentyFourHours,
    };
    let limit = query.limit.clamp(1, 100);

    let items: Vec<TrendingResponseItem> = state
        .trending
        .top(window, limit)
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| TrendingResponseItem {
            rank: idx + 1,
            content: entry.content,
            score: entry.score,
            interactions: entry.interactions,
            unique_users: entry.unique_users,
        })
        .collect();

    Ok(HttpResponse::Ok().json(TrendingResponse {
        items,
        window: window.to_string(),
        computed_at: state.trending.computed_at(),
    }))
}
