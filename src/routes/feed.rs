use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    dto::game::FeedResponse, error::AppError, services::lifecycle, state::SharedState,
};

/// Routes serving the public feed of Active games.
pub fn router() -> Router<SharedState> {
    Router::new().route("/feed", get(feed))
}

/// Pagination query for the feed.
#[derive(Debug, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<usize>,
    /// Page size, capped server-side.
    #[serde(default)]
    pub per_page: Option<usize>,
}

/// List Active games, newest first.
#[utoipa::path(
    get,
    path = "/feed",
    tag = "game",
    params(FeedQuery),
    responses(
        (status = 200, description = "One page of active games", body = FeedResponse)
    )
)]
pub async fn feed(
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let page = query.page.unwrap_or(1);
    let per_page = query
        .per_page
        .unwrap_or(lifecycle::FEED_DEFAULT_PER_PAGE);
    let response = lifecycle::feed(&state, page, per_page).await?;
    Ok(Json(response))
}
