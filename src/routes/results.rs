use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::results::ScoreSummary, error::AppError, services::scoring, state::SharedState,
};

/// Routes serving final results for revealed and archived games.
pub fn router() -> Router<SharedState> {
    Router::new().route("/games/{id}/results", get(get_results))
}

/// Compute the final results for a revealed or archived game.
#[utoipa::path(
    get,
    path = "/games/{id}/results",
    tag = "results",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Final results", body = ScoreSummary),
        (status = 404, description = "Game not found", body = crate::error::ErrorBody),
        (status = 409, description = "Game still accepting guesses", body = crate::error::ErrorBody)
    )
)]
pub async fn get_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoreSummary>, AppError> {
    let summary = scoring::compute_results(&state, id).await?;
    Ok(Json(summary))
}
