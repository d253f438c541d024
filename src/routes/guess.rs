use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        guess::{GuessView, SubmitGuessRequest},
        identity::Identity,
    },
    error::AppError,
    services::ingestion,
    state::SharedState,
};

/// Routes handling guess submission.
pub fn router() -> Router<SharedState> {
    Router::new().route("/games/{id}/guesses", post(submit_guess))
}

/// Submit a guess on an Active game. Each user gets exactly one.
#[utoipa::path(
    post,
    path = "/games/{id}/guesses",
    tag = "guess",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    request_body = SubmitGuessRequest,
    responses(
        (status = 200, description = "Guess recorded", body = GuessView),
        (status = 400, description = "Guess outside 0..=100", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate guess or closed game", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitGuessRequest>,
) -> Result<Json<GuessView>, AppError> {
    payload.validate()?;
    let guess = ingestion::submit_guess(&state, &identity, id, payload).await?;
    Ok(Json(guess))
}
