use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        draft::{CreateDraftRequest, DraftView},
        game::{GameDetailView, GameView, PublishGameRequest},
        identity::{Identity, MaybeIdentity},
    },
    error::AppError,
    services::lifecycle,
    state::SharedState,
};

/// Routes handling draft issuance, publishing, and game fetches.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/drafts", post(create_draft))
        .route("/games", post(publish_game))
        .route("/games/{id}", get(get_game))
}

/// Issue a draft holding a random spectrum and hidden target.
#[utoipa::path(
    post,
    path = "/drafts",
    tag = "game",
    request_body = CreateDraftRequest,
    responses(
        (status = 200, description = "Draft created", body = DraftView),
        (status = 401, description = "Missing identity", body = crate::error::ErrorBody)
    )
)]
pub async fn create_draft(
    State(state): State<SharedState>,
    identity: Identity,
    payload: Option<Json<CreateDraftRequest>>,
) -> Result<Json<DraftView>, AppError> {
    let filters = payload.map(|Json(body)| body).unwrap_or_default();
    let draft = lifecycle::create_draft(&state, &identity, filters).await?;
    Ok(Json(draft))
}

/// Publish a draft as a live game with a clue and a guessing window.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = PublishGameRequest,
    responses(
        (status = 200, description = "Game published", body = GameView),
        (status = 404, description = "Draft not found", body = crate::error::ErrorBody),
        (status = 409, description = "Draft consumed or expired", body = crate::error::ErrorBody)
    )
)]
pub async fn publish_game(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<PublishGameRequest>,
) -> Result<Json<GameView>, AppError> {
    payload.validate()?;
    let game = lifecycle::publish(&state, &identity, payload).await?;
    Ok(Json(game))
}

/// Fetch a game's metadata and live guess list.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game found", body = GameDetailView),
        (status = 404, description = "Game not found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    MaybeIdentity(viewer): MaybeIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<GameDetailView>, AppError> {
    let detail = lifecycle::get_game(&state, id, viewer.as_ref()).await?;
    Ok(Json(detail))
}
