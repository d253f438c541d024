//! Internal scheduler triggers. Not part of the public API; exposed so the
//! platform's cron can drive the lifecycle and so operators can nudge it.

use axum::{Json, Router, extract::State, routing::post};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::scheduler::{self, FinalizeOutcome, TickOutcome},
    state::SharedState,
};

/// Routes for the internal scheduler surface.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/internal/scheduler/tick", post(trigger_tick))
        .route("/internal/scheduler/finalize", post(trigger_finalize))
}

/// Outcome of a manually triggered tick.
#[derive(Debug, Serialize, ToSchema)]
pub struct TickResponse {
    /// Games moved from Active to Reveal.
    pub advanced: Vec<Uuid>,
    /// Claimed entries that needed no work.
    pub already_processed: usize,
    /// Entries requeued after a failure.
    pub requeued: usize,
}

impl From<TickOutcome> for TickResponse {
    fn from(outcome: TickOutcome) -> Self {
        Self {
            advanced: outcome.advanced,
            already_processed: outcome.already_processed,
            requeued: outcome.requeued,
        }
    }
}

/// Outcome of a manually triggered finalize pass.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinalizeResponse {
    /// Games moved from Reveal to Archived.
    pub archived: Vec<Uuid>,
    /// Jobs that needed no work (duplicate delivery).
    pub already_processed: usize,
    /// Jobs requeued after a failure.
    pub requeued: usize,
}

impl From<FinalizeOutcome> for FinalizeResponse {
    fn from(outcome: FinalizeOutcome) -> Self {
        Self {
            archived: outcome.archived,
            already_processed: outcome.already_processed,
            requeued: outcome.requeued,
        }
    }
}

/// Run one lifecycle tick immediately.
#[utoipa::path(
    post,
    path = "/internal/scheduler/tick",
    tag = "internal",
    responses((status = 200, description = "Tick ran", body = TickResponse))
)]
pub async fn trigger_tick(
    State(state): State<SharedState>,
) -> Result<Json<TickResponse>, AppError> {
    let outcome = scheduler::tick(&state).await?;
    Ok(Json(outcome.into()))
}

/// Run due finalize jobs immediately.
#[utoipa::path(
    post,
    path = "/internal/scheduler/finalize",
    tag = "internal",
    responses((status = 200, description = "Finalize pass ran", body = FinalizeResponse))
)]
pub async fn trigger_finalize(
    State(state): State<SharedState>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let outcome = scheduler::run_due_finalize_jobs(&state).await?;
    Ok(Json(outcome.into()))
}
