use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Hive Mind Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_draft,
        crate::routes::game::publish_game,
        crate::routes::game::get_game,
        crate::routes::guess::submit_guess,
        crate::routes::feed::feed,
        crate::routes::results::get_results,
        crate::routes::internal::trigger_tick,
        crate::routes::internal::trigger_finalize,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::draft::CreateDraftRequest,
            crate::dto::draft::DraftView,
            crate::dto::game::PublishGameRequest,
            crate::dto::game::GameView,
            crate::dto::game::GameDetailView,
            crate::dto::game::FeedResponse,
            crate::dto::guess::SubmitGuessRequest,
            crate::dto::guess::GuessView,
            crate::dto::results::ScoreSummary,
            crate::dto::results::PlayerScoreView,
            crate::dto::results::HostScoreView,
            crate::dto::results::HistogramBucket,
            crate::dto::results::ConsensusView,
            crate::dto::results::ConsensusLabel,
            crate::dto::results::AccoladeAward,
            crate::dto::results::AccoladeKind,
            crate::routes::internal::TickResponse,
            crate::routes::internal::FinalizeResponse,
            crate::error::ErrorBody,
            crate::catalog::Spectrum,
            crate::state::phase::GamePhase,
            crate::dao::models::GuessSource,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Draft issuance, publishing, and the public feed"),
        (name = "guess", description = "Guess submission"),
        (name = "results", description = "Final scoring and consensus"),
        (name = "internal", description = "Scheduler triggers, not part of the public API"),
    )
)]
pub struct ApiDoc;
