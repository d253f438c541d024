use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError, services::publisher::PublishError, state::phase::InvalidTransition,
};

/// Stable error codes surfaced in HTTP error bodies.
pub mod codes {
    #![allow(missing_docs)]

    pub const DRAFT_NOT_FOUND: &str = "DRAFT_NOT_FOUND";
    pub const DRAFT_CONSUMED: &str = "DRAFT_CONSUMED";
    pub const DRAFT_OWNERSHIP_MISMATCH: &str = "DRAFT_OWNERSHIP_MISMATCH";
    pub const CLUE_INVALID: &str = "CLUE_INVALID";
    pub const DURATION_INVALID: &str = "DURATION_INVALID";
    pub const GUESS_OUT_OF_RANGE: &str = "GUESS_OUT_OF_RANGE";
    pub const JUSTIFICATION_TOO_LONG: &str = "JUSTIFICATION_TOO_LONG";
    pub const DUPLICATE_GUESS: &str = "DUPLICATE_GUESS";
    pub const PHASE_INVALID: &str = "PHASE_INVALID";
    pub const GAME_EXPIRED: &str = "GAME_EXPIRED";
    pub const GAME_NOT_FOUND: &str = "GAME_NOT_FOUND";
    pub const SPECTRUM_NOT_FOUND: &str = "SPECTRUM_NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const POST_CREATION_FAILED: &str = "POST_CREATION_FAILED";
    pub const DATA_INTEGRITY: &str = "DATA_INTEGRITY";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// A persisted record is malformed or references missing data.
    #[error("data integrity violation: {0}")]
    Integrity(String),
    /// No draft exists under the given id.
    #[error("draft `{0}` not found")]
    DraftNotFound(Uuid),
    /// The draft was already published or its TTL elapsed.
    #[error("draft `{0}` was already consumed or has expired")]
    DraftConsumed(Uuid),
    /// The publishing caller does not own the draft.
    #[error("draft belongs to a different host")]
    DraftOwnershipMismatch,
    /// The clue failed validation.
    #[error("invalid clue: {0}")]
    ClueInvalid(String),
    /// The requested duration is outside the allowed window.
    #[error("invalid duration: {0}")]
    DurationInvalid(String),
    /// Guess value outside the spectrum bounds.
    #[error("guess value {0} is outside 0..=100")]
    GuessOutOfRange(i64),
    /// Justification exceeds the allowed length.
    #[error("justification exceeds {max} characters")]
    JustificationTooLong { max: usize },
    /// The user already guessed on this game.
    #[error("user already submitted a guess for this game")]
    DuplicateGuess,
    /// Operation cannot be performed in the game's current phase.
    #[error("invalid phase: {0}")]
    PhaseInvalid(String),
    /// The guessing window closed even though the phase has not advanced yet.
    #[error("the guessing window for this game has closed")]
    GameExpired,
    /// No game exists under the given id.
    #[error("game `{0}` not found")]
    GameNotFound(Uuid),
    /// No spectrum matched the requested filters.
    #[error("no spectrum matches the requested filters")]
    SpectrumNotFound,
    /// Request carried no resolvable identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// External post creation failed; nothing was persisted.
    #[error("post creation failed")]
    PublishFailed(#[source] PublishError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Integrity { ref key, ref message } => {
                ServiceError::Integrity(format!("{key}: {message}"))
            }
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::PhaseInvalid(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: String,
    },
    /// Unauthorized access attempt.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    /// Requested resource not found.
    #[error("not found: {message}")]
    NotFound {
        code: &'static str,
        message: String,
    },
    /// Conflict with current state.
    #[error("conflict: {message}")]
    Conflict {
        code: &'static str,
        message: String,
    },
    /// Service unavailable or degraded.
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },
    /// Integrity violation or failing external collaborator.
    #[error("internal error: {message}")]
    Internal {
        code: &'static str,
        message: String,
    },
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                AppError::ServiceUnavailable { message }
            }
            ServiceError::Integrity(_) => AppError::Internal {
                code: codes::DATA_INTEGRITY,
                message,
            },
            ServiceError::DraftNotFound(_) => AppError::NotFound {
                code: codes::DRAFT_NOT_FOUND,
                message,
            },
            ServiceError::DraftConsumed(_) => AppError::Conflict {
                code: codes::DRAFT_CONSUMED,
                message,
            },
            ServiceError::DraftOwnershipMismatch => AppError::Unauthorized { message },
            ServiceError::ClueInvalid(_) => AppError::BadRequest {
                code: codes::CLUE_INVALID,
                message,
            },
            ServiceError::DurationInvalid(_) => AppError::BadRequest {
                code: codes::DURATION_INVALID,
                message,
            },
            ServiceError::GuessOutOfRange(_) => AppError::BadRequest {
                code: codes::GUESS_OUT_OF_RANGE,
                message,
            },
            ServiceError::JustificationTooLong { .. } => AppError::BadRequest {
                code: codes::JUSTIFICATION_TOO_LONG,
                message,
            },
            ServiceError::DuplicateGuess => AppError::Conflict {
                code: codes::DUPLICATE_GUESS,
                message,
            },
            ServiceError::PhaseInvalid(_) => AppError::Conflict {
                code: codes::PHASE_INVALID,
                message,
            },
            ServiceError::GameExpired => AppError::Conflict {
                code: codes::GAME_EXPIRED,
                message,
            },
            ServiceError::GameNotFound(_) => AppError::NotFound {
                code: codes::GAME_NOT_FOUND,
                message,
            },
            ServiceError::SpectrumNotFound => AppError::NotFound {
                code: codes::SPECTRUM_NOT_FOUND,
                message,
            },
            ServiceError::Unauthorized(_) => AppError::Unauthorized { message },
            ServiceError::PublishFailed(_) => AppError::Internal {
                code: codes::POST_CREATION_FAILED,
                message,
            },
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let fields = err.field_errors();
        let code = if fields.contains_key("clue") {
            codes::CLUE_INVALID
        } else if fields.contains_key("duration_minutes") {
            codes::DURATION_INVALID
        } else if fields.contains_key("justification") {
            codes::JUSTIFICATION_TOO_LONG
        } else {
            codes::VALIDATION_FAILED
        };

        AppError::BadRequest {
            code,
            message: format!("validation failed: {err}"),
        }
    }
}

/// Structured error body every failing route returns.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable code, see [`codes`].
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Internal { code, .. } => code,
            AppError::Unauthorized { .. } => codes::UNAUTHORIZED,
            AppError::ServiceUnavailable { .. } => codes::STORE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_guess_maps_to_conflict_with_code() {
        let app: AppError = ServiceError::DuplicateGuess.into();
        assert_eq!(app.code(), codes::DUPLICATE_GUESS);
        assert!(matches!(app, AppError::Conflict { .. }));
    }

    #[test]
    fn integrity_maps_to_internal_not_not_found() {
        let storage = StorageError::integrity("game:x", "missing field `state`");
        let service: ServiceError = storage.into();
        assert!(matches!(service, ServiceError::Integrity(_)));

        let app: AppError = service.into();
        assert_eq!(app.code(), codes::DATA_INTEGRITY);
        assert!(matches!(app, AppError::Internal { .. }));
    }

    #[test]
    fn ownership_mismatch_is_unauthorized() {
        let app: AppError = ServiceError::DraftOwnershipMismatch.into();
        assert_eq!(app.code(), codes::UNAUTHORIZED);
    }
}
