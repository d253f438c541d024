use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{GuessRecord, GuessSource},
    dto::{format_epoch_ms, validation::validate_justification},
};

/// Payload used to submit a guess on an Active game.
///
/// The value is accepted as a plain integer so out-of-range submissions can
/// be answered with the range error instead of a deserialization failure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitGuessRequest {
    /// Placement on the spectrum; must be within 0..=100.
    pub value: i64,
    /// Optional reasoning shown alongside the guess.
    #[serde(default)]
    pub justification: Option<String>,
}

impl Validate for SubmitGuessRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref justification) = self.justification {
            if let Err(e) = validate_justification(justification) {
                errors.add("justification", e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Public projection of a single guess.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessView {
    /// Guess identifier.
    pub guess_id: Uuid,
    /// Guessing user's id.
    pub user_id: String,
    /// Guessing user's display name.
    pub username: String,
    /// Placement on the spectrum.
    pub value: u8,
    /// Optional reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// Submission time, RFC 3339.
    pub created_at: String,
    /// Where the guess came from.
    pub source: GuessSource,
}

impl From<GuessRecord> for GuessView {
    fn from(record: GuessRecord) -> Self {
        Self {
            guess_id: record.guess_id,
            user_id: record.user_id,
            username: record.username,
            value: record.value,
            justification: record.justification,
            created_at: format_epoch_ms(record.created_at),
            source: record.source,
        }
    }
}
