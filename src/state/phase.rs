use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Phase a published game is in. Games only ever move forward:
/// `Active -> Reveal -> Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Guessing window is open.
    Active,
    /// Guessing is closed; the target and scores are being shown.
    Reveal,
    /// Round is over and kept for posterity.
    Archived,
}

impl GamePhase {
    /// All phases, in lifecycle order.
    pub const ALL: [GamePhase; 3] = [GamePhase::Active, GamePhase::Reveal, GamePhase::Archived];

    /// Stable string form used in persisted records and index keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Active => "active",
            GamePhase::Reveal => "reveal",
            GamePhase::Archived => "archived",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for phase strings loaded from the store that name no known phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game phase `{0}`")]
pub struct UnknownPhase(pub String);

impl FromStr for GamePhase {
    type Err = UnknownPhase;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(GamePhase::Active),
            "reveal" => Ok(GamePhase::Reveal),
            "archived" => Ok(GamePhase::Archived),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

/// Error returned when attempting an invalid phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: cannot move from {from} to {to}")]
pub struct InvalidTransition {
    /// Phase the game was in when the transition was requested.
    pub from: GamePhase,
    /// Requested next phase.
    pub to: GamePhase,
}

/// Validate that `from -> to` is a legal forward step.
///
/// Same-state and backward moves are rejected, as is skipping Reveal.
pub fn validate_transition(from: GamePhase, to: GamePhase) -> Result<(), InvalidTransition> {
    match (from, to) {
        (GamePhase::Active, GamePhase::Reveal) => Ok(()),
        (GamePhase::Reveal, GamePhase::Archived) => Ok(()),
        (from, to) => Err(InvalidTransition { from, to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_steps_are_legal() {
        assert!(validate_transition(GamePhase::Active, GamePhase::Reveal).is_ok());
        assert!(validate_transition(GamePhase::Reveal, GamePhase::Archived).is_ok());
    }

    #[test]
    fn same_state_is_rejected() {
        for phase in GamePhase::ALL {
            let err = validate_transition(phase, phase).unwrap_err();
            assert_eq!(err.from, phase);
            assert_eq!(err.to, phase);
        }
    }

    #[test]
    fn backward_and_skipping_steps_are_rejected() {
        assert!(validate_transition(GamePhase::Reveal, GamePhase::Active).is_err());
        assert!(validate_transition(GamePhase::Archived, GamePhase::Reveal).is_err());
        assert!(validate_transition(GamePhase::Archived, GamePhase::Active).is_err());
        assert!(validate_transition(GamePhase::Active, GamePhase::Archived).is_err());
    }

    #[test]
    fn phase_strings_round_trip() {
        for phase in GamePhase::ALL {
            assert_eq!(phase.as_str().parse::<GamePhase>().unwrap(), phase);
        }
        assert!("paused".parse::<GamePhase>().is_err());
    }
}
