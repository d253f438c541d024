use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    catalog::Spectrum,
    dao::game::HydratedGame,
    dto::{format_epoch_ms, guess::GuessView, validation::validate_clue},
    state::phase::GamePhase,
};

/// Payload used to publish a draft as a live game.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishGameRequest {
    /// Draft to consume.
    pub draft_id: Uuid,
    /// The host's clue pointing at the secret target.
    pub clue: String,
    /// Guessing window length in minutes.
    pub duration_minutes: u64,
}

impl Validate for PublishGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_clue(&self.clue) {
            errors.add("clue", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Public projection of a game's metadata.
///
/// The secret target is omitted for everyone but the host until the game is
/// archived; the running median is omitted while guessing is open.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    /// Game identifier.
    pub game_id: Uuid,
    /// Display name of the host.
    pub host_username: String,
    /// The host's clue.
    pub clue: String,
    /// Current lifecycle phase.
    pub state: GamePhase,
    /// Spectrum the round is played on.
    pub spectrum: Spectrum,
    /// When guessing opened, RFC 3339.
    pub start_time: String,
    /// When guessing closes, RFC 3339.
    pub end_time: String,
    /// When the round is archived, RFC 3339.
    pub reveal_at: String,
    /// Publication time, RFC 3339.
    pub published_at: String,
    /// Number of players who have guessed.
    pub total_participants: u64,
    /// Running median of all guesses; hidden while the game is Active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_guess: Option<u8>,
    /// The secret target; host-only until the game is archived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_target: Option<u8>,
    /// Permalink of the public post, if one was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
}

impl GameView {
    /// Project a hydrated game for a viewer, hiding fields the viewer must
    /// not see in the current phase.
    pub fn for_viewer(game: HydratedGame, viewer_is_host: bool) -> Self {
        let HydratedGame { record, spectrum } = game;

        let secret_target = (viewer_is_host || record.state == GamePhase::Archived)
            .then_some(record.secret_target);
        let median_guess = (record.state != GamePhase::Active)
            .then_some(record.median_guess)
            .flatten();

        Self {
            game_id: record.game_id,
            host_username: record.host_username,
            clue: record.clue,
            state: record.state,
            spectrum,
            start_time: format_epoch_ms(record.start_time),
            end_time: format_epoch_ms(record.end_time),
            reveal_at: format_epoch_ms(record.reveal_at),
            published_at: format_epoch_ms(record.published_at),
            total_participants: record.total_participants,
            median_guess,
            secret_target,
            post_url: record.post_url,
        }
    }
}

/// A game's metadata together with its live guess list.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameDetailView {
    /// Viewer-aware metadata projection.
    #[serde(flatten)]
    pub game: GameView,
    /// All guesses submitted so far, ascending by value.
    pub guesses: Vec<GuessView>,
}

/// One page of the Active-games feed.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedResponse {
    /// Games on this page, newest first.
    pub games: Vec<GameView>,
    /// Page number, starting at 1.
    pub page: usize,
    /// Page size used.
    pub per_page: usize,
    /// Total number of Active games.
    pub total: u64,
}
