//! Logical key shapes for every record and index the repository keeps.

use uuid::Uuid;

use crate::state::phase::GamePhase;

/// Sorted set of Active game ids keyed by end time, consumed by the
/// lifecycle tick.
pub const SCHEDULE: &str = "games:schedule";

/// Sorted set of games awaiting finalization, keyed by the time the
/// finalize job should fire.
pub const FINALIZE_JOBS: &str = "jobs:finalize";

/// Hash holding a draft record.
pub fn draft(draft_id: Uuid) -> String {
    format!("draft:{draft_id}")
}

/// Hash holding a game metadata record.
pub fn game(game_id: Uuid) -> String {
    format!("game:{game_id}")
}

/// String key holding a serialized guess record.
pub fn guess(guess_id: Uuid) -> String {
    format!("guess:{guess_id}")
}

/// Per-phase membership set, scored by publication time.
pub fn phase_set(phase: GamePhase) -> String {
    format!("games:state:{phase}")
}

/// Per-game sorted set of guess ids, scored by guess value.
pub fn game_guesses(game_id: Uuid) -> String {
    format!("game:{game_id}:guesses")
}

/// Per-game hash mapping user id to guess id, the duplicate-check index.
pub fn game_guessers(game_id: Uuid) -> String {
    format!("game:{game_id}:guessers")
}

/// String key caching the latest median snapshot for a game.
pub fn game_median(game_id: Uuid) -> String {
    format!("game:{game_id}:median")
}
