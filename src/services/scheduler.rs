//! Lifecycle scheduler: the periodic tick that closes expired games and the
//! finalize job handler that archives revealed ones.
//!
//! Both handlers assume at-least-once invocation: candidates are claimed
//! atomically from their sorted sets, and a game found in an unexpected
//! phase is treated as already processed.

use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{game::GameRepository, models::now_ms},
    error::ServiceError,
    services::lifecycle,
    state::{SharedState, phase::GamePhase},
};

/// What a single tick accomplished.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Games moved from Active to Reveal.
    pub advanced: Vec<Uuid>,
    /// Claimed games that were already past Active (racing tick, replay).
    pub already_processed: usize,
    /// Claimed games whose transition failed and was requeued.
    pub requeued: usize,
}

/// What a finalize pass accomplished.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FinalizeOutcome {
    /// Games moved from Reveal to Archived.
    pub archived: Vec<Uuid>,
    /// Jobs that fired for games no longer in Reveal (duplicate delivery).
    pub already_processed: usize,
    /// Jobs whose transition failed and was requeued.
    pub requeued: usize,
}

/// Advance every Active game whose end time has passed to Reveal and
/// schedule its finalize job.
///
/// Claiming removes candidates from the schedule atomically, so overlapping
/// ticks never double-process a game. Running the tick twice with no newly
/// expired games is a no-op.
pub async fn tick(state: &SharedState) -> Result<TickOutcome, ServiceError> {
    let repo = state.repository().await?;
    let now = now_ms();

    let due = repo.claim_due_schedule(now).await?;
    let mut outcome = TickOutcome::default();

    for game_id in due {
        let game = match repo.find_game(game_id).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                warn!(game_id = %game_id, "scheduled game no longer exists; dropping");
                outcome.already_processed += 1;
                continue;
            }
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "failed to load scheduled game; requeueing");
                requeue_schedule(&repo, game_id, now).await;
                outcome.requeued += 1;
                continue;
            }
        };

        let mut record = game.record;
        if record.state != GamePhase::Active {
            debug!(game_id = %game_id, state = %record.state, "game already advanced; nothing to do");
            outcome.already_processed += 1;
            continue;
        }

        let reveal_at = record.reveal_at;
        match lifecycle::transition(&repo, &mut record, GamePhase::Reveal).await {
            Ok(()) => {
                if let Err(err) = repo.enqueue_finalize(game_id, reveal_at).await {
                    warn!(game_id = %game_id, error = %err, "failed to enqueue finalize job");
                }
                info!(game_id = %game_id, "guessing closed; game moved to reveal");
                outcome.advanced.push(game_id);
            }
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "reveal transition failed; requeueing");
                requeue_schedule(&repo, game_id, now).await;
                outcome.requeued += 1;
            }
        }
    }

    Ok(outcome)
}

/// Run every finalize job whose scheduled time has passed.
///
/// A job firing for a game that is not in Reveal is a successful no-op;
/// that is what makes duplicate delivery harmless.
pub async fn run_due_finalize_jobs(state: &SharedState) -> Result<FinalizeOutcome, ServiceError> {
    let repo = state.repository().await?;
    let now = now_ms();

    let due = repo.claim_due_finalize(now).await?;
    let mut outcome = FinalizeOutcome::default();

    for game_id in due {
        let game = match repo.find_game(game_id).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                warn!(game_id = %game_id, "finalize job references a missing game; dropping");
                outcome.already_processed += 1;
                continue;
            }
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "failed to load game for finalize; requeueing");
                requeue_finalize(&repo, game_id, now).await;
                outcome.requeued += 1;
                continue;
            }
        };

        let mut record = game.record;
        if record.state != GamePhase::Reveal {
            debug!(game_id = %game_id, state = %record.state, "finalize job already applied");
            outcome.already_processed += 1;
            continue;
        }

        match lifecycle::transition(&repo, &mut record, GamePhase::Archived).await {
            Ok(()) => {
                info!(game_id = %game_id, "game archived");
                outcome.archived.push(game_id);
            }
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "archive transition failed; requeueing");
                requeue_finalize(&repo, game_id, now).await;
                outcome.requeued += 1;
            }
        }
    }

    Ok(outcome)
}

/// Drive the tick and the finalize handler forever at the configured period.
pub async fn run_scheduler_loop(state: SharedState) {
    let mut ticker = interval(state.config().tick_interval());

    loop {
        ticker.tick().await;

        match tick(&state).await {
            Ok(outcome) if !outcome.advanced.is_empty() => {
                info!(advanced = outcome.advanced.len(), "lifecycle tick complete");
            }
            Ok(_) => {}
            Err(ServiceError::Degraded) => {
                debug!("skipping lifecycle tick while degraded");
            }
            Err(err) => warn!(error = %err, "lifecycle tick failed"),
        }

        match run_due_finalize_jobs(&state).await {
            Ok(outcome) if !outcome.archived.is_empty() => {
                info!(archived = outcome.archived.len(), "finalize pass complete");
            }
            Ok(_) => {}
            Err(ServiceError::Degraded) => {}
            Err(err) => warn!(error = %err, "finalize pass failed"),
        }
    }
}

async fn requeue_schedule(repo: &GameRepository, game_id: Uuid, end_time: u64) {
    if let Err(err) = repo.requeue_schedule(game_id, end_time).await {
        warn!(game_id = %game_id, error = %err, "failed to requeue schedule entry");
    }
}

async fn requeue_finalize(repo: &GameRepository, game_id: Uuid, run_at: u64) {
    if let Err(err) = repo.requeue_finalize(game_id, run_at).await {
        warn!(game_id = %game_id, error = %err, "failed to requeue finalize job");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lifecycle::tests::{published_game, test_state};

    /// Rewrite a game's timing so it is already expired, both in the record
    /// and in the schedule index.
    async fn expire_game(state: &SharedState, game_id: Uuid) {
        let repo = state.repository().await.unwrap();
        let mut record = repo.find_game(game_id).await.unwrap().unwrap().record;
        record.end_time = now_ms() - 10_000;
        record.reveal_at = now_ms() - 5_000;
        repo.save_game(&record).await.unwrap();
        repo.requeue_schedule(game_id, record.end_time).await.unwrap();
    }

    #[tokio::test]
    async fn tick_advances_expired_games_and_schedules_finalize() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        expire_game(&state, game_id).await;

        let outcome = tick(&state).await.unwrap();
        assert_eq!(outcome.advanced, vec![game_id]);

        let repo = state.repository().await.unwrap();
        let record = repo.find_game(game_id).await.unwrap().unwrap().record;
        assert_eq!(record.state, GamePhase::Reveal);

        // The finalize job fires (its run time is already past) and archives.
        let finalize = run_due_finalize_jobs(&state).await.unwrap();
        assert_eq!(finalize.archived, vec![game_id]);

        let record = repo.find_game(game_id).await.unwrap().unwrap().record;
        assert_eq!(record.state, GamePhase::Archived);
    }

    #[tokio::test]
    async fn tick_ignores_games_still_running() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        let outcome = tick(&state).await.unwrap();
        assert!(outcome.advanced.is_empty());

        let repo = state.repository().await.unwrap();
        let record = repo.find_game(game_id).await.unwrap().unwrap().record;
        assert_eq!(record.state, GamePhase::Active);
    }

    #[tokio::test]
    async fn back_to_back_ticks_do_not_double_process() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        expire_game(&state, game_id).await;

        let first = tick(&state).await.unwrap();
        assert_eq!(first.advanced, vec![game_id]);

        let second = tick(&state).await.unwrap();
        assert_eq!(second, TickOutcome::default());
    }

    #[tokio::test]
    async fn duplicate_finalize_delivery_is_a_noop() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        expire_game(&state, game_id).await;

        tick(&state).await.unwrap();
        let first = run_due_finalize_jobs(&state).await.unwrap();
        assert_eq!(first.archived, vec![game_id]);

        // Simulate the scheduler redelivering the same job.
        let repo = state.repository().await.unwrap();
        repo.enqueue_finalize(game_id, now_ms() - 1_000).await.unwrap();

        let second = run_due_finalize_jobs(&state).await.unwrap();
        assert!(second.archived.is_empty());
        assert_eq!(second.already_processed, 1);

        let record = repo.find_game(game_id).await.unwrap().unwrap().record;
        assert_eq!(record.state, GamePhase::Archived);
    }
}
