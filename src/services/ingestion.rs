//! Guess ingestion: validation, duplicate rejection, persistence, and the
//! participant-count/median refresh that follows every accepted guess.

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{
        GameRecord, GuessRecord, GuessSource, MAX_GUESS_VALUE, MIN_GUESS_VALUE, MedianFreshness,
        MedianSnapshot, now_ms,
    },
    dto::{
        guess::{GuessView, SubmitGuessRequest},
        identity::Identity,
        validation::{JUSTIFICATION_MAX_CHARS, validate_justification},
    },
    error::ServiceError,
    state::{SharedState, phase::GamePhase},
};

/// Submit a guess on an Active game.
///
/// The range check runs before any store access; the duplicate check is a
/// conditional write on the per-game guesser map, so two concurrent
/// submissions from the same user cannot both pass it.
pub async fn submit_guess(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
    request: SubmitGuessRequest,
) -> Result<GuessView, ServiceError> {
    if request.value < MIN_GUESS_VALUE as i64 || request.value > MAX_GUESS_VALUE as i64 {
        return Err(ServiceError::GuessOutOfRange(request.value));
    }
    let value = request.value as u8;

    let justification = request
        .justification
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    if let Some(ref text) = justification {
        validate_justification(text).map_err(|_| ServiceError::JustificationTooLong {
            max: JUSTIFICATION_MAX_CHARS,
        })?;
    }

    let repo = state.repository().await?;
    let now = now_ms();

    let game = repo
        .find_game(game_id)
        .await?
        .ok_or(ServiceError::GameNotFound(game_id))?;
    let mut record = game.record;

    if record.state != GamePhase::Active {
        return Err(ServiceError::PhaseInvalid(format!(
            "guesses are only accepted while the game is active (currently {})",
            record.state
        )));
    }

    // The wall clock closes the window even when the scheduler has not
    // advanced the phase yet.
    if now > record.end_time {
        return Err(ServiceError::GameExpired);
    }

    let guess = GuessRecord {
        guess_id: Uuid::new_v4(),
        game_id,
        user_id: identity.user_id.clone(),
        username: identity.username.clone(),
        value,
        justification,
        created_at: now,
        source: GuessSource::Api,
        comment_ref: None,
    };

    let reserved = repo
        .try_index_guesser(game_id, &identity.user_id, guess.guess_id)
        .await?;
    if !reserved {
        return Err(ServiceError::DuplicateGuess);
    }

    if let Err(err) = repo.save_guess(&guess).await {
        // Release the reservation so the user can retry.
        if let Err(cleanup) = repo.unindex_guesser(game_id, &identity.user_id).await {
            warn!(game_id = %game_id, user_id = %identity.user_id, error = %cleanup,
                "failed to release guesser slot after write failure");
        }
        return Err(err.into());
    }

    refresh_median(state, &mut record).await?;

    Ok(guess.into())
}

/// Recompute the participant count and median from the guess set and fold
/// them back into the game record and the cached snapshot.
pub async fn refresh_median(
    state: &SharedState,
    record: &mut GameRecord,
) -> Result<(), ServiceError> {
    let repo = state.repository().await?;
    let game_id = record.game_id;

    let count = repo.guess_count(game_id).await?;
    let values = repo.guess_values(game_id).await?;
    let median = median_of_sorted(&values);

    record.total_participants = count;
    record.median_guess = median;
    record.updated_at = now_ms();
    repo.save_game(record).await?;

    if let Some(median) = median {
        repo.write_median(&MedianSnapshot {
            game_id,
            median,
            calculated_at: record.updated_at,
            sample_size: count,
            freshness: MedianFreshness::Live,
        })
        .await?;
    }

    Ok(())
}

/// Median of values already sorted ascending: the middle element, or the
/// rounded mean of the two middle elements for even counts.
pub fn median_of_sorted(values: &[u8]) -> Option<u8> {
    if values.is_empty() {
        return None;
    }

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let low = values[mid - 1] as u16;
        let high = values[mid] as u16;
        Some(((low + high).div_ceil(2)) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lifecycle::tests::{published_game, test_state};

    fn player(n: u32) -> Identity {
        Identity {
            user_id: format!("u-{n}"),
            username: format!("player_{n}"),
        }
    }

    fn guess(value: i64) -> SubmitGuessRequest {
        SubmitGuessRequest {
            value,
            justification: Some("vibes".into()),
        }
    }

    #[test]
    fn median_of_sorted_matches_the_reference_cases() {
        assert_eq!(median_of_sorted(&[]), None);
        assert_eq!(median_of_sorted(&[42]), Some(42));
        assert_eq!(median_of_sorted(&[10, 90]), Some(50));
        assert_eq!(median_of_sorted(&[10, 20, 90]), Some(20));
        assert_eq!(median_of_sorted(&[0, 1]), Some(1));
    }

    #[tokio::test]
    async fn first_guess_succeeds_and_duplicate_is_rejected() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        let view = submit_guess(&state, &player(1), game_id, guess(72))
            .await
            .unwrap();
        assert_eq!(view.value, 72);

        let err = submit_guess(&state, &player(1), game_id, guess(72))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateGuess));
    }

    #[tokio::test]
    async fn out_of_range_guess_is_rejected_without_persisting() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        for value in [-1, 101, 1000] {
            let err = submit_guess(&state, &player(1), game_id, guess(value))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::GuessOutOfRange(_)));
        }

        let repo = state.repository().await.unwrap();
        assert_eq!(repo.guess_count(game_id).await.unwrap(), 0);
        // The same user can still guess afterwards.
        submit_guess(&state, &player(1), game_id, guess(100))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn participant_count_tracks_the_guess_set() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        for n in 1..=5 {
            submit_guess(&state, &player(n), game_id, guess((n * 13) as i64))
                .await
                .unwrap();

            let repo = state.repository().await.unwrap();
            let record = repo.find_game(game_id).await.unwrap().unwrap().record;
            assert_eq!(
                record.total_participants,
                repo.guess_count(game_id).await.unwrap()
            );
            assert_eq!(record.total_participants, n as u64);
        }
    }

    #[tokio::test]
    async fn median_snapshot_follows_inserts() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        let repo = state.repository().await.unwrap();

        submit_guess(&state, &player(1), game_id, guess(10))
            .await
            .unwrap();
        submit_guess(&state, &player(2), game_id, guess(90))
            .await
            .unwrap();

        let snapshot = repo.read_median(game_id).await.unwrap().unwrap();
        assert_eq!(snapshot.median, 50);
        assert_eq!(snapshot.sample_size, 2);

        submit_guess(&state, &player(3), game_id, guess(20))
            .await
            .unwrap();
        let snapshot = repo.read_median(game_id).await.unwrap().unwrap();
        assert_eq!(snapshot.median, 20);
        assert_eq!(snapshot.sample_size, 3);
    }

    #[tokio::test]
    async fn justification_is_optional_and_length_bounded() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        submit_guess(
            &state,
            &player(1),
            game_id,
            SubmitGuessRequest {
                value: 30,
                justification: None,
            },
        )
        .await
        .unwrap();

        let err = submit_guess(
            &state,
            &player(2),
            game_id,
            SubmitGuessRequest {
                value: 30,
                justification: Some("y".repeat(JUSTIFICATION_MAX_CHARS + 1)),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::JustificationTooLong { .. }));
    }

    #[tokio::test]
    async fn guesses_are_rejected_after_the_window_closes() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        // Force the stored end time into the past.
        let repo = state.repository().await.unwrap();
        let mut record = repo.find_game(game_id).await.unwrap().unwrap().record;
        record.end_time = now_ms() - 1_000;
        repo.save_game(&record).await.unwrap();

        let err = submit_guess(&state, &player(1), game_id, guess(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::GameExpired));
    }

    #[tokio::test]
    async fn guesses_are_rejected_outside_the_active_phase() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        let repo = state.repository().await.unwrap();

        let mut record = repo.find_game(game_id).await.unwrap().unwrap().record;
        crate::services::lifecycle::transition(&repo, &mut record, GamePhase::Reveal)
            .await
            .unwrap();

        let err = submit_guess(&state, &player(1), game_id, guess(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PhaseInvalid(_)));
    }
}
