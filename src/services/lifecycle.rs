//! Game lifecycle: draft issuance, publish, fetch, feed, and the validated
//! forward-only phase transition.

use rand::Rng;
use tracing::warn;
use uuid::Uuid;

use crate::{
    catalog::CatalogError,
    dao::{
        game::{GameRepository, HydratedGame},
        models::{DraftRecord, GameRecord, MAX_GUESS_VALUE, MIN_GUESS_VALUE, now_ms},
        storage::StorageError,
    },
    dto::{
        draft::{CreateDraftRequest, DraftView},
        game::{FeedResponse, GameDetailView, GameView, PublishGameRequest},
        identity::Identity,
        validation::validate_clue,
    },
    error::ServiceError,
    state::{
        SharedState,
        phase::{self, GamePhase},
    },
};

/// Default feed page size.
pub const FEED_DEFAULT_PER_PAGE: usize = 20;
/// Upper bound on the feed page size.
pub const FEED_MAX_PER_PAGE: usize = 100;

/// Issue a draft for the host: a random spectrum plus a hidden target.
pub async fn create_draft(
    state: &SharedState,
    identity: &Identity,
    request: CreateDraftRequest,
) -> Result<DraftView, ServiceError> {
    let repo = state.repository().await?;

    let spectrum = state
        .catalog()
        .pick_filtered(request.context.as_deref(), request.difficulty.as_deref())
        .await
        .map_err(|_| ServiceError::SpectrumNotFound)?;

    let now = now_ms();
    let draft = DraftRecord {
        draft_id: Uuid::new_v4(),
        host_user_id: identity.user_id.clone(),
        spectrum_id: spectrum.id.clone(),
        secret_target: rand::rng().random_range(MIN_GUESS_VALUE..=MAX_GUESS_VALUE),
        created_at: now,
        expires_at: now + state.config().draft_ttl().as_millis() as u64,
    };
    repo.save_draft(&draft).await?;

    Ok(DraftView::from_parts(draft, spectrum))
}

/// Publish a draft as a live game.
///
/// Ordered so that the external post is created before anything is
/// persisted and the draft is deleted last: a failure at any step leaves
/// the draft intact for retry, with best-effort compensating deletes
/// covering the partially persisted middle.
pub async fn publish(
    state: &SharedState,
    identity: &Identity,
    request: PublishGameRequest,
) -> Result<GameView, ServiceError> {
    let repo = state.repository().await?;
    let config = state.config();
    let now = now_ms();

    let draft = repo
        .find_draft(request.draft_id)
        .await?
        .ok_or(ServiceError::DraftNotFound(request.draft_id))?;

    if now > draft.expires_at {
        // Expired drafts are unpublishable; clean up opportunistically.
        if let Err(err) = repo.delete_draft(draft.draft_id).await {
            warn!(draft_id = %draft.draft_id, error = %err, "failed to delete expired draft");
        }
        return Err(ServiceError::DraftConsumed(draft.draft_id));
    }

    if draft.host_user_id != identity.user_id {
        return Err(ServiceError::DraftOwnershipMismatch);
    }

    let clue = request.clue.trim().to_string();
    validate_clue(&clue).map_err(|err| {
        ServiceError::ClueInvalid(err.message.map(|m| m.to_string()).unwrap_or_default())
    })?;

    if request.duration_minutes < config.min_duration_minutes
        || request.duration_minutes > config.max_duration_minutes
    {
        return Err(ServiceError::DurationInvalid(format!(
            "duration must be between {} and {} minutes",
            config.min_duration_minutes, config.max_duration_minutes
        )));
    }

    let spectrum = state
        .catalog()
        .resolve(&draft.spectrum_id)
        .await
        .map_err(|err| match err {
            CatalogError::UnknownSpectrum { id } => ServiceError::Integrity(format!(
                "draft `{}` references spectrum `{id}` missing from the catalog",
                draft.draft_id
            )),
            other => ServiceError::Integrity(other.to_string()),
        })?;

    let game_id = Uuid::new_v4();
    let end_time = now + request.duration_minutes * 60_000;
    let reveal_at = end_time + config.reveal_window().as_millis() as u64;

    // External post first: a platform failure must leave no partial game.
    let post = state
        .publisher()
        .create_post(crate::services::publisher::PostDraft {
            game_id,
            host_username: identity.username.clone(),
            clue: clue.clone(),
            left_label: spectrum.left_label.clone(),
            right_label: spectrum.right_label.clone(),
        })
        .await
        .map_err(ServiceError::PublishFailed)?;

    let record = GameRecord {
        game_id,
        host_user_id: draft.host_user_id.clone(),
        host_username: identity.username.clone(),
        clue,
        state: GamePhase::Active,
        spectrum_id: draft.spectrum_id.clone(),
        secret_target: draft.secret_target,
        start_time: now,
        end_time,
        reveal_at,
        created_at: now,
        updated_at: now,
        published_at: now,
        total_participants: 0,
        median_guess: None,
        post_ref: Some(post.post_id),
        post_url: Some(post.url),
    };

    if let Err(err) = repo.insert_game(&record).await {
        repo.rollback_insert_game(game_id).await;
        return Err(err.into());
    }

    // Consume the draft only once the game is fully visible.
    if let Err(err) = repo.delete_draft(draft.draft_id).await {
        warn!(draft_id = %draft.draft_id, error = %err, "published game but failed to delete draft");
    }

    Ok(GameView::for_viewer(
        HydratedGame { record, spectrum },
        false,
    ))
}

/// Apply a validated forward-only phase transition and move the game
/// between phase membership sets.
pub async fn transition(
    repo: &GameRepository,
    record: &mut GameRecord,
    next: GamePhase,
) -> Result<(), ServiceError> {
    phase::validate_transition(record.state, next)?;

    let from = record.state;
    record.state = next;
    record.updated_at = now_ms();

    repo.save_game(record).await?;
    repo.move_phase_membership(record.game_id, from, next, record.published_at)
        .await?;

    Ok(())
}

/// Fetch a game with its live guess list, hiding fields by viewer and phase.
pub async fn get_game(
    state: &SharedState,
    game_id: Uuid,
    viewer: Option<&Identity>,
) -> Result<GameDetailView, ServiceError> {
    let repo = state.repository().await?;

    let game = repo
        .find_game(game_id)
        .await?
        .ok_or(ServiceError::GameNotFound(game_id))?;

    let guesses = repo
        .load_guesses(game_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let viewer_is_host =
        viewer.map(|identity| identity.user_id == game.record.host_user_id) == Some(true);

    Ok(GameDetailView {
        game: GameView::for_viewer(game, viewer_is_host),
        guesses,
    })
}

/// One page of the Active-games feed, newest first. Individual malformed
/// entries are skipped with a warning rather than failing the whole page.
pub async fn feed(
    state: &SharedState,
    page: usize,
    per_page: usize,
) -> Result<FeedResponse, ServiceError> {
    let repo = state.repository().await?;

    let page = page.max(1);
    let per_page = per_page.clamp(1, FEED_MAX_PER_PAGE);

    let ids = repo.list_phase(GamePhase::Active).await?;
    let total = ids.len() as u64;

    let mut games = Vec::with_capacity(per_page);
    for game_id in ids.into_iter().skip((page - 1) * per_page).take(per_page) {
        match repo.find_game(game_id).await {
            Ok(Some(game)) => games.push(GameView::for_viewer(game, false)),
            Ok(None) => {
                warn!(game_id = %game_id, "phase index references a missing game; skipping");
            }
            Err(StorageError::Integrity { key, message }) => {
                warn!(game_id = %game_id, %key, %message, "skipping malformed feed entry");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(FeedResponse {
        games,
        page,
        per_page,
        total,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        catalog::SpectrumCatalog,
        config::AppConfig,
        dao::kv::MemoryKvStore,
        services::{
            publisher::{LocalPostPublisher, PostDraft, PostPublisher, PostRef, PublishError},
            scoring::NullSocialSignal,
        },
        state::AppState,
    };
    use futures::future::BoxFuture;
    use std::{path::PathBuf, sync::Arc, time::Duration};

    /// Publisher that always fails, for exercising the compensation path.
    struct RefusingPublisher;

    impl PostPublisher for RefusingPublisher {
        fn create_post(
            &self,
            _draft: PostDraft,
        ) -> BoxFuture<'static, Result<PostRef, PublishError>> {
            Box::pin(async { Err(PublishError::Rejected { status: 503 }) })
        }
    }

    pub(crate) async fn state_with_publisher(
        publisher: Arc<dyn PostPublisher>,
    ) -> crate::state::SharedState {
        let catalog = Arc::new(SpectrumCatalog::new(
            PathBuf::from("does/not/exist.json"),
            Duration::from_secs(300),
        ));
        let state = AppState::new(
            AppConfig::default(),
            catalog,
            publisher,
            Arc::new(NullSocialSignal),
        );
        state.install_store(Arc::new(MemoryKvStore::new())).await;
        state
    }

    pub(crate) async fn test_state() -> crate::state::SharedState {
        state_with_publisher(Arc::new(LocalPostPublisher)).await
    }

    pub(crate) fn host() -> Identity {
        Identity {
            user_id: "u-host".into(),
            username: "the_host".into(),
        }
    }

    pub(crate) async fn published_game(
        state: &crate::state::SharedState,
        duration_minutes: u64,
    ) -> Uuid {
        let draft = create_draft(state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();
        let view = publish(
            state,
            &host(),
            PublishGameRequest {
                draft_id: draft.draft_id,
                clue: "A spicy clue".into(),
                duration_minutes,
            },
        )
        .await
        .unwrap();
        view.game_id
    }

    #[tokio::test]
    async fn draft_has_spectrum_labels_and_target_in_range() {
        let state = test_state().await;
        let draft = create_draft(&state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();

        assert!(!draft.spectrum.left_label.is_empty());
        assert!(!draft.spectrum.right_label.is_empty());
        assert!(draft.secret_target <= MAX_GUESS_VALUE);
    }

    #[tokio::test]
    async fn publish_creates_an_active_game_without_exposing_the_target() {
        let state = test_state().await;
        let draft = create_draft(&state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();

        let view = publish(
            &state,
            &host(),
            PublishGameRequest {
                draft_id: draft.draft_id,
                clue: "A spicy clue".into(),
                duration_minutes: 60,
            },
        )
        .await
        .unwrap();

        assert_eq!(view.state, GamePhase::Active);
        assert_eq!(view.secret_target, None);
        assert_eq!(view.median_guess, None);
        assert_eq!(view.total_participants, 0);

        let detail = get_game(&state, view.game_id, None).await.unwrap();
        assert!(detail.guesses.is_empty());
    }

    #[tokio::test]
    async fn publish_consumes_the_draft() {
        let state = test_state().await;
        let draft = create_draft(&state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();
        let request = |draft_id| PublishGameRequest {
            draft_id,
            clue: "only once".into(),
            duration_minutes: 30,
        };

        publish(&state, &host(), request(draft.draft_id))
            .await
            .unwrap();

        let err = publish(&state, &host(), request(draft.draft_id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DraftNotFound(_)));
    }

    #[tokio::test]
    async fn publish_rejects_a_foreign_draft() {
        let state = test_state().await;
        let draft = create_draft(&state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();

        let thief = Identity {
            user_id: "u-thief".into(),
            username: "not_the_host".into(),
        };
        let err = publish(
            &state,
            &thief,
            PublishGameRequest {
                draft_id: draft.draft_id,
                clue: "stolen".into(),
                duration_minutes: 30,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::DraftOwnershipMismatch));
    }

    #[tokio::test]
    async fn publish_validates_clue_and_duration() {
        let state = test_state().await;
        let draft = create_draft(&state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();

        let blank = publish(
            &state,
            &host(),
            PublishGameRequest {
                draft_id: draft.draft_id,
                clue: "   ".into(),
                duration_minutes: 30,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(blank, ServiceError::ClueInvalid(_)));

        let too_short = publish(
            &state,
            &host(),
            PublishGameRequest {
                draft_id: draft.draft_id,
                clue: "fine".into(),
                duration_minutes: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(too_short, ServiceError::DurationInvalid(_)));
    }

    #[tokio::test]
    async fn failed_post_creation_leaves_the_draft_and_no_game() {
        let state = state_with_publisher(Arc::new(RefusingPublisher)).await;
        let draft = create_draft(&state, &host(), CreateDraftRequest::default())
            .await
            .unwrap();

        let err = publish(
            &state,
            &host(),
            PublishGameRequest {
                draft_id: draft.draft_id,
                clue: "doomed".into(),
                duration_minutes: 30,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::PublishFailed(_)));

        // Draft survives for retry, and nothing entered the feed.
        let repo = state.repository().await.unwrap();
        assert!(repo.find_draft(draft.draft_id).await.unwrap().is_some());
        let page = feed(&state, 1, 20).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn feed_paginates_newest_first() {
        let state = test_state().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(published_game(&state, 60).await);
            // Distinct publication timestamps keep the ordering stable.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let page = feed(&state, 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.games.len(), 2);
        assert_eq!(page.games[0].game_id, ids[2]);
        assert_eq!(page.games[1].game_id, ids[1]);

        let page2 = feed(&state, 2, 2).await.unwrap();
        assert_eq!(page2.games.len(), 1);
        assert_eq!(page2.games[0].game_id, ids[0]);
    }

    #[tokio::test]
    async fn transition_rejects_same_state_and_backward_moves() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        let repo = state.repository().await.unwrap();

        let mut record = repo.find_game(game_id).await.unwrap().unwrap().record;

        let same = transition(&repo, &mut record.clone(), GamePhase::Active)
            .await
            .unwrap_err();
        assert!(matches!(same, ServiceError::PhaseInvalid(_)));

        transition(&repo, &mut record, GamePhase::Reveal)
            .await
            .unwrap();
        assert_eq!(record.state, GamePhase::Reveal);

        let backward = transition(&repo, &mut record, GamePhase::Active)
            .await
            .unwrap_err();
        assert!(matches!(backward, ServiceError::PhaseInvalid(_)));

        // Membership moved along with the record.
        assert!(repo.list_phase(GamePhase::Active).await.unwrap().is_empty());
        assert_eq!(
            repo.list_phase(GamePhase::Reveal).await.unwrap(),
            vec![game_id]
        );
    }
}
