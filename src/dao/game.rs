//! Typed persistence for drafts, games, and guesses, plus the four indices
//! the lifecycle depends on: per-phase membership sets, the end-time
//! schedule, the per-game guess set, and the per-game guesser map.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::{
    catalog::{CatalogError, Spectrum, SpectrumCatalog},
    dao::{
        keys,
        kv::KvStore,
        models::{DraftRecord, GameRecord, GuessRecord, MedianSnapshot},
        storage::{StorageError, StorageResult},
    },
    state::phase::GamePhase,
};

/// A game record together with its resolved spectrum.
#[derive(Debug, Clone)]
pub struct HydratedGame {
    /// Validated metadata record.
    pub record: GameRecord,
    /// Spectrum the record references, re-resolved against the catalog.
    pub spectrum: Spectrum,
}

/// Data access object encapsulating every store interaction for the game
/// lifecycle. Holds the primitive store and the catalog needed to hydrate.
#[derive(Clone)]
pub struct GameRepository {
    store: Arc<dyn KvStore>,
    catalog: Arc<SpectrumCatalog>,
}

impl GameRepository {
    /// Build a repository over the given store and catalog.
    pub fn new(store: Arc<dyn KvStore>, catalog: Arc<SpectrumCatalog>) -> Self {
        Self { store, catalog }
    }

    // ---- drafts ----

    /// Persist a draft record.
    pub async fn save_draft(&self, draft: &DraftRecord) -> StorageResult<()> {
        self.store
            .hset(keys::draft(draft.draft_id), draft.to_fields())
            .await
    }

    /// Load a draft, validating it at the read boundary.
    pub async fn find_draft(&self, draft_id: Uuid) -> StorageResult<Option<DraftRecord>> {
        let key = keys::draft(draft_id);
        let fields = self.store.hgetall(key.clone()).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        DraftRecord::from_fields(&key, &fields).map(Some)
    }

    /// Delete a draft (used both on publish and on expiry cleanup).
    pub async fn delete_draft(&self, draft_id: Uuid) -> StorageResult<()> {
        self.store.del(keys::draft(draft_id)).await
    }

    // ---- games ----

    /// Persist a brand-new game and wire it into the Active set and the
    /// end-time schedule. On any failure the caller is expected to invoke
    /// [`GameRepository::rollback_insert_game`].
    pub async fn insert_game(&self, game: &GameRecord) -> StorageResult<()> {
        self.store
            .hset(keys::game(game.game_id), game.to_fields())
            .await?;
        self.store
            .zadd(
                keys::phase_set(game.state),
                game.game_id.to_string(),
                game.published_at as f64,
            )
            .await?;
        self.store
            .zadd(
                keys::SCHEDULE.to_string(),
                game.game_id.to_string(),
                game.end_time as f64,
            )
            .await
    }

    /// Best-effort compensating deletes after a partially failed insert.
    /// Errors are logged, not propagated: the original failure matters more.
    pub async fn rollback_insert_game(&self, game_id: Uuid) {
        let member = game_id.to_string();
        let cleanups = [
            self.store.del(keys::game(game_id)).await,
            self.store
                .zrem(keys::phase_set(GamePhase::Active), member.clone())
                .await,
            self.store.zrem(keys::SCHEDULE.to_string(), member).await,
        ];
        for result in cleanups {
            if let Err(err) = result {
                warn!(game_id = %game_id, error = %err, "publish rollback step failed");
            }
        }
    }

    /// Overwrite the stored fields of an existing game record.
    pub async fn save_game(&self, game: &GameRecord) -> StorageResult<()> {
        self.store
            .hset(keys::game(game.game_id), game.to_fields())
            .await
    }

    /// Load and hydrate a game. A missing spectrum is an integrity error,
    /// never a not-found.
    pub async fn find_game(&self, game_id: Uuid) -> StorageResult<Option<HydratedGame>> {
        let key = keys::game(game_id);
        let fields = self.store.hgetall(key.clone()).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let record = GameRecord::from_fields(&key, &fields)?;
        let spectrum = self
            .catalog
            .resolve(&record.spectrum_id)
            .await
            .map_err(|err| match err {
                CatalogError::UnknownSpectrum { id } => StorageError::integrity(
                    &key,
                    format!("references spectrum `{id}` missing from the catalog"),
                ),
                other => StorageError::integrity(&key, other.to_string()),
            })?;

        Ok(Some(HydratedGame { record, spectrum }))
    }

    /// Move a game between phase membership sets.
    pub async fn move_phase_membership(
        &self,
        game_id: Uuid,
        from: GamePhase,
        to: GamePhase,
        score: u64,
    ) -> StorageResult<()> {
        let member = game_id.to_string();
        self.store
            .zadd(keys::phase_set(to), member.clone(), score as f64)
            .await?;
        self.store.zrem(keys::phase_set(from), member).await
    }

    /// Game ids currently in `phase`, newest publication first.
    pub async fn list_phase(&self, phase: GamePhase) -> StorageResult<Vec<Uuid>> {
        let members = self
            .store
            .zrange_by_rank(keys::phase_set(phase), 0, -1)
            .await?;
        Ok(members
            .into_iter()
            .rev()
            .filter_map(|pair| pair.member.parse().ok())
            .collect())
    }

    /// Number of games currently in `phase`.
    pub async fn phase_count(&self, phase: GamePhase) -> StorageResult<u64> {
        self.store.zcard(keys::phase_set(phase)).await
    }

    // ---- schedule & finalize jobs ----

    /// Atomically claim every scheduled game whose end time has passed.
    /// A concurrent tick can never claim the same game twice.
    pub async fn claim_due_schedule(&self, now_ms: u64) -> StorageResult<Vec<Uuid>> {
        let due = self
            .store
            .zpop_by_score(keys::SCHEDULE.to_string(), now_ms as f64)
            .await?;
        Ok(due
            .into_iter()
            .filter_map(|pair| pair.member.parse().ok())
            .collect())
    }

    /// Put a game back on the schedule after a failed transition so a later
    /// tick retries it.
    pub async fn requeue_schedule(&self, game_id: Uuid, end_time: u64) -> StorageResult<()> {
        self.store
            .zadd(
                keys::SCHEDULE.to_string(),
                game_id.to_string(),
                end_time as f64,
            )
            .await
    }

    /// Enqueue the finalize job for a game. Re-adding the same game is a
    /// no-op on membership, which makes duplicate enqueues idempotent.
    pub async fn enqueue_finalize(&self, game_id: Uuid, run_at_ms: u64) -> StorageResult<()> {
        self.store
            .zadd(
                keys::FINALIZE_JOBS.to_string(),
                game_id.to_string(),
                run_at_ms as f64,
            )
            .await
    }

    /// Atomically claim every finalize job due to fire.
    pub async fn claim_due_finalize(&self, now_ms: u64) -> StorageResult<Vec<Uuid>> {
        let due = self
            .store
            .zpop_by_score(keys::FINALIZE_JOBS.to_string(), now_ms as f64)
            .await?;
        Ok(due
            .into_iter()
            .filter_map(|pair| pair.member.parse().ok())
            .collect())
    }

    /// Put a finalize job back after a failed run so delivery stays
    /// at-least-once.
    pub async fn requeue_finalize(&self, game_id: Uuid, run_at_ms: u64) -> StorageResult<()> {
        self.enqueue_finalize(game_id, run_at_ms).await
    }

    // ---- guesses ----

    /// Reserve the (game, user) slot for a guess. Returns `false` when the
    /// user already has a guess recorded; the conditional write is the
    /// duplicate-check race guard.
    pub async fn try_index_guesser(
        &self,
        game_id: Uuid,
        user_id: &str,
        guess_id: Uuid,
    ) -> StorageResult<bool> {
        self.store
            .hset_if_absent(
                keys::game_guessers(game_id),
                user_id.to_string(),
                guess_id.to_string(),
            )
            .await
    }

    /// Release a previously reserved guesser slot (compensation path).
    pub async fn unindex_guesser(&self, game_id: Uuid, user_id: &str) -> StorageResult<()> {
        self.store
            .hdel(keys::game_guessers(game_id), user_id.to_string())
            .await
    }

    /// Persist a guess record and add it to the value-ordered guess set.
    pub async fn save_guess(&self, guess: &GuessRecord) -> StorageResult<()> {
        self.store
            .set(keys::guess(guess.guess_id), guess.to_json())
            .await?;
        self.store
            .zadd(
                keys::game_guesses(guess.game_id),
                guess.guess_id.to_string(),
                guess.value as f64,
            )
            .await
    }

    /// Cardinality of the per-game guess set; the source of truth for
    /// `total_participants`.
    pub async fn guess_count(&self, game_id: Uuid) -> StorageResult<u64> {
        self.store.zcard(keys::game_guesses(game_id)).await
    }

    /// Guess values for a game in ascending value order, straight from the
    /// index scores (no record loads).
    pub async fn guess_values(&self, game_id: Uuid) -> StorageResult<Vec<u8>> {
        let members = self
            .store
            .zrange_by_rank(keys::game_guesses(game_id), 0, -1)
            .await?;
        Ok(members
            .into_iter()
            .map(|pair| pair.score.round().clamp(0.0, 255.0) as u8)
            .collect())
    }

    /// Load every guess record for a game, ascending by value. A guess id
    /// indexed but missing its record is an integrity error.
    pub async fn load_guesses(&self, game_id: Uuid) -> StorageResult<Vec<GuessRecord>> {
        let members = self
            .store
            .zrange_by_rank(keys::game_guesses(game_id), 0, -1)
            .await?;

        let mut records = Vec::with_capacity(members.len());
        for pair in members {
            let Ok(guess_id) = pair.member.parse::<Uuid>() else {
                return Err(StorageError::integrity(
                    keys::game_guesses(game_id),
                    format!("member `{}` is not a guess id", pair.member),
                ));
            };
            let key = keys::guess(guess_id);
            let payload = self.store.get(key.clone()).await?.ok_or_else(|| {
                StorageError::integrity(&key, "indexed guess record is missing")
            })?;
            records.push(GuessRecord::from_json(&key, &payload)?);
        }
        Ok(records)
    }

    // ---- median snapshot ----

    /// Cache the latest median snapshot for a game.
    pub async fn write_median(&self, snapshot: &MedianSnapshot) -> StorageResult<()> {
        let payload =
            serde_json::to_string(snapshot).expect("median snapshot serializes");
        self.store
            .set(keys::game_median(snapshot.game_id), payload)
            .await
    }

    /// Read the cached median snapshot, if one exists.
    pub async fn read_median(&self, game_id: Uuid) -> StorageResult<Option<MedianSnapshot>> {
        let key = keys::game_median(game_id);
        match self.store.get(key.clone()).await? {
            None => Ok(None),
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|err| StorageError::integrity(&key, format!("invalid snapshot: {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::kv::MemoryKvStore;
    use crate::dao::models::{GuessSource, now_ms};
    use std::path::PathBuf;
    use std::time::Duration;

    fn repository() -> GameRepository {
        let catalog = Arc::new(SpectrumCatalog::new(
            PathBuf::from("does/not/exist.json"),
            Duration::from_secs(60),
        ));
        GameRepository::new(Arc::new(MemoryKvStore::new()), catalog)
    }

    fn game(spectrum_id: &str) -> GameRecord {
        let now = now_ms();
        GameRecord {
            game_id: Uuid::new_v4(),
            host_user_id: "u-host".into(),
            host_username: "the_host".into(),
            clue: "somewhere in the middle".into(),
            state: GamePhase::Active,
            spectrum_id: spectrum_id.into(),
            secret_target: 40,
            start_time: now,
            end_time: now + 60_000,
            reveal_at: now + 120_000,
            created_at: now,
            updated_at: now,
            published_at: now,
            total_participants: 0,
            median_guess: None,
            post_ref: None,
            post_url: None,
        }
    }

    fn guess(game_id: Uuid, user: &str, value: u8) -> GuessRecord {
        GuessRecord {
            guess_id: Uuid::new_v4(),
            game_id,
            user_id: user.into(),
            username: format!("{user}_name"),
            value,
            justification: None,
            created_at: now_ms(),
            source: GuessSource::Api,
            comment_ref: None,
        }
    }

    #[tokio::test]
    async fn insert_then_find_hydrates_the_spectrum() {
        let repo = repository();
        let record = game("coffee-tea");
        repo.insert_game(&record).await.unwrap();

        let hydrated = repo.find_game(record.game_id).await.unwrap().unwrap();
        assert_eq!(hydrated.record, record);
        assert_eq!(hydrated.spectrum.id, "coffee-tea");

        assert_eq!(
            repo.list_phase(GamePhase::Active).await.unwrap(),
            vec![record.game_id]
        );
    }

    #[tokio::test]
    async fn dangling_spectrum_reference_is_an_integrity_error() {
        let repo = repository();
        let record = game("spectrum-that-was-deleted");
        repo.insert_game(&record).await.unwrap();

        let err = repo.find_game(record.game_id).await.unwrap_err();
        assert!(matches!(err, StorageError::Integrity { .. }));
    }

    #[tokio::test]
    async fn find_game_returns_none_for_unknown_id() {
        let repo = repository();
        assert!(repo.find_game(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rollback_removes_every_trace_of_the_game() {
        let repo = repository();
        let record = game("coffee-tea");
        repo.insert_game(&record).await.unwrap();

        repo.rollback_insert_game(record.game_id).await;

        assert!(repo.find_game(record.game_id).await.unwrap().is_none());
        assert!(repo.list_phase(GamePhase::Active).await.unwrap().is_empty());
        assert!(
            repo.claim_due_schedule(record.end_time + 1)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn guesser_index_rejects_second_reservation() {
        let repo = repository();
        let game_id = Uuid::new_v4();

        assert!(
            repo.try_index_guesser(game_id, "u-1", Uuid::new_v4())
                .await
                .unwrap()
        );
        assert!(
            !repo
                .try_index_guesser(game_id, "u-1", Uuid::new_v4())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn guesses_come_back_ordered_by_value() {
        let repo = repository();
        let game_id = Uuid::new_v4();
        for (user, value) in [("u-1", 90u8), ("u-2", 10), ("u-3", 55)] {
            let record = guess(game_id, user, value);
            repo.try_index_guesser(game_id, user, record.guess_id)
                .await
                .unwrap();
            repo.save_guess(&record).await.unwrap();
        }

        assert_eq!(repo.guess_count(game_id).await.unwrap(), 3);
        assert_eq!(repo.guess_values(game_id).await.unwrap(), vec![10, 55, 90]);

        let records = repo.load_guesses(game_id).await.unwrap();
        assert_eq!(
            records.iter().map(|g| g.value).collect::<Vec<_>>(),
            vec![10, 55, 90]
        );
    }

    #[tokio::test]
    async fn schedule_claim_is_exhaustive_and_one_shot() {
        let repo = repository();
        let early = game("coffee-tea");
        let late = {
            let mut g = game("sweet-savory");
            g.end_time = early.end_time + 600_000;
            g
        };
        repo.insert_game(&early).await.unwrap();
        repo.insert_game(&late).await.unwrap();

        let claimed = repo.claim_due_schedule(early.end_time + 1).await.unwrap();
        assert_eq!(claimed, vec![early.game_id]);

        // Second claim with the same horizon finds nothing.
        assert!(
            repo.claim_due_schedule(early.end_time + 1)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn duplicate_finalize_enqueue_is_a_noop() {
        let repo = repository();
        let game_id = Uuid::new_v4();
        repo.enqueue_finalize(game_id, 1_000).await.unwrap();
        repo.enqueue_finalize(game_id, 1_000).await.unwrap();

        let due = repo.claim_due_finalize(2_000).await.unwrap();
        assert_eq!(due, vec![game_id]);
    }
}
