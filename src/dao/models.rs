//! Typed records persisted by the repository, plus the field-level parsing
//! that guards the read boundary. Hash records come back from the store as
//! loose string pairs; everything is validated here and nowhere else.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::storage::StorageError;
use crate::state::phase::GamePhase;

/// Lowest value a guess or secret target may take.
pub const MIN_GUESS_VALUE: u8 = 0;
/// Highest value a guess or secret target may take.
pub const MAX_GUESS_VALUE: u8 = 100;

/// Current wall clock as epoch milliseconds, the timestamp unit every
/// record and index score uses.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// A host's not-yet-published round holding the hidden target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    /// Draft identifier, consumed exactly once by publish.
    pub draft_id: Uuid,
    /// Host who issued the draft; only they may publish it.
    pub host_user_id: String,
    /// Spectrum the round will be played on.
    pub spectrum_id: String,
    /// The hidden value players will try to guess.
    pub secret_target: u8,
    /// Issuance time.
    pub created_at: u64,
    /// Time after which the draft can no longer be published.
    pub expires_at: u64,
}

impl DraftRecord {
    /// Flatten into the hash fields stored under `draft:{id}`.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("draft_id".into(), self.draft_id.to_string()),
            ("host_user_id".into(), self.host_user_id.clone()),
            ("spectrum_id".into(), self.spectrum_id.clone()),
            ("secret_target".into(), self.secret_target.to_string()),
            ("created_at".into(), self.created_at.to_string()),
            ("expires_at".into(), self.expires_at.to_string()),
        ]
    }

    /// Parse a stored hash back into a record, rejecting anything malformed.
    pub fn from_fields(key: &str, fields: &[(String, String)]) -> Result<Self, StorageError> {
        let map = FieldMap::new(key, fields);
        Ok(Self {
            draft_id: map.uuid("draft_id")?,
            host_user_id: map.string("host_user_id")?,
            spectrum_id: map.string("spectrum_id")?,
            secret_target: map.guess_value("secret_target")?,
            created_at: map.unsigned("created_at")?,
            expires_at: map.unsigned("expires_at")?,
        })
    }
}

/// Published game metadata, the aggregate every phase of the round hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// Game identifier.
    pub game_id: Uuid,
    /// Host's stable user id.
    pub host_user_id: String,
    /// Host's display name at publication time.
    pub host_username: String,
    /// The host's clue pointing at the secret target.
    pub clue: String,
    /// Current lifecycle phase.
    pub state: GamePhase,
    /// Spectrum the round is played on.
    pub spectrum_id: String,
    /// The hidden value players try to guess.
    pub secret_target: u8,
    /// When guessing opened.
    pub start_time: u64,
    /// When guessing closes.
    pub end_time: u64,
    /// When the reveal window ends and the game is archived.
    pub reveal_at: u64,
    /// Creation time.
    pub created_at: u64,
    /// Last mutation time.
    pub updated_at: u64,
    /// Publication time; also the phase-set index score.
    pub published_at: u64,
    /// Cardinality of the per-game guess set.
    pub total_participants: u64,
    /// Running median of all guesses, once any exist.
    pub median_guess: Option<u8>,
    /// Identifier of the public post representing this game, if any.
    pub post_ref: Option<String>,
    /// Permalink of the public post, if any.
    pub post_url: Option<String>,
}

impl GameRecord {
    /// Flatten into the hash fields stored under `game:{id}`.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("game_id".into(), self.game_id.to_string()),
            ("host_user_id".into(), self.host_user_id.clone()),
            ("host_username".into(), self.host_username.clone()),
            ("clue".into(), self.clue.clone()),
            ("state".into(), self.state.to_string()),
            ("spectrum_id".into(), self.spectrum_id.clone()),
            ("secret_target".into(), self.secret_target.to_string()),
            ("start_time".into(), self.start_time.to_string()),
            ("end_time".into(), self.end_time.to_string()),
            ("reveal_at".into(), self.reveal_at.to_string()),
            ("created_at".into(), self.created_at.to_string()),
            ("updated_at".into(), self.updated_at.to_string()),
            ("published_at".into(), self.published_at.to_string()),
            (
                "total_participants".into(),
                self.total_participants.to_string(),
            ),
        ];
        if let Some(median) = self.median_guess {
            fields.push(("median_guess".into(), median.to_string()));
        }
        if let Some(ref post_ref) = self.post_ref {
            fields.push(("post_ref".into(), post_ref.clone()));
        }
        if let Some(ref post_url) = self.post_url {
            fields.push(("post_url".into(), post_url.clone()));
        }
        fields
    }

    /// Parse a stored hash back into a record, rejecting anything malformed.
    pub fn from_fields(key: &str, fields: &[(String, String)]) -> Result<Self, StorageError> {
        let map = FieldMap::new(key, fields);
        Ok(Self {
            game_id: map.uuid("game_id")?,
            host_user_id: map.string("host_user_id")?,
            host_username: map.string("host_username")?,
            clue: map.string("clue")?,
            state: map.phase("state")?,
            spectrum_id: map.string("spectrum_id")?,
            secret_target: map.guess_value("secret_target")?,
            start_time: map.unsigned("start_time")?,
            end_time: map.unsigned("end_time")?,
            reveal_at: map.unsigned("reveal_at")?,
            created_at: map.unsigned("created_at")?,
            updated_at: map.unsigned("updated_at")?,
            published_at: map.unsigned("published_at")?,
            total_participants: map.unsigned("total_participants")?,
            median_guess: map.optional_guess_value("median_guess")?,
            post_ref: map.optional_string("post_ref"),
            post_url: map.optional_string("post_url"),
        })
    }
}

/// Where a guess came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuessSource {
    /// Submitted through the HTTP API.
    Api,
    /// Imported from a comment on the public post.
    Comment,
}

/// One participant's single, immutable placement on the spectrum.
///
/// Stored as a JSON string record; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    /// Guess identifier.
    pub guess_id: Uuid,
    /// Game this guess belongs to.
    pub game_id: Uuid,
    /// Guessing user's stable id; at most one guess per (game, user).
    pub user_id: String,
    /// Guessing user's display name.
    pub username: String,
    /// Placement on the spectrum.
    pub value: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional reasoning shown alongside the guess.
    pub justification: Option<String>,
    /// Submission time, the accolade tie-breaker.
    pub created_at: u64,
    /// Where the guess came from.
    pub source: GuessSource,
    /// Platform comment this guess was imported from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_ref: Option<String>,
}

impl GuessRecord {
    /// Parse a stored JSON payload, validating the guess value range.
    pub fn from_json(key: &str, payload: &str) -> Result<Self, StorageError> {
        let record: GuessRecord = serde_json::from_str(payload)
            .map_err(|err| StorageError::integrity(key, format!("invalid guess JSON: {err}")))?;
        if record.value > MAX_GUESS_VALUE {
            return Err(StorageError::integrity(
                key,
                format!("guess value {} outside the spectrum", record.value),
            ));
        }
        Ok(record)
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("guess record serializes")
    }
}

/// How fresh a median snapshot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedianFreshness {
    /// Recomputed from the guess set within this request.
    Live,
    /// Served from the cached snapshot.
    Cached,
}

/// Cached middle value of all guesses; always derivable from the guess set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedianSnapshot {
    /// Game the snapshot belongs to.
    pub game_id: Uuid,
    /// Middle value of all guesses at calculation time.
    pub median: u8,
    /// When the snapshot was computed.
    pub calculated_at: u64,
    /// Number of guesses the median was computed over.
    pub sample_size: u64,
    /// Whether the value was recomputed or served from cache.
    pub freshness: MedianFreshness,
}

/// View over loose hash fields with typed, validating accessors.
struct FieldMap<'a> {
    key: &'a str,
    fields: HashMap<&'a str, &'a str>,
}

impl<'a> FieldMap<'a> {
    fn new(key: &'a str, fields: &'a [(String, String)]) -> Self {
        Self {
            key,
            fields: fields
                .iter()
                .map(|(f, v)| (f.as_str(), v.as_str()))
                .collect(),
        }
    }

    fn raw(&self, field: &str) -> Result<&'a str, StorageError> {
        self.fields
            .get(field)
            .copied()
            .ok_or_else(|| StorageError::integrity(self.key, format!("missing field `{field}`")))
    }

    fn string(&self, field: &str) -> Result<String, StorageError> {
        Ok(self.raw(field)?.to_string())
    }

    fn optional_string(&self, field: &str) -> Option<String> {
        self.fields.get(field).map(|v| v.to_string())
    }

    fn uuid(&self, field: &str) -> Result<Uuid, StorageError> {
        let raw = self.raw(field)?;
        raw.parse().map_err(|_| {
            StorageError::integrity(self.key, format!("field `{field}` is not a UUID: `{raw}`"))
        })
    }

    fn unsigned(&self, field: &str) -> Result<u64, StorageError> {
        let raw = self.raw(field)?;
        raw.parse().map_err(|_| {
            StorageError::integrity(
                self.key,
                format!("field `{field}` is not an integer: `{raw}`"),
            )
        })
    }

    fn phase(&self, field: &str) -> Result<GamePhase, StorageError> {
        let raw = self.raw(field)?;
        raw.parse()
            .map_err(|_| StorageError::integrity(self.key, format!("unknown phase `{raw}`")))
    }

    fn guess_value(&self, field: &str) -> Result<u8, StorageError> {
        let raw = self.raw(field)?;
        let value: u8 = raw.parse().map_err(|_| {
            StorageError::integrity(
                self.key,
                format!("field `{field}` is not an integer: `{raw}`"),
            )
        })?;
        if value > MAX_GUESS_VALUE {
            return Err(StorageError::integrity(
                self.key,
                format!("field `{field}` value {value} outside the spectrum"),
            ));
        }
        Ok(value)
    }

    fn optional_guess_value(&self, field: &str) -> Result<Option<u8>, StorageError> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(_) => Ok(Some(self.guess_value(field)?)),
        }
    }
}
