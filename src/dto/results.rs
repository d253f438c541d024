//! Final-results payloads computed by the scoring engine. Nothing here is
//! persisted; every response is derived from the stored guess set.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Named distinction awarded to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccoladeKind {
    /// Closest guess to the secret target.
    BestAccuracy,
    /// Highest external social signal.
    TopPersuasion,
    /// Farthest guess from the final median.
    MostContrarian,
}

/// An accolade together with its recipient.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccoladeAward {
    /// Which distinction was earned.
    pub kind: AccoladeKind,
    /// Recipient's user id.
    pub user_id: String,
    /// Recipient's display name.
    pub username: String,
}

/// Score breakdown for a single player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerScoreView {
    /// Player's user id.
    pub user_id: String,
    /// Player's display name.
    pub username: String,
    /// The player's guess.
    pub guess_value: u8,
    /// 1-based position after sorting by total score.
    pub rank: usize,
    /// Points from closeness to the target.
    pub guessing_score: u32,
    /// Points from the external social signal.
    pub persuasion_score: u32,
    /// Sum of the two components.
    pub total_score: u32,
    /// Accolades earned by this player.
    pub accolades: Vec<AccoladeKind>,
}

/// Score breakdown for the host, rewarding how well the crowd converged.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HostScoreView {
    /// Host's user id.
    pub user_id: String,
    /// Host's display name.
    pub username: String,
    /// Mean player guessing score, rounded.
    pub convergence_score: u32,
}

/// One fixed-width histogram bucket over the guess domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HistogramBucket {
    /// Inclusive lower bound of the bucket.
    pub range_start: u8,
    /// Inclusive upper bound of the bucket.
    pub range_end: u8,
    /// Number of guesses falling in the bucket.
    pub count: u64,
}

/// Qualitative band describing how aligned the crowd was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLabel {
    /// Fewer than two valid guesses; no meaningful spread exists.
    InsufficientData,
    /// The crowd almost speaks with one voice.
    NearUnanimous,
    /// Clear agreement with a few dissenters.
    StrongAgreement,
    /// A visible spread of opinions.
    Mixed,
    /// Two or more camps pulling apart.
    Divided,
    /// Opinions span the whole spectrum.
    MaximallyDivided,
}

/// Consensus summary derived from the spread of guesses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConsensusView {
    /// Band the spread falls into.
    pub label: ConsensusLabel,
    /// Population standard deviation of the guesses, when computable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_deviation: Option<f64>,
    /// Human-readable description of the band.
    pub description: String,
}

/// Complete final results for a revealed or archived game.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreSummary {
    /// Game the results belong to.
    pub game_id: Uuid,
    /// The revealed secret target.
    pub target_value: u8,
    /// Final median of all guesses, absent with zero guesses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_median: Option<u8>,
    /// Host score breakdown.
    pub host: HostScoreView,
    /// Per-player breakdowns, ranked best first.
    pub players: Vec<PlayerScoreView>,
    /// Guess distribution; empty with zero guesses.
    pub histogram: Vec<HistogramBucket>,
    /// Accolades and their recipients.
    pub accolades: Vec<AccoladeAward>,
    /// Crowd-alignment summary.
    pub consensus: ConsensusView,
}
