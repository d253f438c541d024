//! Scoring engine: computes final results for a revealed or archived game
//! from its stored guesses. Nothing computed here is persisted.

use uuid::Uuid;

use crate::{
    dao::models::{GuessRecord, MAX_GUESS_VALUE},
    dto::results::{
        AccoladeAward, AccoladeKind, ConsensusLabel, ConsensusView, HistogramBucket,
        HostScoreView, PlayerScoreView, ScoreSummary,
    },
    error::ServiceError,
    services::ingestion::median_of_sorted,
    state::{SharedState, phase::GamePhase},
};

/// Bonus awarded on top of the accuracy curve for near-exact guesses.
const BULLSEYE_BONUS: u32 = 25;
/// Distance at which the bullseye bonus still applies.
const BULLSEYE_DISTANCE: u8 = 2;

/// External per-guess social signal (e.g. comment upvotes) feeding the
/// persuasion score. The source lives outside this core; implementations
/// only have to produce a number per guess.
pub trait SocialSignal: Send + Sync {
    /// Signal strength for one guess. Non-finite or negative values are
    /// treated as zero by the engine.
    fn signal_for(&self, guess: &GuessRecord) -> f64;
}

/// Signal source for deployments without a social platform attached.
#[derive(Debug, Clone, Default)]
pub struct NullSocialSignal;

impl SocialSignal for NullSocialSignal {
    fn signal_for(&self, _guess: &GuessRecord) -> f64 {
        0.0
    }
}

/// Compute the final results for a game.
///
/// Only Reveal and Archived games can be scored; scoring an Active game
/// would leak the target early.
pub async fn compute_results(
    state: &SharedState,
    game_id: Uuid,
) -> Result<ScoreSummary, ServiceError> {
    let repo = state.repository().await?;

    let game = repo
        .find_game(game_id)
        .await?
        .ok_or(ServiceError::GameNotFound(game_id))?;
    let record = game.record;

    if record.state == GamePhase::Active {
        return Err(ServiceError::PhaseInvalid(
            "results are not available while guessing is open".into(),
        ));
    }

    let guesses = repo.load_guesses(game_id).await?;
    let signals = state.social_signal();

    let values: Vec<u8> = guesses.iter().map(|guess| guess.value).collect();
    let final_median = median_of_sorted(&values);

    let mut players: Vec<PlayerScoreView> = guesses
        .iter()
        .map(|guess| {
            let guessing_score = accuracy_score(guess.value, record.secret_target);
            let persuasion_score = sanitize_signal(signals.signal_for(guess));
            PlayerScoreView {
                user_id: guess.user_id.clone(),
                username: guess.username.clone(),
                guess_value: guess.value,
                rank: 0,
                guessing_score,
                persuasion_score,
                total_score: guessing_score + persuasion_score,
                accolades: Vec::new(),
            }
        })
        .collect();

    // Rank by total score, earliest submission first on ties.
    let created: Vec<u64> = guesses.iter().map(|guess| guess.created_at).collect();
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.sort_by(|&a, &b| {
        players[b]
            .total_score
            .cmp(&players[a].total_score)
            .then_with(|| created[a].cmp(&created[b]))
    });
    for (rank, &index) in order.iter().enumerate() {
        players[index].rank = rank + 1;
    }

    let accolades = award_accolades(&guesses, signals.as_ref(), record.secret_target, final_median);
    for award in &accolades {
        if let Some(player) = players.iter_mut().find(|p| p.user_id == award.user_id) {
            player.accolades.push(award.kind);
        }
    }
    players.sort_by_key(|player| player.rank);

    let mean_guessing = if players.is_empty() {
        0
    } else {
        let sum: u64 = players.iter().map(|p| p.guessing_score as u64).sum();
        (sum as f64 / players.len() as f64).round() as u32
    };

    Ok(ScoreSummary {
        game_id,
        target_value: record.secret_target,
        final_median,
        host: HostScoreView {
            user_id: record.host_user_id,
            username: record.host_username,
            convergence_score: mean_guessing,
        },
        players,
        histogram: histogram(&values, state.config().histogram_buckets),
        accolades,
        consensus: consensus(&values.iter().map(|v| *v as f64).collect::<Vec<_>>()),
    })
}

/// Accuracy curve: deterministic, symmetric, strictly decreasing with
/// distance, with a small bonus for near-exact guesses.
pub fn accuracy_score(value: u8, target: u8) -> u32 {
    let distance = value.abs_diff(target);
    let span = MAX_GUESS_VALUE as f64;
    let closeness = 1.0 - distance as f64 / span;
    let base = (100.0 * closeness * closeness).round() as u32;
    if distance <= BULLSEYE_DISTANCE {
        base + BULLSEYE_BONUS
    } else {
        base
    }
}

fn sanitize_signal(signal: f64) -> u32 {
    if !signal.is_finite() || signal <= 0.0 {
        0
    } else {
        signal.round() as u32
    }
}

/// Fixed-width histogram over the whole guess domain. Zero guesses yield an
/// empty histogram rather than a row of empty buckets.
pub fn histogram(values: &[u8], buckets: usize) -> Vec<HistogramBucket> {
    if values.is_empty() || buckets == 0 {
        return Vec::new();
    }

    let domain = MAX_GUESS_VALUE as usize + 1;
    let mut counts = vec![0u64; buckets];
    for value in values {
        let value = *value as usize;
        // A value belongs to the last bucket whose lower bound it reaches.
        let index = (1..buckets)
            .take_while(|i| i * domain / buckets <= value)
            .count();
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(index, count)| HistogramBucket {
            range_start: (index * domain / buckets) as u8,
            range_end: (((index + 1) * domain / buckets).min(domain) - 1) as u8,
            count,
        })
        .collect()
}

/// Map the population standard deviation of the guesses onto a labeled
/// band. Non-finite inputs are discarded; fewer than two usable guesses
/// mean no meaningful spread exists.
pub fn consensus(values: &[f64]) -> ConsensusView {
    let usable: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

    if usable.len() < 2 {
        return ConsensusView {
            label: ConsensusLabel::InsufficientData,
            standard_deviation: None,
            description: "Not enough guesses to measure consensus".into(),
        };
    }

    let mean = usable.iter().sum::<f64>() / usable.len() as f64;
    let variance = usable
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / usable.len() as f64;
    let std_dev = variance.sqrt();

    let (label, description) = if std_dev < 6.0 {
        (
            ConsensusLabel::NearUnanimous,
            "The hive mind speaks with one voice",
        )
    } else if std_dev < 12.0 {
        (
            ConsensusLabel::StrongAgreement,
            "Most of the crowd landed in the same place",
        )
    } else if std_dev < 20.0 {
        (ConsensusLabel::Mixed, "Opinions spread out noticeably")
    } else if std_dev < 28.0 {
        (ConsensusLabel::Divided, "The crowd split into camps")
    } else {
        (
            ConsensusLabel::MaximallyDivided,
            "Guesses span the whole spectrum",
        )
    };

    ConsensusView {
        label,
        standard_deviation: Some(std_dev),
        description: description.into(),
    }
}

/// Decide the accolades. Ties break toward the earliest submission; the
/// persuasion accolade is only awarded when a positive signal exists at all.
fn award_accolades(
    guesses: &[GuessRecord],
    signals: &dyn SocialSignal,
    target: u8,
    final_median: Option<u8>,
) -> Vec<AccoladeAward> {
    let mut awards = Vec::new();
    if guesses.is_empty() {
        return awards;
    }

    if let Some(best) = guesses.iter().min_by(|a, b| {
        a.value
            .abs_diff(target)
            .cmp(&b.value.abs_diff(target))
            .then_with(|| a.created_at.cmp(&b.created_at))
    }) {
        awards.push(AccoladeAward {
            kind: AccoladeKind::BestAccuracy,
            user_id: best.user_id.clone(),
            username: best.username.clone(),
        });
    }

    let top_signal = guesses
        .iter()
        .map(|guess| (guess, sanitize_signal(signals.signal_for(guess))))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.created_at.cmp(&a.0.created_at)));
    if let Some((guess, signal)) = top_signal {
        if signal > 0 {
            awards.push(AccoladeAward {
                kind: AccoladeKind::TopPersuasion,
                user_id: guess.user_id.clone(),
                username: guess.username.clone(),
            });
        }
    }

    if let Some(median) = final_median {
        if let Some(contrarian) = guesses.iter().max_by(|a, b| {
            a.value
                .abs_diff(median)
                .cmp(&b.value.abs_diff(median))
                .then_with(|| b.created_at.cmp(&a.created_at))
        }) {
            awards.push(AccoladeAward {
                kind: AccoladeKind::MostContrarian,
                user_id: contrarian.user_id.clone(),
                username: contrarian.username.clone(),
            });
        }
    }

    awards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::{guess::SubmitGuessRequest, identity::Identity},
        services::{
            ingestion::submit_guess,
            lifecycle::{
                self,
                tests::{published_game, test_state},
            },
        },
    };

    fn player(n: u32) -> Identity {
        Identity {
            user_id: format!("u-{n}"),
            username: format!("player_{n}"),
        }
    }

    async fn reveal(state: &crate::state::SharedState, game_id: Uuid) {
        let repo = state.repository().await.unwrap();
        let mut record = repo.find_game(game_id).await.unwrap().unwrap().record;
        lifecycle::transition(&repo, &mut record, GamePhase::Reveal)
            .await
            .unwrap();
    }

    #[test]
    fn accuracy_score_is_symmetric_and_decreasing() {
        assert_eq!(accuracy_score(50, 50), 100 + BULLSEYE_BONUS);
        assert_eq!(accuracy_score(30, 70), accuracy_score(70, 30));

        let mut previous = accuracy_score(50, 50);
        for distance in 1..=50u8 {
            let score = accuracy_score(50 - distance, 50);
            assert!(score < previous, "score must fall as distance grows");
            previous = score;
        }
        assert_eq!(accuracy_score(0, 100), 0);
    }

    #[test]
    fn histogram_covers_the_domain_in_fixed_buckets() {
        let buckets = histogram(&[0, 5, 9, 10, 55, 100], 10);
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0].range_start, 0);
        assert_eq!(buckets[0].range_end, 9);
        assert_eq!(buckets[0].count, 3);
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[5].count, 1);
        assert_eq!(buckets[9].range_end, 100);
        assert_eq!(buckets[9].count, 1);

        assert!(histogram(&[], 10).is_empty());
    }

    #[test]
    fn consensus_bands_follow_the_spread() {
        assert_eq!(consensus(&[]).label, ConsensusLabel::InsufficientData);
        assert_eq!(consensus(&[50.0]).label, ConsensusLabel::InsufficientData);
        assert_eq!(
            consensus(&[50.0, 50.0, 51.0]).label,
            ConsensusLabel::NearUnanimous
        );
        assert_eq!(
            consensus(&[0.0, 100.0, 0.0, 100.0]).label,
            ConsensusLabel::MaximallyDivided
        );

        // Non-finite garbage is discarded, not propagated.
        let view = consensus(&[50.0, f64::NAN, 52.0, f64::INFINITY]);
        assert_eq!(view.label, ConsensusLabel::NearUnanimous);
        assert!(view.standard_deviation.unwrap().is_finite());
    }

    #[tokio::test]
    async fn scoring_an_active_game_is_refused() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        let err = compute_results(&state, game_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::PhaseInvalid(_)));
    }

    #[tokio::test]
    async fn zero_guess_game_scores_to_an_insufficient_data_result() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;
        reveal(&state, game_id).await;

        let summary = compute_results(&state, game_id).await.unwrap();
        assert_eq!(summary.final_median, None);
        assert!(summary.histogram.is_empty());
        assert!(summary.players.is_empty());
        assert!(summary.accolades.is_empty());
        assert_eq!(summary.consensus.label, ConsensusLabel::InsufficientData);
        assert_eq!(summary.host.convergence_score, 0);
    }

    #[tokio::test]
    async fn results_rank_accuracy_and_award_accolades() {
        let state = test_state().await;
        let game_id = published_game(&state, 60).await;

        // Pin the target so distances are predictable.
        let repo = state.repository().await.unwrap();
        let mut record = repo.find_game(game_id).await.unwrap().unwrap().record;
        record.secret_target = 70;
        repo.save_game(&record).await.unwrap();

        for (n, value) in [(1, 68), (2, 40), (3, 5)] {
            submit_guess(
                &state,
                &player(n),
                game_id,
                SubmitGuessRequest {
                    value,
                    justification: None,
                },
            )
            .await
            .unwrap();
        }
        reveal(&state, game_id).await;

        let summary = compute_results(&state, game_id).await.unwrap();
        assert_eq!(summary.target_value, 70);
        assert_eq!(summary.final_median, Some(40));

        // Closest guess ranks first and takes best-accuracy.
        assert_eq!(summary.players[0].user_id, "u-1");
        assert_eq!(summary.players[0].rank, 1);
        assert!(summary.players[0].accolades.contains(&AccoladeKind::BestAccuracy));

        // Farthest from the median (5 vs median 40) is most contrarian.
        let contrarian = summary
            .accolades
            .iter()
            .find(|award| award.kind == AccoladeKind::MostContrarian)
            .unwrap();
        assert_eq!(contrarian.user_id, "u-3");

        // The null signal source never awards persuasion.
        assert!(
            !summary
                .accolades
                .iter()
                .any(|award| award.kind == AccoladeKind::TopPersuasion)
        );

        assert_eq!(
            summary.players.iter().map(|p| p.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }
}
