//! Elo expected score and rating update.

use duel_core::MatchResult;

/// Probability that a player rated `rating_a` beats one rated `rating_b`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
}

/// Apply one result and return `(new_rating_a, new_rating_b)`.
///
/// B's expectation is taken as the complement of A's so the update is
/// zero-sum: the two ratings always keep their combined total.
pub fn apply_result(rating_a: f64, rating_b: f64, result: MatchResult, k_factor: f64) -> (f64, f64) {
    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = 1.0 - expected_a;
    let (score_a, score_b) = result.scores();

    (
        rating_a + k_factor * (score_a - expected_a),
        rating_b + k_factor * (score_b - expected_b),
    )
}
