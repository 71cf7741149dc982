//! Elo rating math for head-to-head idea matches.
//!
//! Standard logistic expected-score formula with a fixed K-factor. Ratings are
//! stored as integers; the update rounds once, at the end.

use crate::model::EloChange;

/// Maximum rating swing per match.
pub const K_FACTOR: f64 = 24.0;

/// Expected score of the first side given both ratings.
///
/// `expected(a, b) + expected(b, a) == 1.0` for any pair of ratings.
pub fn expected_score(rating_a: i64, rating_b: i64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) as f64 / 400.0))
}

/// Apply one match outcome to a pair of ratings.
///
/// `outcome_a` is from A's perspective: win 1.0, loss 0.0, tie 0.5. Returns the
/// old/new/delta for both sides; the caller persists them together.
pub fn apply_outcome(rating_a: i64, rating_b: i64, outcome_a: f64) -> (EloChange, EloChange) {
    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = expected_score(rating_b, rating_a);

    let new_a = (rating_a as f64 + K_FACTOR * (outcome_a - expected_a)).round() as i64;
    let new_b = (rating_b as f64 + K_FACTOR * ((1.0 - outcome_a) - expected_b)).round() as i64;

    (
        EloChange {
            old: rating_a,
            new: new_a,
            change: new_a - rating_a,
        },
        EloChange {
            old: rating_b,
            new: new_b,
            change: new_b - rating_b,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectations_sum_to_one() {
        for (a, b) in [(1500, 1500), (1500, 1700), (1200, 1900), (1650, 1649)] {
            let sum = expected_score(a, b) + expected_score(b, a);
            assert!((sum - 1.0).abs() < 1e-12, "sum was {sum} for {a} vs {b}");
        }
    }

    #[test]
    fn tie_between_equal_ratings_is_a_fixed_point() {
        let (a, b) = apply_outcome(1500, 1500, 0.5);
        assert_eq!(a.new, 1500);
        assert_eq!(b.new, 1500);
        assert_eq!(a.change, 0);
        assert_eq!(b.change, 0);
    }

    #[test]
    fn equal_ratings_split_k_evenly_on_a_win() {
        let (a, b) = apply_outcome(1500, 1500, 1.0);
        assert_eq!(a.change, 12);
        assert_eq!(b.change, -12);
    }

    #[test]
    fn win_gain_shrinks_as_the_gap_already_favors_a() {
        // Diminishing returns against weaker opponents: the larger A's lead,
        // the smaller the reward for beating B.
        let mut last_gain = i64::MAX;
        for rating_a in [1500, 1550, 1650, 1800] {
            let (a, _) = apply_outcome(rating_a, 1500, 1.0);
            assert!(a.change < last_gain, "gain did not shrink at {rating_a}");
            last_gain = a.change;
        }
    }

    #[test]
    fn underdog_win_swings_harder_than_favorite_win() {
        let (underdog, favorite) = apply_outcome(1400, 1700, 1.0);
        assert!(underdog.change > 12);
        assert!(favorite.change < -12);
    }
}
