//! Performance Scoring
//!
//! Pure functions turning raw play counters into a star rating, an
//! efficiency percentage and bonus qualification.
//!
//! The multipliers below (1.2, 1.4, 1.5, 0.6) and the per-pair time budget are
//! tuned values and must be kept exactly as they are.

use serde::{Serialize, Deserialize};

use crate::core::timer::Millis;
use crate::game::stats::GameStats;

/// Time budget per pair (ms).
pub const MS_PER_PAIR_BUDGET: Millis = 12_000;

/// Flip allowance for three stars.
const THREE_STAR_FLIP_RATIO: f64 = 1.2;
/// Flip allowance for the flip-based second star.
const ONE_STAR_BONUS_FLIP_RATIO: f64 = 1.4;
/// Flip allowance for two stars.
const TWO_STAR_FLIP_RATIO: f64 = 1.5;
/// Fraction of the time budget that earns the time-based third star.
const FAST_FINISH_RATIO: f64 = 0.6;
/// Flip allowance for the perfect-memory bonus.
const PERFECT_BONUS_FLIP_RATIO: f64 = 1.4;

/// Fewest flips that can clear a board of `total_pairs`.
#[inline]
pub fn min_flips(total_pairs: u32) -> u32 {
    total_pairs * 2
}

/// Time budget for a board of `total_pairs`.
#[inline]
pub fn max_time_ms(total_pairs: u32) -> Millis {
    total_pairs as Millis * MS_PER_PAIR_BUDGET
}

/// Star rating for a finished board.
///
/// ```
/// use memory_match::game::scoring::calculate_stars;
///
/// assert_eq!(calculate_stars(0, 12, 1000, 6), 3);
/// assert_eq!(calculate_stars(5, 12, 1000, 6), 1);
/// ```
pub fn calculate_stars(
    errors: u32,
    flip_count: u32,
    completion_time_ms: Millis,
    total_pairs: u32,
) -> u8 {
    let min_flips = min_flips(total_pairs) as f64;
    let max_time = max_time_ms(total_pairs) as f64;
    let flips = flip_count as f64;

    if errors == 0 && flips <= min_flips * THREE_STAR_FLIP_RATIO {
        3
    } else if errors <= 2 && flips <= min_flips * TWO_STAR_FLIP_RATIO {
        if (completion_time_ms as f64) < max_time * FAST_FINISH_RATIO {
            3
        } else {
            2
        }
    } else if errors <= 4 {
        if flips <= min_flips * ONE_STAR_BONUS_FLIP_RATIO {
            2
        } else {
            1
        }
    } else {
        1
    }
}

/// Minimum flips as a rounded percentage of actual flips.
///
/// Returns 0 when nothing was flipped.
pub fn calculate_efficiency(total_pairs: u32, flip_count: u32) -> u32 {
    if flip_count == 0 {
        return 0;
    }
    (min_flips(total_pairs) as f64 / flip_count as f64 * 100.0).round() as u32
}

/// Bonus earned by a finished session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BonusQualification {
    /// No errors and very few extra flips.
    PerfectMemory,
    /// At most one error and at least two stars.
    GreatFocus,
    /// No bonus.
    NotQualified,
}

impl BonusQualification {
    /// True for any bonus.
    pub fn qualifies(self) -> bool {
        !matches!(self, Self::NotQualified)
    }

    /// Message shown with the bonus.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Self::PerfectMemory => Some("Perfect memory! Every pair found without a single mistake."),
            Self::GreatFocus => Some("Great focus! Almost no mistakes."),
            Self::NotQualified => None,
        }
    }
}

/// Check finalized stats for a bonus.
pub fn check_bonus_qualification(stats: &GameStats, total_pairs: u32) -> BonusQualification {
    let min_flips = min_flips(total_pairs) as f64;

    if stats.perfect_run && stats.flip_count as f64 <= min_flips * PERFECT_BONUS_FLIP_RATIO {
        BonusQualification::PerfectMemory
    } else if stats.errors <= 1 && stats.stars >= 2 {
        BonusQualification::GreatFocus
    } else {
        BonusQualification::NotQualified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_three_stars_flawless() {
        // 12 <= 6 * 2 * 1.2 = 14.4
        assert_eq!(calculate_stars(0, 12, 1000, 6), 3);
        assert_eq!(calculate_stars(0, 14, 1000, 6), 3);
    }

    #[test]
    fn test_many_errors_one_star() {
        assert_eq!(calculate_stars(5, 12, 1000, 6), 1);
        assert_eq!(calculate_stars(40, 200, 999_999, 6), 1);
    }

    #[test]
    fn test_zero_errors_too_many_flips_falls_through() {
        // 16 > 14.4 but <= 18, fast finish (< 43200)
        assert_eq!(calculate_stars(0, 16, 1000, 6), 3);
        // same flips, slow finish
        assert_eq!(calculate_stars(0, 16, 50_000, 6), 2);
    }

    #[test]
    fn test_two_star_tier_time_bonus_boundary() {
        // max_time = 72000, 0.6 of it = 43200; strictly less earns the bonus
        assert_eq!(calculate_stars(2, 18, 43_199, 6), 3);
        assert_eq!(calculate_stars(2, 18, 43_200, 6), 2);
    }

    #[test]
    fn test_low_error_tier_flip_bonus() {
        // errors 3-4 skip the two-star tier; 16 <= 16.8 earns the extra star
        assert_eq!(calculate_stars(3, 16, 1000, 6), 2);
        assert_eq!(calculate_stars(4, 17, 1000, 6), 1);
        // errors <= 2 but flips above 1.5x land here too
        assert_eq!(calculate_stars(1, 19, 1000, 6), 1);
    }

    #[test]
    fn test_efficiency() {
        assert_eq!(calculate_efficiency(6, 12), 100);
        assert_eq!(calculate_efficiency(6, 24), 50);
        // 12 / 18 * 100 = 66.67
        assert_eq!(calculate_efficiency(6, 18), 67);
        assert_eq!(calculate_efficiency(6, 0), 0);
    }

    #[test]
    fn test_bonus_perfect_memory() {
        let stats = GameStats {
            flip_count: 16,
            stars: 3,
            ..GameStats::default()
        };
        let bonus = check_bonus_qualification(&stats, 6);
        assert_eq!(bonus, BonusQualification::PerfectMemory);
        assert!(bonus.qualifies());
    }

    #[test]
    fn test_bonus_great_focus() {
        let stats = GameStats {
            flip_count: 14,
            errors: 1,
            perfect_run: false,
            stars: 2,
            ..GameStats::default()
        };
        assert_eq!(check_bonus_qualification(&stats, 6), BonusQualification::GreatFocus);
    }

    #[test]
    fn test_bonus_messages_differ() {
        assert_ne!(
            BonusQualification::PerfectMemory.message(),
            BonusQualification::GreatFocus.message()
        );
        assert_eq!(BonusQualification::NotQualified.message(), None);
    }

    #[test]
    fn test_no_bonus() {
        let stats = GameStats {
            flip_count: 30,
            errors: 2,
            perfect_run: false,
            stars: 2,
            ..GameStats::default()
        };
        let bonus = check_bonus_qualification(&stats, 6);
        assert_eq!(bonus, BonusQualification::NotQualified);
        assert!(!bonus.qualifies());
    }

    proptest! {
        #[test]
        fn prop_stars_in_range(errors in 0u32..50, flips in 0u32..500, time in 0u64..1_000_000, pairs in 1u32..20) {
            let stars = calculate_stars(errors, flips, time, pairs);
            prop_assert!((1..=3).contains(&stars));
        }
    }
}
