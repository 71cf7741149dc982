//! Badge tiers and percentile display for rated ideas.
//!
//! Pure functions, no I/O. The percentile approximates a normal distribution
//! centered at 1500 with standard deviation 50 via a fixed z-score lookup.
//! It is a display heuristic, not a fitted model, and existing clients depend
//! on the exact step values.

use serde::Serialize;

use crate::model::MIN_RANKED_MATCHES;

/// Discrete named rank derived from dual (Elo, match-count) thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BadgeTier {
    Legendary,
    Platinum,
    Gold,
    Silver,
    Bronze,
    Emerging,
}

/// (tier, min Elo, min matches), checked highest first; both thresholds must hold.
const TIER_THRESHOLDS: [(BadgeTier, i64, u32); 6] = [
    (BadgeTier::Legendary, 1700, 10),
    (BadgeTier::Platinum, 1650, 8),
    (BadgeTier::Gold, 1600, 6),
    (BadgeTier::Silver, 1550, 5),
    (BadgeTier::Bronze, 1500, 4),
    (BadgeTier::Emerging, 1450, 3),
];

impl BadgeTier {
    pub fn name(&self) -> &'static str {
        match self {
            BadgeTier::Legendary => "Legendary",
            BadgeTier::Platinum => "Platinum",
            BadgeTier::Gold => "Gold",
            BadgeTier::Silver => "Silver",
            BadgeTier::Bronze => "Bronze",
            BadgeTier::Emerging => "Emerging",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            BadgeTier::Legendary => "#ff8c00",
            BadgeTier::Platinum => "#e5e4e2",
            BadgeTier::Gold => "#ffd700",
            BadgeTier::Silver => "#c0c0c0",
            BadgeTier::Bronze => "#cd7f32",
            BadgeTier::Emerging => "#6abf69",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BadgeTier::Legendary => "Dominant across many matchups",
            BadgeTier::Platinum => "Consistently beats strong ideas",
            BadgeTier::Gold => "Strong competitive record",
            BadgeTier::Silver => "Holds its own against peers",
            BadgeTier::Bronze => "Established in the ranked pool",
            BadgeTier::Emerging => "Early competitive signal",
        }
    }
}

/// Badge state of one idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BadgeStatus {
    /// Fewer than the minimum ranked matches; no badge regardless of Elo.
    NotYetRanked,
    /// Enough matches, but no tier's dual threshold is met.
    Unbadged,
    Tier(BadgeTier),
}

impl BadgeStatus {
    pub fn name(&self) -> &'static str {
        match self {
            BadgeStatus::NotYetRanked => "Not yet ranked",
            BadgeStatus::Unbadged => "Unbadged",
            BadgeStatus::Tier(t) => t.name(),
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            BadgeStatus::NotYetRanked | BadgeStatus::Unbadged => "#9e9e9e",
            BadgeStatus::Tier(t) => t.color(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BadgeStatus::NotYetRanked => "Needs more matches before ranking",
            BadgeStatus::Unbadged => "Ranked, needs more evaluation",
            BadgeStatus::Tier(t) => t.description(),
        }
    }
}

/// Highest tier whose dual threshold is satisfied, checked top-down.
pub fn badge_for(elo_score: i64, match_count: u32) -> BadgeStatus {
    if match_count < MIN_RANKED_MATCHES {
        return BadgeStatus::NotYetRanked;
    }
    for (tier, min_elo, min_matches) in TIER_THRESHOLDS {
        if elo_score >= min_elo && match_count >= min_matches {
            return BadgeStatus::Tier(tier);
        }
    }
    BadgeStatus::Unbadged
}

/// Approximate percentile of an Elo score among the rated population.
///
/// z-score against N(1500, 50), mapped through a step table with inclusive
/// `>=` boundaries on the documented side.
pub fn percentile(elo_score: i64) -> u8 {
    let z = (elo_score as f64 - 1500.0) / 50.0;
    const STEPS: [(f64, u8); 10] = [
        (2.5, 99),
        (2.0, 98),
        (1.5, 93),
        (1.0, 84),
        (0.5, 69),
        (0.0, 50),
        (-0.5, 31),
        (-1.0, 16),
        (-1.5, 7),
        (-2.0, 2),
    ];
    for (min_z, pct) in STEPS {
        if z >= min_z {
            return pct;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_exact_boundaries() {
        assert_eq!(
            badge_for(1700, 10),
            BadgeStatus::Tier(BadgeTier::Legendary)
        );
        // One Elo point short of Legendary falls through to Platinum.
        assert_eq!(badge_for(1699, 10), BadgeStatus::Tier(BadgeTier::Platinum));
        // Enough Elo but not enough matches also falls through.
        assert_eq!(badge_for(1700, 9), BadgeStatus::Tier(BadgeTier::Platinum));
        assert_eq!(badge_for(1500, 4), BadgeStatus::Tier(BadgeTier::Bronze));
        assert_eq!(badge_for(1450, 3), BadgeStatus::Tier(BadgeTier::Emerging));
    }

    #[test]
    fn two_matches_never_earns_a_badge() {
        assert_eq!(badge_for(2000, 2), BadgeStatus::NotYetRanked);
        assert_eq!(badge_for(1500, 0), BadgeStatus::NotYetRanked);
    }

    #[test]
    fn ranked_but_below_every_tier_is_unbadged() {
        assert_eq!(badge_for(1449, 3), BadgeStatus::Unbadged);
        assert_eq!(badge_for(1300, 20), BadgeStatus::Unbadged);
    }

    #[test]
    fn percentile_is_a_step_function_with_inclusive_boundaries() {
        // z == 2.0 exactly (elo 1600) maps to 98, not 93 or 99.
        assert_eq!(percentile(1600), 98);
        assert_eq!(percentile(1625), 99);
        assert_eq!(percentile(1599), 93);
        assert_eq!(percentile(1500), 50);
        assert_eq!(percentile(1475), 31);
        assert_eq!(percentile(1399), 1);
    }
}
