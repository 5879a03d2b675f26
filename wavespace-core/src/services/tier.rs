// src/services/tier.rs

use crate::Error;
use crate::models::{Tier, TierProgress};

/// Balance thresholds for levels 1 through 10.
const LEVEL_THRESHOLDS: [i64; 10] = [0, 100, 500, 1_000, 2_500, 5_000, 10_000, 20_000, 50_000, 100_000];

/// Fixed, contiguous tier bands covering `[0, ∞)`, sorted by `min_points`.
#[derive(Debug, Clone)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TierTable {
    /// Builds a table after checking it starts at zero, has no gaps or overlaps, and
    /// leaves only the last band open-ended.
    pub fn new(mut tiers: Vec<Tier>) -> Result<Self, Error> {
        if tiers.is_empty() {
            return Err(Error::Config("tier table is empty".into()));
        }
        tiers.sort_by_key(|t| t.min_points);

        if tiers[0].min_points != 0 {
            return Err(Error::Config(format!(
                "lowest tier '{}' must start at 0, starts at {}",
                tiers[0].name, tiers[0].min_points
            )));
        }
        for pair in tiers.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if lower.max_points != Some(upper.min_points - 1) {
                return Err(Error::Config(format!(
                    "tier '{}' must end at {} to meet '{}'",
                    lower.name,
                    upper.min_points - 1,
                    upper.name
                )));
            }
        }
        if let Some(last) = tiers.last() {
            if last.max_points.is_some() {
                return Err(Error::Config(format!("top tier '{}' must be open-ended", last.name)));
            }
        }

        Ok(Self { tiers })
    }

    pub fn standard() -> Self {
        Self {
            tiers: vec![
                Tier::new("Bronze", 0, Some(999), "#CD7F32"),
                Tier::new("Silver", 1_000, Some(4_999), "#6B7280"),
                Tier::new("Gold", 5_000, Some(9_999), "#F59E0B"),
                Tier::new("Platinum", 10_000, Some(24_999), "#14B8A6"),
                Tier::new("Diamond", 25_000, Some(49_999), "#3B82F6"),
                Tier::new("Master", 50_000, Some(99_999), "#8B5CF6"),
                Tier::new("Grandmaster", 100_000, Some(199_999), "#EF4444"),
                Tier::new("Challenger", 200_000, None, "#F97316"),
            ],
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Highest tier whose `min_points` is at or below `points`. Negative input maps to
    /// the lowest tier.
    pub fn tier_for(&self, points: i64) -> &Tier {
        self.tiers
            .iter()
            .rev()
            .find(|t| points >= t.min_points)
            .unwrap_or(&self.tiers[0])
    }

    pub fn next_tier(&self, tier: &Tier) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.min_points > tier.min_points)
    }

    pub fn progress_toward(points: i64, tier: &Tier, next_tier: Option<&Tier>) -> TierProgress {
        let Some(next) = next_tier else {
            return TierProgress { percent: 100.0, points_needed: 0 };
        };
        let span = (next.min_points - tier.min_points) as f64;
        let percent = if span <= 0.0 {
            100.0
        } else {
            ((points - tier.min_points) as f64 / span * 100.0).clamp(0.0, 100.0)
        };
        TierProgress {
            percent,
            points_needed: (next.min_points - points).max(0),
        }
    }
}

/// Level 1..=10 for a balance.
pub fn level_for(points: i64) -> u32 {
    LEVEL_THRESHOLDS.iter().filter(|min| points >= **min).count().max(1) as u32
}
