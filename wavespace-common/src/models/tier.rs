use serde::{Deserialize, Serialize};

use crate::models::ledger::AccountBalance;

/// A named band of balance values. `max_points` is `None` for the top band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub min_points: i64,
    pub max_points: Option<i64>,
    pub color: String,
}

impl Tier {
    pub fn new(name: &str, min_points: i64, max_points: Option<i64>, color: &str) -> Self {
        Self {
            name: name.to_string(),
            min_points,
            max_points,
            color: color.to_string(),
        }
    }

    pub fn contains(&self, points: i64) -> bool {
        points >= self.min_points && self.max_points.is_none_or(|max| points <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierProgress {
    pub percent: f64,
    pub points_needed: i64,
}

/// Balance plus everything derived from it on read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub balance: AccountBalance,
    pub tier: Tier,
    pub next_tier: Option<Tier>,
    pub progress: TierProgress,
    pub level: u32,
}
