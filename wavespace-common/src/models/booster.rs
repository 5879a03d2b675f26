// File: wavespace-common/src/models/booster.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purchasable earn multipliers. Cost and multiplier travel with the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterType {
    Double,
    Triple,
    Mega,
}

impl BoosterType {
    pub const ALL: [BoosterType; 3] = [BoosterType::Double, BoosterType::Triple, BoosterType::Mega];

    pub fn cost(&self) -> i64 {
        match self {
            BoosterType::Double => 500,
            BoosterType::Triple => 1000,
            BoosterType::Mega => 2000,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            BoosterType::Double => 2.0,
            BoosterType::Triple => 3.0,
            BoosterType::Mega => 5.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoosterType::Double => "double",
            BoosterType::Triple => "triple",
            BoosterType::Mega => "mega",
        }
    }
}

impl fmt::Display for BoosterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoosterType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "double" | "booster_double" => Ok(BoosterType::Double),
            "triple" | "booster_triple" => Ok(BoosterType::Triple),
            "mega" | "booster_mega" => Ok(BoosterType::Mega),
            _ => Err(format!("Unknown booster type: {}", s)),
        }
    }
}

/// The single booster a user may have. Inert once `now > end_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBooster {
    pub user_id: Uuid,
    pub booster_type: BoosterType,
    pub multiplier: f64,
    pub start_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub end_time: DateTime<Utc>,
}

impl ActiveBooster {
    pub fn new(user_id: Uuid, booster_type: BoosterType, start_time: DateTime<Utc>, duration_seconds: i64) -> Self {
        let duration_ms = duration_seconds * 1000;
        Self {
            user_id,
            booster_type,
            multiplier: booster_type.multiplier(),
            start_time,
            duration_ms,
            end_time: start_time + chrono::Duration::milliseconds(duration_ms),
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.end_time
    }

    pub fn multiplier_at(&self, now: DateTime<Utc>) -> f64 {
        if self.is_active_at(now) { self.multiplier } else { 1.0 }
    }
}

/// `floor(requested * multiplier)`, or `None` when the product does not fit in an `i64`.
pub fn scale_amount(requested: i64, multiplier: f64) -> Option<i64> {
    if multiplier <= 1.0 {
        return Some(requested);
    }
    let scaled = (requested as f64 * multiplier).floor();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
        return None;
    }
    Some(scaled as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booster_expires_strictly_after_end_time() {
        let start = Utc::now();
        let booster = ActiveBooster::new(Uuid::new_v4(), BoosterType::Double, start, 60);
        assert_eq!(booster.duration_ms, 60_000);
        assert_eq!(booster.multiplier_at(booster.end_time), 2.0);
        let later = booster.end_time + chrono::Duration::milliseconds(1);
        assert_eq!(booster.multiplier_at(later), 1.0);
    }

    #[test]
    fn scaling_floors_fractional_results() {
        assert_eq!(scale_amount(100, 2.0), Some(200));
        assert_eq!(scale_amount(7, 1.5), Some(10));
        assert_eq!(scale_amount(7, 1.0), Some(7));
    }

    #[test]
    fn scaling_past_i64_is_refused() {
        assert_eq!(scale_amount(i64::MAX / 2 + 10, 2.0), None);
        assert_eq!(scale_amount(i64::MAX, 5.0), None);
        assert_eq!(scale_amount(i64::MAX, 1.0), Some(i64::MAX));
    }
}
