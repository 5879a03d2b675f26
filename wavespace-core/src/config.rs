// wavespace-core/src/config.rs

use std::time::Duration;
use chrono::FixedOffset;

use crate::Error;

/// Points granted for a check-in, by streak length.
#[derive(Debug, Clone)]
pub struct AttendanceSchedule {
    pub daily_points: i64,
    /// `(consecutive_days, bonus)` pairs, paid on the day the streak reaches the count.
    pub milestones: Vec<(i32, i64)>,
}

impl Default for AttendanceSchedule {
    fn default() -> Self {
        Self {
            daily_points: 10,
            milestones: vec![(7, 50), (30, 200)],
        }
    }
}

impl AttendanceSchedule {
    /// Returns `(base, bonus)` for a check-in that brings the streak to `consecutive_days`.
    pub fn reward_for(&self, consecutive_days: i32) -> (i64, i64) {
        let bonus = self
            .milestones
            .iter()
            .filter(|(days, _)| *days == consecutive_days)
            .map(|(_, bonus)| *bonus)
            .sum();
        (self.daily_points, bonus)
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    /// Upper bound on read-modify-write attempts when the store reports a conflict.
    pub max_commit_attempts: u32,
    pub store_timeout: Duration,
    pub history_max_page_size: u32,
    /// Offset of the platform's fixed day boundary from UTC.
    pub day_offset_minutes: i32,
    pub default_booster_seconds: i64,
    pub attendance: AttendanceSchedule,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: Duration::from_secs(180),
            max_commit_attempts: 3,
            store_timeout: Duration::from_secs(5),
            history_max_page_size: 100,
            day_offset_minutes: 0,
            default_booster_seconds: 3600,
            attendance: AttendanceSchedule::default(),
        }
    }
}

impl LedgerConfig {
    pub fn day_offset(&self) -> Result<FixedOffset, Error> {
        FixedOffset::east_opt(self.day_offset_minutes * 60).ok_or_else(|| {
            Error::Config(format!("day offset of {} minutes is out of range", self.day_offset_minutes))
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_commit_attempts == 0 {
            return Err(Error::Config("max_commit_attempts must be at least 1".into()));
        }
        if self.history_max_page_size == 0 {
            return Err(Error::Config("history_max_page_size must be at least 1".into()));
        }
        if self.attendance.daily_points <= 0 {
            return Err(Error::Config("attendance daily_points must be positive".into()));
        }
        if self.default_booster_seconds <= 0 {
            return Err(Error::Config("default_booster_seconds must be positive".into()));
        }
        self.day_offset()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestone_bonus_only_on_exact_day() {
        let schedule = AttendanceSchedule::default();
        assert_eq!(schedule.reward_for(1), (10, 0));
        assert_eq!(schedule.reward_for(7), (10, 50));
        assert_eq!(schedule.reward_for(8), (10, 0));
        assert_eq!(schedule.reward_for(30), (10, 200));
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = LedgerConfig { max_commit_attempts: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(LedgerConfig::default().validate().is_ok());
    }
}
