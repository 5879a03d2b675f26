// File: wavespace-common/src/models/reward.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per `(user_id, attendance_date)`. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub user_id: Uuid,
    pub attendance_date: NaiveDate,
    pub consecutive_days: i32,
    /// Points actually credited for the check-in, bonus and booster included.
    pub points_earned: i64,
    /// Milestone bonus portion of the requested reward (before booster scaling).
    pub bonus_points: i64,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Streak length for a check-in on `date`, given the most recent earlier record.
    pub fn next_streak(previous: Option<&AttendanceRecord>, date: NaiveDate) -> i32 {
        match previous {
            Some(prev) if date.pred_opt() == Some(prev.attendance_date) => {
                prev.consecutive_days + 1
            }
            _ => 1,
        }
    }
}

/// Explicit `(user_id, mission_id, completed_on)` completion marker, written in the
/// same commit as the mission's credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionCompletion {
    pub user_id: Uuid,
    pub mission_id: String,
    pub completed_on: NaiveDate,
    pub reward: i64,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInResult {
    pub consecutive_days: i32,
    pub points_earned: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionResult {
    pub transaction_id: Uuid,
    pub points_earned: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiftResult {
    pub transaction_id: Uuid,
    pub recipient_id: Uuid,
    pub amount: i64,
    pub message: String,
}

/// Community actions that earn a fixed number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    LoginDaily,
    PostCreate,
    CommentCreate,
    PostLikeReceived,
    EventParticipation,
    ReferralSignup,
}

impl ActivityKind {
    pub fn points(&self) -> i64 {
        match self {
            ActivityKind::LoginDaily => 10,
            ActivityKind::PostCreate => 50,
            ActivityKind::CommentCreate => 10,
            ActivityKind::PostLikeReceived => 5,
            ActivityKind::EventParticipation => 100,
            ActivityKind::ReferralSignup => 500,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ActivityKind::LoginDaily => "login",
            ActivityKind::PostCreate => "post",
            ActivityKind::CommentCreate => "comment",
            ActivityKind::PostLikeReceived => "like",
            ActivityKind::EventParticipation => "event",
            ActivityKind::ReferralSignup => "referral",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActivityKind::LoginDaily => "Daily login reward",
            ActivityKind::PostCreate => "Post created",
            ActivityKind::CommentCreate => "Comment written",
            ActivityKind::PostLikeReceived => "Post liked",
            ActivityKind::EventParticipation => "Event participation",
            ActivityKind::ReferralSignup => "Referral signed up",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

impl FromStr for ActivityKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" | "login_daily" => Ok(ActivityKind::LoginDaily),
            "post" | "post_create" => Ok(ActivityKind::PostCreate),
            "comment" | "comment_create" => Ok(ActivityKind::CommentCreate),
            "like" | "post_like_received" => Ok(ActivityKind::PostLikeReceived),
            "event" | "event_participation" => Ok(ActivityKind::EventParticipation),
            "referral" | "referral_signup" => Ok(ActivityKind::ReferralSignup),
            _ => Err(format!("Unknown activity: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: NaiveDate, streak: i32) -> AttendanceRecord {
        AttendanceRecord {
            user_id: Uuid::nil(),
            attendance_date: date,
            consecutive_days: streak,
            points_earned: 10,
            bonus_points: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn streak_continues_only_on_the_next_day() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date");
        let prev = record(d(9), 6);
        assert_eq!(AttendanceRecord::next_streak(Some(&prev), d(10)), 7);
        assert_eq!(AttendanceRecord::next_streak(Some(&prev), d(11)), 1);
        assert_eq!(AttendanceRecord::next_streak(None, d(10)), 1);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let prev = record(NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day"), 3);
        let next = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        assert_eq!(AttendanceRecord::next_streak(Some(&prev), next), 4);
    }
}
