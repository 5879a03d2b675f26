// src/services/reward_service.rs

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Error;
use crate::clock::platform_day;
use crate::models::{
    ActivityKind, AttendanceRecord, CheckInResult, GiftResult, LedgerEvent, MissionResult,
};
use crate::services::ledger_service::{Attachment, Entry, LedgerService};

pub const CATEGORY_ATTENDANCE: &str = "attendance";
pub const CATEGORY_DAILY_MISSION: &str = "daily_mission";
pub const CATEGORY_GIFT: &str = "gift";

/// Engagement Reward Engine: turns check-ins, missions, gifts and community activity
/// into ledger entries.
pub struct RewardService {
    ledger: Arc<LedgerService>,
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), Error> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month}")))?;
    Ok((first, last))
}

impl RewardService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        debug!("Initializing RewardService");
        Self { ledger }
    }

    /// Today's date on the platform's fixed day boundary.
    pub fn today(&self) -> Result<NaiveDate, Error> {
        let offset = self.ledger.config().day_offset()?;
        Ok(platform_day(self.ledger.now(), offset))
    }

    pub async fn check_in_today(&self, user_id: Uuid) -> Result<CheckInResult, Error> {
        let today = self.today()?;
        self.check_in(user_id, today).await
    }

    fn reject_future(&self, date: NaiveDate) -> Result<NaiveDate, Error> {
        let platform_today = self.today()?;
        if date > platform_today {
            return Err(Error::Validation(format!(
                "{date} is after the current platform day {platform_today}"
            )));
        }
        Ok(platform_today)
    }

    /// Records attendance for `today` and credits the day's reward in one commit.
    /// `today` may not lie in the future or before the user's latest check-in.
    pub async fn check_in(&self, user_id: Uuid, today: NaiveDate) -> Result<CheckInResult, Error> {
        let platform_today = self.reject_future(today)?;
        let previous = self
            .ledger
            .store_call(self.ledger.ledger_repo().latest_attendance(user_id, platform_today))
            .await?;
        match previous.as_ref().map(|p| p.attendance_date) {
            Some(latest) if latest == today => {
                return Err(Error::AlreadyCheckedIn { user_id, date: today });
            }
            Some(latest) if latest > today => {
                return Err(Error::Validation(format!(
                    "cannot check in for {today}: already checked in on {latest}"
                )));
            }
            _ => {}
        }

        let consecutive_days = AttendanceRecord::next_streak(previous.as_ref(), today);
        let (base, bonus) = self.ledger.config().attendance.reward_for(consecutive_days);
        let description = if bonus > 0 {
            format!("Daily check-in ({consecutive_days}-day streak bonus)")
        } else {
            "Daily check-in".to_string()
        };

        let entry = Entry::credit(user_id, base + bonus, CATEGORY_ATTENDANCE, &description)
            .related(Some(today.to_string()))
            .attach(Attachment::Attendance { date: today, consecutive_days, bonus_points: bonus });
        let posted = self.ledger.post_entry(entry).await?;

        debug!(%user_id, %today, consecutive_days, "check-in recorded");
        self.ledger.event_bus().publish(LedgerEvent::CheckedIn {
            user_id,
            consecutive_days,
            points_earned: posted.transaction.amount,
        });

        Ok(CheckInResult {
            consecutive_days,
            points_earned: posted.transaction.amount,
            total_points: posted.balance.current_points,
        })
    }

    /// Credits a mission reward at most once per `(user, mission, day)`.
    pub async fn complete_daily_mission(
        &self,
        user_id: Uuid,
        mission_id: &str,
        reward: i64,
        today: NaiveDate,
    ) -> Result<MissionResult, Error> {
        if mission_id.trim().is_empty() {
            return Err(Error::Validation("mission_id must not be empty".into()));
        }
        self.reject_future(today)?;

        let existing = self
            .ledger
            .store_call(self.ledger.ledger_repo().find_mission_completion(user_id, mission_id, today))
            .await?;
        if existing.is_some() {
            return Err(Error::AlreadyCompleted {
                user_id,
                mission_id: mission_id.to_string(),
                date: today,
            });
        }

        let entry = Entry::credit(
            user_id,
            reward,
            CATEGORY_DAILY_MISSION,
            &format!("Daily mission: {mission_id}"),
        )
            .related(Some(mission_id.to_string()))
            .attach(Attachment::Mission { mission_id: mission_id.to_string(), day: today });
        let posted = self.ledger.post_entry(entry).await?;

        self.ledger.event_bus().publish(LedgerEvent::MissionCompleted {
            user_id,
            mission_id: mission_id.to_string(),
            points_earned: posted.transaction.amount,
        });

        Ok(MissionResult {
            transaction_id: posted.transaction.id,
            points_earned: posted.transaction.amount,
            total_points: posted.balance.current_points,
        })
    }

    /// Sends points to another member by username.
    pub async fn gift_points(
        &self,
        from_user_id: Uuid,
        to_username: &str,
        amount: i64,
        message: &str,
    ) -> Result<GiftResult, Error> {
        if amount <= 0 {
            return Err(Error::Validation(format!("amount must be a positive integer, got {amount}")));
        }
        let username = to_username.trim();
        let recipient_id = self
            .ledger
            .store_call(self.ledger.identity().resolve_username(username))
            .await?
            .ok_or_else(|| Error::InvalidRecipient(format!("user '{username}' not found")))?;
        if recipient_id == from_user_id {
            return Err(Error::InvalidRecipient("cannot gift points to yourself".into()));
        }

        let description = if message.trim().is_empty() {
            format!("Gift to {username}")
        } else {
            message.trim().to_string()
        };
        let transaction_id = self
            .ledger
            .transfer_with_category(from_user_id, recipient_id, amount, CATEGORY_GIFT, &description)
            .await?;

        info!(%from_user_id, %recipient_id, amount, "gift sent");
        Ok(GiftResult {
            transaction_id,
            recipient_id,
            amount,
            message: description,
        })
    }

    /// Fixed-rate reward for a community action.
    pub async fn reward_activity(
        &self,
        user_id: Uuid,
        kind: ActivityKind,
        related_id: Option<String>,
    ) -> Result<Uuid, Error> {
        self.ledger
            .earn(user_id, kind.points(), kind.category(), kind.description(), related_id)
            .await
    }

    /// Attendance records inside one calendar month, oldest first.
    pub async fn monthly_attendance(
        &self,
        user_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        let (first, last) = month_bounds(year, month)?;
        self.ledger
            .store_call(self.ledger.ledger_repo().list_attendance(user_id, first, last))
            .await
    }

    /// Current streak as of `today`: the latest record's count if it is from today or
    /// yesterday, otherwise zero.
    pub async fn current_streak(&self, user_id: Uuid, today: NaiveDate) -> Result<i32, Error> {
        let latest = self
            .ledger
            .store_call(self.ledger.ledger_repo().latest_attendance(user_id, today))
            .await?;
        Ok(match latest {
            Some(rec) if rec.attendance_date == today || today.pred_opt() == Some(rec.attendance_date) => {
                rec.consecutive_days
            }
            _ => 0,
        })
    }
}
