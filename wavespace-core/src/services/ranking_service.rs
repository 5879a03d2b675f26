// src/services/ranking_service.rs

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::Error;
use crate::models::{MonthlyEarning, RankedBalance, UserRank};
use crate::repositories::RankingRepository;
use crate::services::ledger_service::LedgerService;
use crate::services::reward_service::month_bounds;

pub const MAX_RANKING_LIMIT: i64 = 100;

/// Read-only leaderboards over balances and the transaction log.
pub struct RankingService {
    ledger: Arc<LedgerService>,
    ranking_repo: Arc<dyn RankingRepository>,
}

fn start_of_day(day: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>, Error> {
    day.and_hms_opt(0, 0, 0)
        .and_then(|local| offset.from_local_datetime(&local).single())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Validation(format!("cannot resolve start of {day}")))
}

impl RankingService {
    pub fn new(ledger: Arc<LedgerService>, ranking_repo: Arc<dyn RankingRepository>) -> Self {
        Self { ledger, ranking_repo }
    }

    fn check_limit(limit: i64) -> Result<(), Error> {
        if !(1..=MAX_RANKING_LIMIT).contains(&limit) {
            return Err(Error::Validation(format!("limit must be between 1 and {MAX_RANKING_LIMIT}")));
        }
        Ok(())
    }

    async fn username_of(&self, user_id: Uuid) -> Result<Option<String>, Error> {
        let identity = self
            .ledger
            .store_call(self.ledger.identity().find_identity(user_id))
            .await?;
        Ok(identity.map(|i| i.username))
    }

    pub async fn top_balances(&self, limit: i64) -> Result<Vec<RankedBalance>, Error> {
        Self::check_limit(limit)?;
        let rows = self.ledger.store_call(self.ranking_repo.top_balances(limit)).await?;

        let mut ranked = Vec::with_capacity(rows.len());
        for (idx, balance) in rows.into_iter().enumerate() {
            ranked.push(RankedBalance {
                rank: idx as i64 + 1,
                user_id: balance.user_id,
                username: self.username_of(balance.user_id).await?,
                current_points: balance.current_points,
                tier: self.ledger.tiers().tier_for(balance.current_points).name.clone(),
            });
        }
        Ok(ranked)
    }

    /// Ranks users by points earned (kind `earn` only) inside one platform-calendar month.
    pub async fn monthly_earned_ranking(
        &self,
        year: i32,
        month: u32,
        limit: i64,
    ) -> Result<Vec<MonthlyEarning>, Error> {
        Self::check_limit(limit)?;
        let offset = self.ledger.config().day_offset()?;
        let (first, last) = month_bounds(year, month)?;
        let next_first = last
            .succ_opt()
            .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month}")))?;
        let from = start_of_day(first, offset)?;
        let to = start_of_day(next_first, offset)?;

        let rows = self
            .ledger
            .store_call(self.ranking_repo.earned_totals_between(from, to, limit))
            .await?;

        let mut ranked = Vec::with_capacity(rows.len());
        for (idx, (user_id, monthly_points)) in rows.into_iter().enumerate() {
            ranked.push(MonthlyEarning {
                rank: idx as i64 + 1,
                user_id,
                username: self.username_of(user_id).await?,
                monthly_points,
            });
        }
        Ok(ranked)
    }

    /// 1-based position by current balance. Ties share the better rank.
    pub async fn user_rank(&self, user_id: Uuid) -> Result<UserRank, Error> {
        let balance = self
            .ledger
            .store_call(self.ledger.ledger_repo().read_balance(user_id))
            .await?;
        let Some(balance) = balance else {
            return Ok(UserRank { user_id, rank: None, current_points: 0 });
        };
        let above = self
            .ledger
            .store_call(self.ranking_repo.count_balances_above(balance.current_points))
            .await?;
        Ok(UserRank {
            user_id,
            rank: Some(above + 1),
            current_points: balance.current_points,
        })
    }
}
