use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use crate::error::Error;
use crate::models::{
    AccountBalance, ActiveBooster, AttendanceRecord, CommitOutcome, Identity, LedgerBatch,
    MissionCompletion, PageRequest, TransactionFilter, TransactionRecord,
};

/// The durable store behind the ledger.
///
/// `commit` is the only write path: it applies every guarded balance update, every
/// transaction append and the optional attendance/mission record as one atomic unit,
/// or none of them. A booster carried by the batch replaces the stored one.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn read_balance(&self, user_id: Uuid) -> Result<Option<AccountBalance>, Error>;

    async fn commit(&self, batch: &LedgerBatch) -> Result<CommitOutcome, Error>;

    /// Reverse-chronological on `(created_at, id)`.
    async fn query_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<Vec<TransactionRecord>, Error>;

    /// Most recent attendance row on or before `date`.
    async fn latest_attendance(
        &self,
        user_id: Uuid,
        on_or_before: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, Error>;

    /// Ascending by date, both ends inclusive.
    async fn list_attendance(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, Error>;

    async fn find_mission_completion(
        &self,
        user_id: Uuid,
        mission_id: &str,
        day: NaiveDate,
    ) -> Result<Option<MissionCompletion>, Error>;
}

/// Aggregate reads over balances and the transaction log. No write-path contract.
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// Highest balances first; ties broken by user id.
    async fn top_balances(&self, limit: i64) -> Result<Vec<AccountBalance>, Error>;

    /// Sum of `earn` amounts per user with `from <= created_at < to`, highest first.
    async fn earned_totals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(Uuid, i64)>, Error>;

    async fn count_balances_above(&self, points: i64) -> Result<i64, Error>;
}

/// Stored booster state, at most one per user. Written through `LedgerRepository::commit`.
#[async_trait]
pub trait BoosterRepository: Send + Sync {
    async fn get_booster(&self, user_id: Uuid) -> Result<Option<ActiveBooster>, Error>;

    /// Removes the booster only if it is still the one ending at `end_time`.
    async fn clear_booster(&self, user_id: Uuid, end_time: DateTime<Utc>) -> Result<(), Error>;
}

/// Read-only identity collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_username(&self, username: &str) -> Result<Option<Uuid>, Error>;

    async fn find_identity(&self, user_id: Uuid) -> Result<Option<Identity>, Error>;
}
