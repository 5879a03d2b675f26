// File: wavespace-common/src/models/ledger.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booster::ActiveBooster;
use crate::models::reward::{AttendanceRecord, MissionCompletion};

/// Direction of a ledger entry. Amounts are always stored as magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earn,
    Spend,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earn => "earn",
            TransactionKind::Spend => "spend",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
        }
    }

    /// Credits count toward `total_earned`, debits toward `total_spent`.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Earn | TransactionKind::TransferIn)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earn" => Ok(TransactionKind::Earn),
            "spend" => Ok(TransactionKind::Spend),
            "transfer_in" | "transfer-in" => Ok(TransactionKind::TransferIn),
            "transfer_out" | "transfer-out" => Ok(TransactionKind::TransferOut),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

/// Row in `point_balances`.
///
/// `version` increments on every committed mutation and is the guard the store
/// checks before accepting a new balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub user_id: Uuid,
    pub current_points: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl AccountBalance {
    /// Balance assumed for a user who has never transacted.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_points: 0,
            total_earned: 0,
            total_spent: 0,
            last_transaction_at: None,
            version: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.current_points >= 0 && self.current_points == self.total_earned - self.total_spent
    }

    /// Next state after crediting `amount`, or `None` if a counter would overflow.
    pub fn credited(&self, amount: i64, at: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            user_id: self.user_id,
            current_points: self.current_points.checked_add(amount)?,
            total_earned: self.total_earned.checked_add(amount)?,
            total_spent: self.total_spent,
            last_transaction_at: Some(at),
            version: self.version.checked_add(1)?,
        })
    }

    /// Next state after debiting `amount`, or `None` if the balance cannot cover it.
    pub fn debited(&self, amount: i64, at: DateTime<Utc>) -> Option<Self> {
        if self.current_points < amount {
            return None;
        }
        Some(Self {
            user_id: self.user_id,
            current_points: self.current_points - amount,
            total_earned: self.total_earned,
            total_spent: self.total_spent.checked_add(amount)?,
            last_transaction_at: Some(at),
            version: self.version.checked_add(1)?,
        })
    }
}

/// Immutable row in `point_transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub category: String,
    pub description: String,
    pub related_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn signed_amount(&self) -> i64 {
        if self.kind.is_credit() { self.amount } else { -self.amount }
    }
}

/// Keyset position in a reverse-chronological history listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl From<&TransactionRecord> for HistoryCursor {
    fn from(record: &TransactionRecord) -> Self {
        Self { created_at: record.created_at, id: record.id }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Only rows strictly older than this position, ordered on `(created_at, id)`.
    pub before: Option<(DateTime<Utc>, Uuid)>,
}

impl TransactionFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at > until {
                return false;
            }
        }
        if let Some(before) = self.before {
            if (record.created_at, record.id) >= before {
                return false;
            }
        }
        true
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page: page.max(1), page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// A guarded balance write: the store applies `next` only if the stored row is
/// still at `expected_version` (`None` means "no row yet").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub expected_version: Option<i64>,
    pub next: AccountBalance,
}

/// Everything one ledger operation writes. The store applies it all or nothing.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    pub balances: Vec<BalanceUpdate>,
    pub transactions: Vec<TransactionRecord>,
    pub attendance: Option<AttendanceRecord>,
    pub mission: Option<MissionCompletion>,
    /// Replaces the user's stored booster as part of the same commit.
    pub booster: Option<ActiveBooster>,
}

impl LedgerBatch {
    pub fn affected_users(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.balances.iter().map(|b| b.next.user_id).collect();
        users.sort();
        users.dedup();
        users
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateRecord {
    Attendance,
    Mission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// A balance guard failed; nothing was written.
    Conflict,
    /// A uniqueness key already existed; nothing was written.
    Duplicate(DuplicateRecord),
}

/// Change notification emitted after a commit becomes visible.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    PointsEarned {
        user_id: Uuid,
        transaction_id: Uuid,
        amount: i64,
        category: String,
        balance: i64,
    },
    PointsSpent {
        user_id: Uuid,
        transaction_id: Uuid,
        amount: i64,
        category: String,
        balance: i64,
    },
    PointsTransferred {
        from_user_id: Uuid,
        to_user_id: Uuid,
        transaction_id: Uuid,
        amount: i64,
    },
    CheckedIn {
        user_id: Uuid,
        consecutive_days: i32,
        points_earned: i64,
    },
    MissionCompleted {
        user_id: Uuid,
        mission_id: String,
        points_earned: i64,
    },
    BoosterActivated(ActiveBooster),
}

impl LedgerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::PointsEarned { .. } => "points.earned",
            LedgerEvent::PointsSpent { .. } => "points.spent",
            LedgerEvent::PointsTransferred { .. } => "points.transferred",
            LedgerEvent::CheckedIn { .. } => "attendance.checked_in",
            LedgerEvent::MissionCompleted { .. } => "mission.completed",
            LedgerEvent::BoosterActivated(_) => "booster.activated",
        }
    }
}
