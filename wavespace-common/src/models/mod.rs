// File: wavespace-common/src/models/mod.rs
pub mod ledger;
pub mod reward;
pub mod booster;
pub mod tier;
pub mod shop;
pub mod identity;
pub mod ranking;

pub use ledger::{
    AccountBalance, BalanceUpdate, CommitOutcome, DuplicateRecord, HistoryCursor, LedgerBatch,
    LedgerEvent, PageRequest, TransactionFilter, TransactionKind, TransactionRecord,
};
pub use reward::{ActivityKind, AttendanceRecord, CheckInResult, GiftResult, MissionCompletion, MissionResult};
pub use booster::{ActiveBooster, BoosterType};
pub use tier::{Standing, Tier, TierProgress};
pub use shop::{ShopItem, ShopListing, ShopReceipt};
pub use identity::Identity;
pub use ranking::{MonthlyEarning, RankedBalance, UserRank};
