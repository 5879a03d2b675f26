// File: src/services/mod.rs

pub mod account_locks;
pub mod booster_service;
pub mod ledger_service;
pub mod ranking_service;
pub mod reward_service;
pub mod shop_service;
pub mod tier;

pub use booster_service::BoosterService;
pub use ledger_service::LedgerService;
pub use ranking_service::RankingService;
pub use reward_service::RewardService;
pub use shop_service::ShopService;
pub use tier::{level_for, TierTable};
