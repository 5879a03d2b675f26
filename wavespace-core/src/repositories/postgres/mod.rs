// src/repositories/postgres/mod.rs

pub mod ledger;
pub mod booster;
pub mod identity;

pub use ledger::PostgresLedgerRepository;
pub use booster::PostgresBoosterRepository;
pub use identity::PostgresIdentityProvider;
