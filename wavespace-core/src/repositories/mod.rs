// src/repositories/mod.rs

pub use wavespace_common::traits::repository_traits::{
    BoosterRepository, IdentityProvider, LedgerRepository, RankingRepository,
};

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryIdentityProvider, InMemoryStore};
pub use postgres::{
    PostgresBoosterRepository, PostgresIdentityProvider, PostgresLedgerRepository,
};
