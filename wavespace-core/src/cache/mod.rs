// src/cache/mod.rs

pub mod ledger_cache;

pub use ledger_cache::{CacheKey, CachedValue, LedgerCache};
