// File: src/cache/ledger_cache.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{AccountBalance, PageRequest, Standing, TransactionFilter, TransactionRecord};

/// Which read a cached value answers. Always scoped to one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Balance,
    Standing,
    History { filter: TransactionFilter, page: PageRequest },
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Balance(AccountBalance),
    Standing(Standing),
    History(Vec<TransactionRecord>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    expires_at: DateTime<Utc>,
}

/// Per-user cache state. `generation` only ever grows, so slots are never removed.
#[derive(Debug, Default)]
struct UserSlot {
    generation: u64,
    entries: HashMap<CacheKey, CacheEntry>,
}

/// Read-through cache for balance, standing and history reads.
///
/// Readers capture [`LedgerCache::generation`] before going to the store and hand it
/// back to [`LedgerCache::insert`]; an invalidation in between bumps the generation and
/// the late insert is dropped. Both operations take the same per-user map entry, so
/// they cannot interleave.
pub struct LedgerCache {
    slots: DashMap<Uuid, UserSlot>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl LedgerCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, enabled: bool) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        Self {
            slots: DashMap::new(),
            ttl,
            clock,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn generation(&self, user_id: Uuid) -> u64 {
        self.slots.get(&user_id).map(|s| s.generation).unwrap_or(0)
    }

    /// Returns the cached value if present and not past its TTL. Expired entries are
    /// dropped on the way out.
    pub fn get(&self, user_id: Uuid, key: &CacheKey) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }
        let now = self.clock.now();
        let mut slot = self.slots.get_mut(&user_id)?;
        let expired = match slot.entries.get(key) {
            Some(entry) if now <= entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            slot.entries.remove(key);
            trace!(%user_id, ?key, "cache entry expired");
        }
        None
    }

    /// Stores `value` unless the user was invalidated after `generation` was read.
    /// Returns whether the value was stored.
    pub fn insert(&self, user_id: Uuid, key: CacheKey, value: CachedValue, generation: u64) -> bool {
        if !self.enabled {
            return false;
        }
        let expires_at = self.clock.now() + self.ttl;
        let mut slot = self.slots.entry(user_id).or_default();
        if slot.generation != generation {
            trace!(%user_id, ?key, "skipping stale cache fill");
            return false;
        }
        slot.entries.insert(key, CacheEntry { value, expires_at });
        true
    }

    /// Drops every entry of `user_id` and fences out in-flight fills.
    pub fn invalidate_user(&self, user_id: Uuid) {
        let mut slot = self.slots.entry(user_id).or_default();
        slot.generation += 1;
        slot.entries.clear();
    }

    pub fn invalidate_users(&self, user_ids: &[Uuid]) {
        for user_id in user_ids {
            self.invalidate_user(*user_id);
        }
    }

    /// Removes expired entries across all users. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for mut slot in self.slots.iter_mut() {
            let before = slot.entries.len();
            slot.entries.retain(|_, entry| now <= entry.expires_at);
            removed += before - slot.entries.len();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|s| s.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn setup(ttl_secs: u64) -> (Arc<ManualClock>, LedgerCache) {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid time");
        let clock = Arc::new(ManualClock::new(start));
        let cache = LedgerCache::new(Duration::from_secs(ttl_secs), clock.clone(), true);
        (clock, cache)
    }

    fn balance(user_id: Uuid, points: i64) -> CachedValue {
        let mut b = AccountBalance::empty(user_id);
        b.current_points = points;
        b.total_earned = points;
        CachedValue::Balance(b)
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (clock, cache) = setup(180);
        let user = Uuid::new_v4();
        assert!(cache.insert(user, CacheKey::Balance, balance(user, 5), cache.generation(user)));
        assert!(cache.get(user, &CacheKey::Balance).is_some());

        clock.advance(chrono::Duration::seconds(181));
        assert!(cache.get(user, &CacheKey::Balance).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn fill_started_before_invalidation_is_discarded() {
        let (_clock, cache) = setup(180);
        let user = Uuid::new_v4();

        let generation = cache.generation(user);
        cache.invalidate_user(user);
        assert!(!cache.insert(user, CacheKey::Balance, balance(user, 5), generation));
        assert!(cache.get(user, &CacheKey::Balance).is_none());
    }

    #[test]
    fn invalidation_is_scoped_to_one_user() {
        let (_clock, cache) = setup(180);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.insert(a, CacheKey::Balance, balance(a, 1), 0);
        cache.insert(b, CacheKey::Balance, balance(b, 2), 0);

        cache.invalidate_user(a);
        assert!(cache.get(a, &CacheKey::Balance).is_none());
        assert!(cache.get(b, &CacheKey::Balance).is_some());
    }

    #[test]
    fn purge_counts_removed_entries() {
        let (clock, cache) = setup(10);
        let user = Uuid::new_v4();
        cache.insert(user, CacheKey::Balance, balance(user, 1), 0);
        let page = CacheKey::History { filter: TransactionFilter::default(), page: PageRequest::new(1, 20) };
        cache.insert(user, page, CachedValue::History(Vec::new()), 0);
        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(cache.purge_expired(), 2);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = LedgerCache::new(Duration::from_secs(180), clock, false);
        let user = Uuid::new_v4();
        assert!(!cache.insert(user, CacheKey::Balance, balance(user, 1), 0));
        assert!(cache.get(user, &CacheKey::Balance).is_none());
    }
}
