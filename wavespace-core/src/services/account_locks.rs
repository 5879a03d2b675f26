// src/services/account_locks.rs

use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-account async locks for this process.
///
/// Serializes read-modify-write cycles on the same account so concurrent requests
/// against one server never race each other into the retry loop. Other processes
/// are still fenced by the store's version guard.
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Held locks, released on drop.
#[derive(Debug)]
pub struct AccountGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn lock(&self, user_id: Uuid) -> AccountGuard {
        let guard = self.handle(user_id).lock_owned().await;
        AccountGuard { _guards: vec![guard] }
    }

    /// Locks every account in ascending id order, so two overlapping transfers
    /// cannot wait on each other.
    pub async fn lock_many(&self, user_ids: &[Uuid]) -> AccountGuard {
        let mut ids = user_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.handle(id).lock_owned().await);
        }
        AccountGuard { _guards: guards }
    }

    /// Drops lock entries nobody is holding or waiting on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
