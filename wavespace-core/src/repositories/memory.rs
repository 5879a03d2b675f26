// src/repositories/memory.rs
//
// Process-local store with the same commit contract as the Postgres adapter.
// Used by the `memory` server mode and by most tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::Error;
use crate::models::{
    AccountBalance, ActiveBooster, AttendanceRecord, CommitOutcome, DuplicateRecord, Identity,
    LedgerBatch, MissionCompletion, PageRequest, TransactionFilter, TransactionKind,
    TransactionRecord,
};
use crate::repositories::{BoosterRepository, IdentityProvider, LedgerRepository, RankingRepository};

#[derive(Default)]
struct StoreState {
    balances: HashMap<Uuid, AccountBalance>,
    transactions: Vec<TransactionRecord>,
    attendance: BTreeMap<(Uuid, NaiveDate), AttendanceRecord>,
    missions: HashMap<(Uuid, String, NaiveDate), MissionCompletion>,
    boosters: HashMap<Uuid, ActiveBooster>,
}

/// One mutex over all tables, so a commit is trivially atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    forced_conflicts: AtomicU32,
    unavailable: AtomicBool,
    commit_attempts: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` commits report `Conflict` without touching state.
    pub fn fail_next_commits(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// While set, every call fails with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn commit_attempts(&self) -> u64 {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Every stored transaction, oldest first.
    pub fn all_transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().transactions.clone()
    }

    pub fn all_balances(&self) -> Vec<AccountBalance> {
        self.state.lock().balances.values().cloned().collect()
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn read_balance(&self, user_id: Uuid) -> Result<Option<AccountBalance>, Error> {
        self.check_available()?;
        Ok(self.state.lock().balances.get(&user_id).cloned())
    }

    async fn commit(&self, batch: &LedgerBatch) -> Result<CommitOutcome, Error> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.take_forced_conflict() {
            return Ok(CommitOutcome::Conflict);
        }

        let mut state = self.state.lock();

        // Validate everything before the first mutation.
        for update in &batch.balances {
            let current = state.balances.get(&update.next.user_id).map(|b| b.version);
            if current != update.expected_version {
                return Ok(CommitOutcome::Conflict);
            }
            if !update.next.is_consistent() {
                return Err(Error::Internal(format!(
                    "balance row for {} violates ledger constraints",
                    update.next.user_id
                )));
            }
        }
        if let Some(att) = &batch.attendance {
            if state.attendance.contains_key(&(att.user_id, att.attendance_date)) {
                return Ok(CommitOutcome::Duplicate(DuplicateRecord::Attendance));
            }
        }
        if let Some(m) = &batch.mission {
            if state.missions.contains_key(&(m.user_id, m.mission_id.clone(), m.completed_on)) {
                return Ok(CommitOutcome::Duplicate(DuplicateRecord::Mission));
            }
        }
        if batch.transactions.iter().any(|t| t.amount <= 0) {
            return Err(Error::Internal("transaction amount must be positive".into()));
        }

        for update in &batch.balances {
            state.balances.insert(update.next.user_id, update.next.clone());
        }
        state.transactions.extend(batch.transactions.iter().cloned());
        if let Some(att) = &batch.attendance {
            state.attendance.insert((att.user_id, att.attendance_date), att.clone());
        }
        if let Some(m) = &batch.mission {
            state.missions.insert((m.user_id, m.mission_id.clone(), m.completed_on), m.clone());
        }
        if let Some(b) = &batch.booster {
            state.boosters.insert(b.user_id, b.clone());
        }

        Ok(CommitOutcome::Committed)
    }

    async fn query_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<Vec<TransactionRecord>, Error> {
        self.check_available()?;
        let state = self.state.lock();
        let mut matching: Vec<TransactionRecord> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn latest_attendance(
        &self,
        user_id: Uuid,
        on_or_before: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, Error> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state
            .attendance
            .range((user_id, NaiveDate::MIN)..=(user_id, on_or_before))
            .next_back()
            .map(|(_, rec)| rec.clone()))
    }

    async fn list_attendance(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        self.check_available()?;
        if from > to {
            return Ok(Vec::new());
        }
        let state = self.state.lock();
        Ok(state
            .attendance
            .range((user_id, from)..=(user_id, to))
            .map(|(_, rec)| rec.clone())
            .collect())
    }

    async fn find_mission_completion(
        &self,
        user_id: Uuid,
        mission_id: &str,
        day: NaiveDate,
    ) -> Result<Option<MissionCompletion>, Error> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state.missions.get(&(user_id, mission_id.to_string(), day)).cloned())
    }
}

#[async_trait]
impl RankingRepository for InMemoryStore {
    async fn top_balances(&self, limit: i64) -> Result<Vec<AccountBalance>, Error> {
        self.check_available()?;
        let mut all = self.all_balances();
        all.sort_by(|a, b| {
            b.current_points
                .cmp(&a.current_points)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        all.truncate(limit.max(0) as usize);
        Ok(all)
    }

    async fn earned_totals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(Uuid, i64)>, Error> {
        self.check_available()?;
        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        {
            let state = self.state.lock();
            for t in state.transactions.iter().filter(|t| {
                t.kind == TransactionKind::Earn && t.created_at >= from && t.created_at < to
            }) {
                *totals.entry(t.user_id).or_insert(0) += t.amount;
            }
        }
        let mut ranked: Vec<(Uuid, i64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    async fn count_balances_above(&self, points: i64) -> Result<i64, Error> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state.balances.values().filter(|b| b.current_points > points).count() as i64)
    }
}

#[async_trait]
impl BoosterRepository for InMemoryStore {
    async fn get_booster(&self, user_id: Uuid) -> Result<Option<ActiveBooster>, Error> {
        self.check_available()?;
        Ok(self.state.lock().boosters.get(&user_id).cloned())
    }

    async fn clear_booster(&self, user_id: Uuid, end_time: DateTime<Utc>) -> Result<(), Error> {
        self.check_available()?;
        let mut state = self.state.lock();
        if state.boosters.get(&user_id).is_some_and(|b| b.end_time == end_time) {
            state.boosters.remove(&user_id);
        }
        Ok(())
    }
}

/// Identity directory backed by a `DashMap`, keyed by user id.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    users: DashMap<Uuid, Identity>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active user and returns the generated id.
    pub fn add_user(&self, username: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.insert(user_id, username);
        user_id
    }

    pub fn insert(&self, user_id: Uuid, username: &str) {
        self.users.insert(
            user_id,
            Identity { user_id, username: username.to_string(), is_active: true },
        );
    }

    pub fn deactivate(&self, user_id: Uuid) {
        if let Some(mut identity) = self.users.get_mut(&user_id) {
            identity.is_active = false;
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn resolve_username(&self, username: &str) -> Result<Option<Uuid>, Error> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.username == username && entry.is_active)
            .map(|entry| entry.user_id))
    }

    async fn find_identity(&self, user_id: Uuid) -> Result<Option<Identity>, Error> {
        Ok(self.users.get(&user_id).map(|entry| entry.clone()))
    }
}
