// src/services/ledger_service.rs

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Error;
use crate::cache::{CacheKey, CachedValue, LedgerCache};
use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::eventbus::EventBus;
use crate::models::{
    AccountBalance, ActiveBooster, AttendanceRecord, BalanceUpdate, CommitOutcome,
    DuplicateRecord, LedgerBatch, LedgerEvent, MissionCompletion, PageRequest, Standing,
    TransactionFilter, TransactionKind, TransactionRecord,
};
use crate::models::booster::scale_amount;
use crate::repositories::{BoosterRepository, IdentityProvider, LedgerRepository};
use crate::services::account_locks::AccountLocks;
use crate::services::booster_service::resolve_multiplier;
use crate::services::tier::{level_for, TierTable};

pub const CATEGORY_ADMIN: &str = "admin";
pub const CATEGORY_TRANSFER: &str = "transfer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Credit,
    Debit,
}

/// A record that has to land in the same commit as the ledger entry.
#[derive(Debug, Clone)]
pub(crate) enum Attachment {
    Attendance { date: NaiveDate, consecutive_days: i32, bonus_points: i64 },
    Mission { mission_id: String, day: NaiveDate },
    Booster(ActiveBooster),
}

/// One single-account ledger movement, as the reward, booster and shop services
/// hand it to [`LedgerService::post_entry`].
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub user_id: Uuid,
    pub amount: i64,
    pub direction: Direction,
    pub category: String,
    pub description: String,
    pub related_id: Option<String>,
    /// Scale a credit by the user's active booster.
    pub apply_booster: bool,
    pub attachment: Option<Attachment>,
}

impl Entry {
    pub fn credit(user_id: Uuid, amount: i64, category: &str, description: &str) -> Self {
        Self {
            user_id,
            amount,
            direction: Direction::Credit,
            category: category.to_string(),
            description: description.to_string(),
            related_id: None,
            apply_booster: true,
            attachment: None,
        }
    }

    pub fn debit(user_id: Uuid, amount: i64, category: &str, description: &str) -> Self {
        Self {
            direction: Direction::Debit,
            apply_booster: false,
            ..Self::credit(user_id, amount, category, description)
        }
    }

    pub fn related(mut self, related_id: Option<String>) -> Self {
        self.related_id = related_id;
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn without_booster(mut self) -> Self {
        self.apply_booster = false;
        self
    }
}

/// Result of a committed entry.
#[derive(Debug, Clone)]
pub(crate) struct Posted {
    pub transaction: TransactionRecord,
    pub balance: AccountBalance,
}

/// The Ledger Core. All balance mutations in the system go through here.
pub struct LedgerService {
    ledger_repo: Arc<dyn LedgerRepository>,
    booster_repo: Arc<dyn BoosterRepository>,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<LedgerCache>,
    locks: AccountLocks,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    tiers: TierTable,
    config: LedgerConfig,
}

fn require_positive(amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::Validation(format!("amount must be a positive integer, got {amount}")));
    }
    Ok(())
}

fn overflow(user_id: Uuid, amount: i64) -> Error {
    Error::Validation(format!("crediting {amount} points would overflow the balance of {user_id}"))
}

fn require_text(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl LedgerService {
    pub fn new(
        ledger_repo: Arc<dyn LedgerRepository>,
        booster_repo: Arc<dyn BoosterRepository>,
        identity: Arc<dyn IdentityProvider>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        debug!("Initializing LedgerService (cache_enabled={}, ttl={:?})", config.cache_enabled, config.cache_ttl);
        let cache = Arc::new(LedgerCache::new(config.cache_ttl, clock.clone(), config.cache_enabled));
        Self {
            ledger_repo,
            booster_repo,
            identity,
            cache,
            locks: AccountLocks::new(),
            event_bus,
            clock,
            tiers: TierTable::standard(),
            config,
        }
    }

    pub fn with_tier_table(mut self, tiers: TierTable) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn cache(&self) -> Arc<LedgerCache> {
        self.cache.clone()
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub(crate) fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub(crate) fn ledger_repo(&self) -> &Arc<dyn LedgerRepository> {
        &self.ledger_repo
    }

    pub(crate) fn booster_repo(&self) -> &Arc<dyn BoosterRepository> {
        &self.booster_repo
    }

    pub(crate) fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Runs a store call under the configured timeout.
    pub(crate) async fn store_call<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::time::timeout(self.config.store_timeout, fut).await?
    }

    /// Drops expired cache entries and idle account locks.
    pub fn run_maintenance(&self) -> usize {
        self.locks.prune();
        self.cache.purge_expired()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Credits `amount`, scaled by the user's active booster. Returns the transaction id.
    pub async fn earn(
        &self,
        user_id: Uuid,
        amount: i64,
        category: &str,
        description: &str,
        related_id: Option<String>,
    ) -> Result<Uuid, Error> {
        let entry = Entry::credit(user_id, amount, category, description).related(related_id);
        Ok(self.post_entry(entry).await?.transaction.id)
    }

    pub async fn spend(
        &self,
        user_id: Uuid,
        amount: i64,
        category: &str,
        description: &str,
        related_id: Option<String>,
    ) -> Result<Uuid, Error> {
        let entry = Entry::debit(user_id, amount, category, description).related(related_id);
        Ok(self.post_entry(entry).await?.transaction.id)
    }

    /// Signed manual correction. Credits skip booster scaling.
    pub async fn admin_adjust(
        &self,
        user_id: Uuid,
        signed_amount: i64,
        reason: &str,
        admin_id: Uuid,
    ) -> Result<Uuid, Error> {
        if signed_amount == 0 {
            return Err(Error::Validation("adjustment must not be zero".into()));
        }
        let entry = if signed_amount > 0 {
            Entry::credit(user_id, signed_amount, CATEGORY_ADMIN, reason).without_booster()
        } else {
            Entry::debit(user_id, signed_amount.saturating_neg(), CATEGORY_ADMIN, reason)
        };
        let posted = self.post_entry(entry.related(Some(admin_id.to_string()))).await?;
        info!(%user_id, %admin_id, signed_amount, "admin adjustment applied");
        Ok(posted.transaction.id)
    }

    /// Moves points between two accounts. Returns the sender-side transaction id.
    pub async fn transfer(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        amount: i64,
        description: &str,
    ) -> Result<Uuid, Error> {
        self.transfer_with_category(from_user_id, to_user_id, amount, CATEGORY_TRANSFER, description)
            .await
    }

    pub async fn transfer_with_category(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
        amount: i64,
        category: &str,
        description: &str,
    ) -> Result<Uuid, Error> {
        require_positive(amount)?;
        require_text("category", category)?;
        require_text("description", description)?;
        if from_user_id == to_user_id {
            return Err(Error::InvalidRecipient("cannot transfer points to yourself".into()));
        }
        match self.store_call(self.identity.find_identity(to_user_id)).await? {
            Some(identity) if identity.is_active => {}
            _ => {
                return Err(Error::InvalidRecipient(format!("recipient {to_user_id} does not exist")));
            }
        }

        let _guard = self.locks.lock_many(&[from_user_id, to_user_id]).await;

        for attempt in 1..=self.config.max_commit_attempts {
            let now = self.clock.now();
            let sender = self.store_call(self.ledger_repo.read_balance(from_user_id)).await?;
            let recipient = self.store_call(self.ledger_repo.read_balance(to_user_id)).await?;

            let sender_base = sender.clone().unwrap_or_else(|| AccountBalance::empty(from_user_id));
            let recipient_base = recipient.clone().unwrap_or_else(|| AccountBalance::empty(to_user_id));

            let sender_next = sender_base.debited(amount, now).ok_or_else(|| Error::InsufficientBalance {
                user_id: from_user_id,
                required: amount,
                available: sender_base.current_points,
            })?;
            let recipient_next = recipient_base
                .credited(amount, now)
                .ok_or_else(|| overflow(to_user_id, amount))?;

            let out_id = Uuid::new_v4();
            let in_id = Uuid::new_v4();
            let batch = LedgerBatch {
                balances: vec![
                    BalanceUpdate { expected_version: sender.map(|b| b.version), next: sender_next },
                    BalanceUpdate { expected_version: recipient.map(|b| b.version), next: recipient_next },
                ],
                transactions: vec![
                    TransactionRecord {
                        id: out_id,
                        user_id: from_user_id,
                        amount,
                        kind: TransactionKind::TransferOut,
                        category: category.to_string(),
                        description: description.to_string(),
                        related_id: Some(in_id.to_string()),
                        created_at: now,
                    },
                    TransactionRecord {
                        id: in_id,
                        user_id: to_user_id,
                        amount,
                        kind: TransactionKind::TransferIn,
                        category: category.to_string(),
                        description: description.to_string(),
                        related_id: Some(out_id.to_string()),
                        created_at: now,
                    },
                ],
                ..Default::default()
            };

            match self.commit(&batch).await? {
                CommitOutcome::Committed => {
                    debug!(%from_user_id, %to_user_id, amount, "transfer committed");
                    self.event_bus.publish(LedgerEvent::PointsTransferred {
                        from_user_id,
                        to_user_id,
                        transaction_id: out_id,
                        amount,
                    });
                    return Ok(out_id);
                }
                CommitOutcome::Conflict => {
                    debug!(%from_user_id, %to_user_id, attempt, "transfer conflicted; retrying");
                }
                CommitOutcome::Duplicate(_) => {
                    return Err(Error::Internal("unexpected duplicate on transfer".into()));
                }
            }
        }

        warn!(%from_user_id, %to_user_id, "transfer gave up after {} attempts", self.config.max_commit_attempts);
        Err(Error::Contention { attempts: self.config.max_commit_attempts })
    }

    /// Commits one single-account entry with the read-check-write loop.
    pub(crate) async fn post_entry(&self, entry: Entry) -> Result<Posted, Error> {
        require_positive(entry.amount)?;
        require_text("category", &entry.category)?;
        require_text("description", &entry.description)?;

        let user_id = entry.user_id;
        let _guard = self.locks.lock(user_id).await;

        for attempt in 1..=self.config.max_commit_attempts {
            let now = self.clock.now();
            let current = self.store_call(self.ledger_repo.read_balance(user_id)).await?;
            let base = current.clone().unwrap_or_else(|| AccountBalance::empty(user_id));

            let (kind, amount, next) = match entry.direction {
                Direction::Credit => {
                    let amount = if entry.apply_booster {
                        let multiplier = self
                            .store_call(resolve_multiplier(self.booster_repo.as_ref(), user_id, now))
                            .await?;
                        scale_amount(entry.amount, multiplier)
                            .ok_or_else(|| overflow(user_id, entry.amount))?
                    } else {
                        entry.amount
                    };
                    let next = base.credited(amount, now).ok_or_else(|| overflow(user_id, amount))?;
                    (TransactionKind::Earn, amount, next)
                }
                Direction::Debit => {
                    let next = base.debited(entry.amount, now).ok_or_else(|| Error::InsufficientBalance {
                        user_id,
                        required: entry.amount,
                        available: base.current_points,
                    })?;
                    (TransactionKind::Spend, entry.amount, next)
                }
            };

            let record = TransactionRecord {
                id: Uuid::new_v4(),
                user_id,
                amount,
                kind,
                category: entry.category.clone(),
                description: entry.description.clone(),
                related_id: entry.related_id.clone(),
                created_at: now,
            };

            let mut batch = LedgerBatch {
                balances: vec![BalanceUpdate {
                    expected_version: current.map(|b| b.version),
                    next: next.clone(),
                }],
                transactions: vec![record.clone()],
                ..Default::default()
            };
            match &entry.attachment {
                Some(Attachment::Attendance { date, consecutive_days, bonus_points }) => {
                    batch.attendance = Some(AttendanceRecord {
                        user_id,
                        attendance_date: *date,
                        consecutive_days: *consecutive_days,
                        points_earned: amount,
                        bonus_points: *bonus_points,
                        created_at: now,
                    });
                }
                Some(Attachment::Mission { mission_id, day }) => {
                    batch.mission = Some(MissionCompletion {
                        user_id,
                        mission_id: mission_id.clone(),
                        completed_on: *day,
                        reward: amount,
                        transaction_id: record.id,
                        created_at: now,
                    });
                }
                Some(Attachment::Booster(booster)) => {
                    batch.booster = Some(booster.clone());
                }
                None => {}
            }

            match self.commit(&batch).await? {
                CommitOutcome::Committed => {
                    debug!(%user_id, amount, kind = %kind, category = %record.category, "ledger entry committed");
                    let balance = next.current_points;
                    self.event_bus.publish(match kind {
                        TransactionKind::Earn => LedgerEvent::PointsEarned {
                            user_id,
                            transaction_id: record.id,
                            amount,
                            category: record.category.clone(),
                            balance,
                        },
                        _ => LedgerEvent::PointsSpent {
                            user_id,
                            transaction_id: record.id,
                            amount,
                            category: record.category.clone(),
                            balance,
                        },
                    });
                    return Ok(Posted { transaction: record, balance: next });
                }
                CommitOutcome::Conflict => {
                    debug!(%user_id, attempt, "balance version moved; retrying");
                }
                CommitOutcome::Duplicate(DuplicateRecord::Attendance) => {
                    let date = match &entry.attachment {
                        Some(Attachment::Attendance { date, .. }) => *date,
                        _ => now.date_naive(),
                    };
                    return Err(Error::AlreadyCheckedIn { user_id, date });
                }
                CommitOutcome::Duplicate(DuplicateRecord::Mission) => {
                    let (mission_id, date) = match &entry.attachment {
                        Some(Attachment::Mission { mission_id, day }) => (mission_id.clone(), *day),
                        _ => (String::new(), now.date_naive()),
                    };
                    return Err(Error::AlreadyCompleted { user_id, mission_id, date });
                }
            }
        }

        warn!(%user_id, "ledger entry gave up after {} attempts", self.config.max_commit_attempts);
        Err(Error::Contention { attempts: self.config.max_commit_attempts })
    }

    /// Sends a batch to the store, then invalidates every touched account.
    /// Invalidation also runs when the outcome is unknown (error or timeout).
    async fn commit(&self, batch: &LedgerBatch) -> Result<CommitOutcome, Error> {
        let result = self.store_call(self.ledger_repo.commit(batch)).await;
        match &result {
            Ok(CommitOutcome::Committed) | Err(_) => {
                self.cache.invalidate_users(&batch.affected_users());
            }
            Ok(_) => {}
        }
        if let Err(e) = &result {
            warn!("ledger commit failed: {}", e);
        }
        result
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current balance. Accounts with no activity read as an all-zero balance.
    pub async fn get_balance(&self, user_id: Uuid) -> Result<AccountBalance, Error> {
        if let Some(CachedValue::Balance(balance)) = self.cache.get(user_id, &CacheKey::Balance) {
            return Ok(balance);
        }
        let generation = self.cache.generation(user_id);
        let balance = self
            .store_call(self.ledger_repo.read_balance(user_id))
            .await?
            .unwrap_or_else(|| AccountBalance::empty(user_id));
        self.cache.insert(user_id, CacheKey::Balance, CachedValue::Balance(balance.clone()), generation);
        Ok(balance)
    }

    pub async fn get_history(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionRecord>, Error> {
        self.get_history_filtered(user_id, TransactionFilter::default(), page, page_size).await
    }

    /// Newest first, ordered on `(created_at, id)`.
    pub async fn get_history_filtered(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<TransactionRecord>, Error> {
        if page_size == 0 || page_size > self.config.history_max_page_size {
            return Err(Error::Validation(format!(
                "page_size must be between 1 and {}",
                self.config.history_max_page_size
            )));
        }
        if let (Some(since), Some(until)) = (filter.since, filter.until) {
            if since > until {
                return Err(Error::Validation("since must not be after until".into()));
            }
        }
        let page = PageRequest::new(page, page_size);
        let key = CacheKey::History { filter: filter.clone(), page };

        if let Some(CachedValue::History(records)) = self.cache.get(user_id, &key) {
            return Ok(records);
        }
        let generation = self.cache.generation(user_id);
        let records = self
            .store_call(self.ledger_repo.query_transactions(user_id, &filter, &page))
            .await?;
        self.cache.insert(user_id, key, CachedValue::History(records.clone()), generation);
        Ok(records)
    }

    /// Balance with derived tier, progress and level.
    pub async fn get_standing(&self, user_id: Uuid) -> Result<Standing, Error> {
        if let Some(CachedValue::Standing(standing)) = self.cache.get(user_id, &CacheKey::Standing) {
            return Ok(standing);
        }
        let generation = self.cache.generation(user_id);
        let balance = self.get_balance(user_id).await?;
        let points = balance.current_points;
        let tier = self.tiers.tier_for(points).clone();
        let next_tier = self.tiers.next_tier(&tier).cloned();
        let progress = TierTable::progress_toward(points, &tier, next_tier.as_ref());
        let standing = Standing {
            level: level_for(points),
            balance,
            tier,
            next_tier,
            progress,
        };
        self.cache.insert(user_id, CacheKey::Standing, CachedValue::Standing(standing.clone()), generation);
        Ok(standing)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
