// src/services/booster_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::Error;
use crate::models::{ActiveBooster, BoosterType, LedgerEvent, ShopItem};
use crate::repositories::BoosterRepository;
use crate::services::ledger_service::{Attachment, Entry, LedgerService};

pub const CATEGORY_BOOSTER: &str = "booster";

/// Longest booster that can be bought in one purchase.
const MAX_BOOSTER_SECONDS: i64 = 30 * 24 * 3600;

/// Multiplier in force for `user_id` at `now`. An expired booster counts as absent
/// and is cleared on the way.
pub(crate) async fn resolve_multiplier(
    repo: &dyn BoosterRepository,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<f64, Error> {
    match repo.get_booster(user_id).await? {
        Some(booster) if booster.is_active_at(now) => Ok(booster.multiplier),
        Some(expired) => {
            if let Err(e) = repo.clear_booster(user_id, expired.end_time).await {
                warn!(%user_id, "failed to clear expired booster: {}", e);
            }
            Ok(1.0)
        }
        None => Ok(1.0),
    }
}

pub struct BoosterService {
    ledger: Arc<LedgerService>,
}

impl BoosterService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        Self { ledger }
    }

    /// Charges the booster's cost and activates it in the same commit. Any booster the
    /// user already has is replaced, not extended.
    pub async fn purchase(
        &self,
        user_id: Uuid,
        booster_type: BoosterType,
        duration_seconds: i64,
    ) -> Result<ActiveBooster, Error> {
        if duration_seconds <= 0 || duration_seconds > MAX_BOOSTER_SECONDS {
            return Err(Error::Validation(format!(
                "booster duration must be between 1 and {MAX_BOOSTER_SECONDS} seconds"
            )));
        }

        let booster = ActiveBooster::new(user_id, booster_type, self.ledger.now(), duration_seconds);
        let item = ShopItem::Booster(booster_type);
        let entry = Entry::debit(user_id, booster_type.cost(), CATEGORY_BOOSTER, item.name())
            .related(Some(item.id().to_string()))
            .attach(Attachment::Booster(booster.clone()));

        self.ledger.post_entry(entry).await?;
        info!(%user_id, booster = %booster_type, until = %booster.end_time, "booster activated");
        self.ledger.event_bus().publish(LedgerEvent::BoosterActivated(booster.clone()));
        Ok(booster)
    }

    /// Uses the configured default duration.
    pub async fn purchase_default(&self, user_id: Uuid, booster_type: BoosterType) -> Result<ActiveBooster, Error> {
        let seconds = self.ledger.config().default_booster_seconds;
        self.purchase(user_id, booster_type, seconds).await
    }

    pub async fn active_multiplier(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<f64, Error> {
        self.ledger
            .store_call(resolve_multiplier(self.ledger.booster_repo().as_ref(), user_id, now))
            .await
    }

    /// The booster in force right now, if any.
    pub async fn active_booster(&self, user_id: Uuid) -> Result<Option<ActiveBooster>, Error> {
        let now = self.ledger.now();
        let stored = self
            .ledger
            .store_call(self.ledger.booster_repo().get_booster(user_id))
            .await?;
        Ok(stored.filter(|b| b.is_active_at(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::LedgerConfig;
    use crate::eventbus::EventBus;
    use crate::repositories::{InMemoryIdentityProvider, InMemoryStore, LedgerRepository};

    fn setup() -> (Arc<ManualClock>, Arc<InMemoryStore>, Arc<LedgerService>, BoosterService) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(LedgerService::new(
            store.clone(),
            store.clone(),
            Arc::new(InMemoryIdentityProvider::new()),
            EventBus::new(),
            clock.clone(),
            LedgerConfig::default(),
        ));
        let boosters = BoosterService::new(ledger.clone());
        (clock, store, ledger, boosters)
    }

    #[tokio::test]
    async fn expired_booster_is_cleared_lazily() {
        let (clock, store, ledger, boosters) = setup();
        let user = Uuid::new_v4();
        ledger.earn(user, 500, "attendance", "seed", None).await.unwrap();
        boosters.purchase(user, BoosterType::Double, 60).await.unwrap();

        assert_eq!(boosters.active_multiplier(user, clock.now()).await.unwrap(), 2.0);

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(boosters.active_multiplier(user, clock.now()).await.unwrap(), 1.0);
        assert!(store.get_booster(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_purchase_leaves_no_booster() {
        let (_clock, store, _ledger, boosters) = setup();
        let user = Uuid::new_v4();

        let err = boosters.purchase(user, BoosterType::Mega, 3600).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { required: 2000, .. }));
        assert!(store.get_booster(user).await.unwrap().is_none());
        assert!(store.read_balance(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_non_positive_duration() {
        let (_clock, _store, _ledger, boosters) = setup();
        let err = boosters.purchase(Uuid::new_v4(), BoosterType::Double, 0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
