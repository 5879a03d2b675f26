// File: wavespace-core/src/test_utils/harness.rs

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::api::ApiState;
use crate::clock::ManualClock;
use crate::config::LedgerConfig;
use crate::eventbus::EventBus;
use crate::repositories::{InMemoryIdentityProvider, InMemoryStore};
use crate::services::{BoosterService, LedgerService, RankingService, RewardService, ShopService};

/// Every service wired to the in-memory store and a manual clock.
pub struct TestLedger {
    pub store: Arc<InMemoryStore>,
    pub identities: Arc<InMemoryIdentityProvider>,
    pub clock: Arc<ManualClock>,
    pub event_bus: EventBus,
    pub ledger: Arc<LedgerService>,
    pub rewards: Arc<RewardService>,
    pub boosters: Arc<BoosterService>,
    pub shop: Arc<ShopService>,
    pub rankings: Arc<RankingService>,
}

/// Noon UTC on 2024-05-15, far from any day boundary.
pub fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let identities = Arc::new(InMemoryIdentityProvider::new());
        let clock = Arc::new(ManualClock::new(default_start()));
        let event_bus = EventBus::new();

        let ledger = Arc::new(LedgerService::new(
            store.clone(),
            store.clone(),
            identities.clone(),
            event_bus.clone(),
            clock.clone(),
            config,
        ));
        let rewards = Arc::new(RewardService::new(ledger.clone()));
        let boosters = Arc::new(BoosterService::new(ledger.clone()));
        let shop = Arc::new(ShopService::new(ledger.clone(), boosters.clone()));
        let rankings = Arc::new(RankingService::new(ledger.clone(), store.clone()));

        Self { store, identities, clock, event_bus, ledger, rewards, boosters, shop, rankings }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            ledger: self.ledger.clone(),
            rewards: self.rewards.clone(),
            boosters: self.boosters.clone(),
            shop: self.shop.clone(),
            rankings: self.rankings.clone(),
        }
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}
