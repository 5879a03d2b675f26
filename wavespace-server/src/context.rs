//! wavespace-server/src/context.rs
//!
//! Defines the main "global" context (ServerContext) for the points server.

use std::sync::Arc;
use tracing::info;

use wavespace_core::Error;
use wavespace_core::api::ApiState;
use wavespace_core::clock::{Clock, SystemClock};
use wavespace_core::config::LedgerConfig;
use wavespace_core::db::Database;
use wavespace_core::eventbus::EventBus;
use wavespace_core::repositories::{
    BoosterRepository, IdentityProvider, InMemoryIdentityProvider, InMemoryStore, LedgerRepository,
    PostgresBoosterRepository, PostgresIdentityProvider, PostgresLedgerRepository, RankingRepository,
};
use wavespace_core::services::{BoosterService, LedgerService, RankingService, RewardService, ShopService};

use crate::{Args, StoreKind};

/// The repositories one store backend provides.
struct Backend {
    ledger: Arc<dyn LedgerRepository>,
    ranking: Arc<dyn RankingRepository>,
    boosters: Arc<dyn BoosterRepository>,
    identity: Arc<dyn IdentityProvider>,
}

/// The global server context (a bag of references to the store, event bus and services).
pub struct ServerContext {
    pub db: Option<Database>,
    pub event_bus: EventBus,
    pub ledger: Arc<LedgerService>,
    pub rewards: Arc<RewardService>,
    pub boosters: Arc<BoosterService>,
    pub shop: Arc<ShopService>,
    pub rankings: Arc<RankingService>,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        let config = args.ledger_config();
        config.validate()?;

        let (db, backend) = match args.store {
            StoreKind::Postgres => {
                info!("Using Postgres DB URL: {}", redact(&args.database_url));
                let db = Database::with_options(
                    &args.database_url,
                    args.db_max_connections,
                    config.store_timeout,
                )
                .await?;
                db.migrate().await?;
                let ledger = Arc::new(PostgresLedgerRepository::new(db.pool().clone()));
                let backend = Backend {
                    ledger: ledger.clone(),
                    ranking: ledger,
                    boosters: Arc::new(PostgresBoosterRepository::new(db.pool().clone())),
                    identity: Arc::new(PostgresIdentityProvider::new(db.pool().clone())),
                };
                (Some(db), backend)
            }
            StoreKind::Memory => {
                info!("Using the in-memory store; nothing will survive a restart.");
                let store = Arc::new(InMemoryStore::new());
                let backend = Backend {
                    ledger: store.clone(),
                    ranking: store.clone(),
                    boosters: store,
                    identity: Arc::new(InMemoryIdentityProvider::new()),
                };
                (None, backend)
            }
        };

        let event_bus = EventBus::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(LedgerService::new(
            backend.ledger,
            backend.boosters,
            backend.identity,
            event_bus.clone(),
            clock,
            config,
        ));
        let rewards = Arc::new(RewardService::new(ledger.clone()));
        let boosters = Arc::new(BoosterService::new(ledger.clone()));
        let shop = Arc::new(ShopService::new(ledger.clone(), boosters.clone()));
        let rankings = Arc::new(RankingService::new(ledger.clone(), backend.ranking));

        Ok(Self { db, event_bus, ledger, rewards, boosters, shop, rankings })
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

impl Args {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            cache_enabled: !self.no_cache,
            cache_ttl: std::time::Duration::from_secs(self.cache_ttl_secs),
            max_commit_attempts: self.max_commit_attempts,
            store_timeout: std::time::Duration::from_millis(self.store_timeout_ms),
            day_offset_minutes: self.day_offset_minutes,
            default_booster_seconds: self.default_booster_secs,
            ..LedgerConfig::default()
        }
    }
}

/// Hides the password part of a connection URL.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let creds = &url[scheme_end + 3..at];
            match creds.find(':') {
                Some(colon) => format!("{}{}:***{}", &url[..scheme_end + 3], &creds[..colon], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
