// tests/postgres_repository_tests.rs
//
// Needs a reachable Postgres (see `TEST_DATABASE_URL` / `DATABASE_ADMIN_URL`).
// Run with `cargo test -- --ignored`.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use wavespace_core::{
    Error,
    clock::SystemClock,
    config::LedgerConfig,
    eventbus::EventBus,
    models::{AccountBalance, BalanceUpdate, CommitOutcome, LedgerBatch, TransactionKind, TransactionRecord},
    repositories::{LedgerRepository, PostgresBoosterRepository, PostgresIdentityProvider, PostgresLedgerRepository},
    services::{BoosterService, LedgerService, RewardService},
    test_utils::helpers::setup_test_database,
};
use wavespace_core::models::BoosterType;

async fn services() -> Result<(Arc<PostgresLedgerRepository>, PostgresIdentityProvider, Arc<LedgerService>), Error> {
    let db = setup_test_database().await?;
    let ledger_repo = Arc::new(PostgresLedgerRepository::new(db.pool().clone()));
    let booster_repo = Arc::new(PostgresBoosterRepository::new(db.pool().clone()));
    let identities = PostgresIdentityProvider::new(db.pool().clone());
    let ledger = Arc::new(LedgerService::new(
        ledger_repo.clone(),
        booster_repo,
        Arc::new(PostgresIdentityProvider::new(db.pool().clone())),
        EventBus::new(),
        Arc::new(SystemClock),
        LedgerConfig { cache_enabled: false, ..LedgerConfig::default() },
    ));
    Ok((ledger_repo, identities, ledger))
}

#[tokio::test]
#[ignore]
async fn stale_version_is_reported_as_conflict() -> Result<(), Error> {
    let (repo, _identities, ledger) = services().await?;
    let user = Uuid::new_v4();
    ledger.earn(user, 100, "event", "Event participation", None).await?;

    let now = Utc::now();
    let stale = AccountBalance::empty(user).credited(5, now).expect("small credit");
    let batch = LedgerBatch {
        balances: vec![BalanceUpdate { expected_version: None, next: stale }],
        transactions: vec![TransactionRecord {
            id: Uuid::new_v4(),
            user_id: user,
            amount: 5,
            kind: TransactionKind::Earn,
            category: "event".into(),
            description: "stale write".into(),
            related_id: None,
            created_at: now,
        }],
        ..Default::default()
    };

    assert_eq!(repo.commit(&batch).await?, CommitOutcome::Conflict);
    assert_eq!(ledger.get_balance(user).await?.current_points, 100);
    assert_eq!(ledger.get_history(user, 1, 10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn transfer_check_in_and_booster_round_trip_through_postgres() -> Result<(), Error> {
    let (_repo, identities, ledger) = services().await?;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    identities.create_user(alice, "alice").await?;
    identities.create_user(bob, "bob").await?;

    ledger.earn(alice, 1_000, "event", "Event participation", None).await?;
    ledger.transfer(alice, bob, 250, "thanks").await?;
    assert_eq!(ledger.get_balance(alice).await?.current_points, 750);
    assert_eq!(ledger.get_balance(bob).await?.current_points, 250);

    let rewards = RewardService::new(ledger.clone());
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).expect("valid date");
    rewards.check_in(bob, today).await?;
    assert!(matches!(rewards.check_in(bob, today).await, Err(Error::AlreadyCheckedIn { .. })));

    let boosters = BoosterService::new(ledger.clone());
    boosters.purchase(alice, BoosterType::Double, 600).await?;
    assert!(boosters.active_booster(alice).await?.is_some());
    ledger.earn(alice, 10, "comment", "Comment written", None).await?;
    assert_eq!(ledger.get_balance(alice).await?.current_points, 750 - 500 + 20);
    Ok(())
}
