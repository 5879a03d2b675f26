// tests/ledger_tests.rs

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use wavespace_core::{
    Error,
    config::LedgerConfig,
    eventbus::EventBus,
    models::{BoosterType, LedgerEvent, TransactionFilter, TransactionKind},
    services::LedgerService,
    test_utils::TestLedger,
};

#[tokio::test]
async fn earn_spend_and_transfer_walkthrough() -> Result<(), Error> {
    let t = TestLedger::new();
    let alice = t.identities.add_user("alice");
    let bob = t.identities.add_user("bob");

    t.ledger.earn(alice, 50, "attendance", "Daily check-in", None).await?;
    t.ledger.spend(alice, 30, "shop", "Ad skip", None).await?;

    let balance = t.ledger.get_balance(alice).await?;
    assert_eq!(balance.current_points, 20);
    assert_eq!(balance.total_earned, 50);
    assert_eq!(balance.total_spent, 30);

    let err = t.ledger.spend(alice, 30, "shop", "Ad skip", None).await.unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { required: 30, available: 20, .. }));

    t.ledger.transfer(alice, bob, 20, "thanks").await?;
    assert_eq!(t.ledger.get_balance(alice).await?.current_points, 0);
    assert_eq!(t.ledger.get_balance(bob).await?.current_points, 20);

    // The failed spend left nothing behind.
    assert_eq!(t.store.all_transactions().len(), 4);
    Ok(())
}

#[tokio::test]
async fn unknown_user_reads_as_empty_balance() -> Result<(), Error> {
    let t = TestLedger::new();
    let balance = t.ledger.get_balance(Uuid::new_v4()).await?;
    assert_eq!(balance.current_points, 0);
    assert_eq!(balance.total_earned, 0);
    assert_eq!(balance.last_transaction_at, None);
    Ok(())
}

#[tokio::test]
async fn balances_match_the_transaction_log() -> Result<(), Error> {
    let t = TestLedger::new();
    let users: Vec<Uuid> = ["a", "b", "c"].iter().map(|n| t.identities.add_user(n)).collect();

    for (i, user) in users.iter().enumerate() {
        t.ledger.earn(*user, 100 * (i as i64 + 1), "event", "Event participation", None).await?;
    }
    t.ledger.spend(users[1], 50, "shop", "Ad skip", None).await?;
    t.ledger.transfer(users[2], users[0], 120, "gift").await?;
    t.ledger.admin_adjust(users[0], -20, "correction", Uuid::new_v4()).await?;
    let _ = t.ledger.transfer(users[1], users[2], 10_000, "too much").await;

    let mut from_log: HashMap<Uuid, i64> = HashMap::new();
    for tx in t.store.all_transactions() {
        *from_log.entry(tx.user_id).or_default() += tx.signed_amount();
    }
    for balance in t.store.all_balances() {
        assert!(balance.current_points >= 0);
        assert_eq!(balance.current_points, balance.total_earned - balance.total_spent);
        assert_eq!(from_log.get(&balance.user_id).copied().unwrap_or(0), balance.current_points);
    }

    let total: i64 = t.store.all_balances().iter().map(|b| b.current_points).sum();
    assert_eq!(total, 100 + 200 + 300 - 50 - 20);
    Ok(())
}

#[tokio::test]
async fn failed_transfer_changes_neither_side() -> Result<(), Error> {
    let t = TestLedger::new();
    let alice = t.identities.add_user("alice");
    let bob = t.identities.add_user("bob");
    t.ledger.earn(alice, 30, "post", "Post created", None).await?;

    let err = t.ledger.transfer(alice, bob, 31, "too much").await.unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
    assert_eq!(t.ledger.get_balance(alice).await?.current_points, 30);
    assert_eq!(t.ledger.get_balance(bob).await?.current_points, 0);

    let err = t.ledger.transfer(alice, alice, 10, "self").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRecipient(_)));

    let err = t.ledger.transfer(alice, Uuid::new_v4(), 10, "nobody").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRecipient(_)));

    t.identities.deactivate(bob);
    let err = t.ledger.transfer(alice, bob, 10, "inactive").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRecipient(_)));

    assert_eq!(t.store.all_transactions().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_earns_are_all_counted() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("busy");

    let mut handles = Vec::new();
    for i in 0..50 {
        let ledger = Arc::clone(&t.ledger);
        handles.push(tokio::spawn(async move {
            ledger.earn(user, 10, "comment", &format!("comment #{i}"), None).await
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked")?;
    }

    let balance = t.ledger.get_balance(user).await?;
    assert_eq!(balance.current_points, 500);
    assert_eq!(balance.version, 50);
    assert_eq!(t.store.all_transactions().len(), 50);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spends_never_overdraw() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("spender");
    t.ledger.earn(user, 100, "event", "Event participation", None).await?;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let ledger = Arc::clone(&t.ledger);
        handles.push(tokio::spawn(async move {
            ledger.spend(user, 10, "shop", "Ad skip", None).await
        }));
    }

    let mut succeeded = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(Error::InsufficientBalance { .. }) => refused += 1,
            Err(e) => return Err(e),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(refused, 10);
    assert_eq!(t.ledger.get_balance(user).await?.current_points, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_do_not_deadlock() -> Result<(), Error> {
    let t = TestLedger::new();
    let a = t.identities.add_user("a");
    let b = t.identities.add_user("b");
    t.ledger.earn(a, 1_000, "event", "seed", None).await?;
    t.ledger.earn(b, 1_000, "event", "seed", None).await?;

    let mut handles = Vec::new();
    for i in 0..40 {
        let ledger = Arc::clone(&t.ledger);
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move { ledger.transfer(from, to, 5, "ping").await }));
    }
    for handle in handles {
        handle.await.expect("task panicked")?;
    }

    let total = t.ledger.get_balance(a).await?.current_points + t.ledger.get_balance(b).await?.current_points;
    assert_eq!(total, 2_000);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_ledger_instances_sharing_a_store_never_overdraw() -> Result<(), Error> {
    // Each instance only serialises its own callers; the store's version guard
    // has to settle races between them.
    let config = LedgerConfig { cache_enabled: false, max_commit_attempts: 50, ..LedgerConfig::default() };
    let t = TestLedger::with_config(config.clone());
    let other = Arc::new(LedgerService::new(
        t.store.clone(),
        t.store.clone(),
        t.identities.clone(),
        EventBus::new(),
        t.clock.clone(),
        config,
    ));
    let user = t.identities.add_user("shared");
    t.ledger.earn(user, 100, "event", "Event participation", None).await?;

    let mut handles = Vec::new();
    for i in 0..20 {
        let ledger = if i % 2 == 0 { Arc::clone(&t.ledger) } else { Arc::clone(&other) };
        handles.push(tokio::spawn(async move {
            ledger.spend(user, 10, "shop", "Ad skip", None).await
        }));
    }

    let mut succeeded = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(Error::InsufficientBalance { .. }) => refused += 1,
            Err(e) => return Err(e),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(refused, 10);
    let balance = other.get_balance(user).await?;
    assert_eq!((balance.current_points, balance.total_spent), (0, 100));
    assert_eq!(t.store.all_transactions().len(), 11);
    Ok(())
}

#[tokio::test]
async fn credits_that_would_overflow_are_rejected() -> Result<(), Error> {
    let t = TestLedger::new();
    let whale = t.identities.add_user("whale");
    let friend = t.identities.add_user("friend");

    t.ledger.earn(whale, i64::MAX, "event", "Jackpot", None).await?;
    let err = t.ledger.earn(whale, 1, "comment", "Comment written", None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    t.ledger.earn(friend, 1, "comment", "Comment written", None).await?;
    let err = t.ledger.transfer(friend, whale, 1, "one more").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(t.ledger.get_balance(whale).await?.current_points, i64::MAX);
    assert_eq!(t.ledger.get_balance(friend).await?.current_points, 1);
    assert_eq!(t.store.all_transactions().len(), 2);
    Ok(())
}

#[tokio::test]
async fn boosted_credit_that_would_overflow_is_rejected() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("boosted-whale");
    t.ledger.admin_adjust(user, 500, "seed", Uuid::new_v4()).await?;
    t.boosters.purchase_default(user, BoosterType::Double).await?;

    let err = t.ledger.earn(user, i64::MAX / 2 + 10, "event", "Jackpot", None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!err.is_retryable());

    let balance = t.ledger.get_balance(user).await?;
    assert_eq!(balance.current_points, 0);
    assert_eq!(balance.total_earned - balance.total_spent, 0);
    Ok(())
}

#[tokio::test]
async fn conflicts_are_retried_then_reported() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("unlucky");

    t.store.fail_next_commits(2);
    t.ledger.earn(user, 10, "login", "Daily login reward", None).await?;
    assert_eq!(t.store.commit_attempts(), 3);
    assert_eq!(t.ledger.get_balance(user).await?.current_points, 10);

    t.store.fail_next_commits(3);
    let err = t.ledger.earn(user, 10, "login", "Daily login reward", None).await.unwrap_err();
    assert!(matches!(err, Error::Contention { attempts: 3 }));
    assert!(err.is_retryable());
    assert_eq!(t.ledger.get_balance(user).await?.current_points, 10);
    Ok(())
}

#[tokio::test]
async fn retry_budget_follows_config() -> Result<(), Error> {
    let t = TestLedger::with_config(LedgerConfig { max_commit_attempts: 1, ..LedgerConfig::default() });
    let user = t.identities.add_user("single-shot");

    t.store.fail_next_commits(1);
    let err = t.ledger.earn(user, 10, "login", "Daily login reward", None).await.unwrap_err();
    assert!(matches!(err, Error::Contention { attempts: 1 }));
    assert_eq!(t.store.commit_attempts(), 1);
    Ok(())
}

#[tokio::test]
async fn unavailable_store_fails_without_writing() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("offline");
    t.ledger.earn(user, 10, "login", "Daily login reward", None).await?;

    t.store.set_unavailable(true);
    let err = t.ledger.earn(user, 10, "login", "Daily login reward", None).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert_eq!(err.code(), "UNAVAILABLE");

    t.store.set_unavailable(false);
    assert_eq!(t.ledger.get_balance(user).await?.current_points, 10);
    assert_eq!(t.store.all_transactions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn mutations_invalidate_cached_reads() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("cached");
    t.ledger.earn(user, 40, "post", "Post created", None).await?;

    assert_eq!(t.ledger.get_balance(user).await?.current_points, 40);
    assert_eq!(t.ledger.get_history(user, 1, 20).await?.len(), 1);
    assert!(!t.ledger.cache().is_empty());

    t.ledger.spend(user, 15, "shop", "Ad skip", None).await?;

    assert_eq!(t.ledger.get_balance(user).await?.current_points, 25);
    assert_eq!(t.ledger.get_history(user, 1, 20).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn history_is_newest_first_and_filterable() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("historian");

    for i in 0..5 {
        t.ledger.earn(user, 10, "comment", &format!("comment #{i}"), None).await?;
        t.clock.advance(chrono::Duration::seconds(1));
    }
    t.ledger.spend(user, 20, "shop", "Ad skip", None).await?;

    let page = t.ledger.get_history(user, 1, 3).await?;
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].kind, TransactionKind::Spend);
    assert!(page.windows(2).all(|w| (w[0].created_at, w[0].id) > (w[1].created_at, w[1].id)));

    let second = t.ledger.get_history(user, 2, 3).await?;
    assert_eq!(second.len(), 3);
    assert!(second.iter().all(|r| !page.iter().any(|p| p.id == r.id)));

    let earns = t
        .ledger
        .get_history_filtered(
            user,
            TransactionFilter { kind: Some(TransactionKind::Earn), ..TransactionFilter::default() },
            1,
            50,
        )
        .await?;
    assert_eq!(earns.len(), 5);

    let cursor = &page[0];
    let older = t
        .ledger
        .get_history_filtered(
            user,
            TransactionFilter { before: Some((cursor.created_at, cursor.id)), ..TransactionFilter::default() },
            1,
            50,
        )
        .await?;
    assert_eq!(older.len(), 5);
    Ok(())
}

#[tokio::test]
async fn committed_mutations_publish_events() -> Result<(), Error> {
    let t = TestLedger::new();
    let mut rx = t.event_bus.subscribe(Some(16));
    let alice = t.identities.add_user("alice");
    let bob = t.identities.add_user("bob");

    let earned = t.ledger.earn(alice, 30, "post", "Post created", None).await?;
    t.ledger.transfer(alice, bob, 10, "thanks").await?;
    let _ = t.ledger.spend(alice, 1_000, "shop", "Profile frame", None).await;

    match rx.recv().await {
        Some(LedgerEvent::PointsEarned { transaction_id, balance, .. }) => {
            assert_eq!(transaction_id, earned);
            assert_eq!(balance, 30);
        }
        other => panic!("unexpected event {other:?}"),
    }
    match rx.recv().await {
        Some(LedgerEvent::PointsTransferred { from_user_id, to_user_id, amount, .. }) => {
            assert_eq!((from_user_id, to_user_id, amount), (alice, bob, 10));
        }
        other => panic!("unexpected event {other:?}"),
    }
    // The refused spend published nothing.
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn standing_reflects_tier_and_level() -> Result<(), Error> {
    let t = TestLedger::new();
    let user = t.identities.add_user("climber");

    let standing = t.ledger.get_standing(user).await?;
    assert_eq!(standing.tier.name, "Bronze");
    assert_eq!(standing.level, 1);

    t.ledger.earn(user, 1_500, "event", "Event participation", None).await?;
    let standing = t.ledger.get_standing(user).await?;
    assert_eq!(standing.tier.name, "Silver");
    assert_eq!(standing.next_tier.as_ref().map(|t| t.name.as_str()), Some("Gold"));
    assert!(standing.progress.percent > 0.0 && standing.progress.percent < 100.0);
    Ok(())
}
