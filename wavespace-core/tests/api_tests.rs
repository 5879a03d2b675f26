// tests/api_tests.rs

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use wavespace_core::{Error, api::router, test_utils::TestLedger};

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .expect("request");

    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn earn_then_read_balance_over_http() -> Result<(), Error> {
    let t = TestLedger::new();
    let app = router(t.api_state());
    let user = t.identities.add_user("web");

    let (status, body) = call(
        &app,
        Method::POST,
        "/ledger/earn",
        Some(json!({ "user_id": user, "amount": 50, "category": "post", "description": "Post created" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["transaction_id"].is_string());

    let (status, body) = call(&app, Method::GET, &format!("/users/{user}/balance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_points"], 50);

    let (status, body) = call(&app, Method::GET, &format!("/users/{user}/standing"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"]["name"], "Bronze");
    Ok(())
}

#[tokio::test]
async fn business_errors_map_to_stable_codes() -> Result<(), Error> {
    let t = TestLedger::new();
    let app = router(t.api_state());
    let user = t.identities.add_user("web");

    let (status, body) = call(
        &app,
        Method::POST,
        "/ledger/spend",
        Some(json!({ "user_id": user, "amount": 10, "category": "shop", "description": "Ad skip" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_BALANCE");

    let (status, body) = call(
        &app,
        Method::POST,
        "/ledger/earn",
        Some(json!({ "user_id": user, "amount": -5, "category": "post", "description": "bad" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    let (status, body) = call(
        &app,
        Method::POST,
        "/shop/purchase",
        Some(json!({ "user_id": user, "item_id": "unicorn" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    t.store.set_unavailable(true);
    let (status, body) = call(&app, Method::GET, &format!("/users/{user}/balance"), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UNAVAILABLE");
    assert!(!body["message"].as_str().unwrap_or_default().contains("in-memory"));
    Ok(())
}

#[tokio::test]
async fn check_in_twice_over_http() -> Result<(), Error> {
    let t = TestLedger::new();
    let app = router(t.api_state());
    let user = t.identities.add_user("daily");

    let (status, body) = call(&app, Method::POST, "/rewards/check-in", Some(json!({ "user_id": user }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consecutive_days"], 1);

    let (status, body) = call(&app, Method::POST, "/rewards/check-in", Some(json!({ "user_id": user }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_CHECKED_IN");

    // A client-chosen date is not honoured; the platform day still applies.
    let (status, body) = call(
        &app,
        Method::POST,
        "/rewards/check-in",
        Some(json!({ "user_id": user, "date": "2034-05-15" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_CHECKED_IN");

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/users/{user}/attendance?year=2024&month=5"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn history_query_parameters_are_validated() -> Result<(), Error> {
    let t = TestLedger::new();
    let app = router(t.api_state());
    let user = t.identities.add_user("reader");
    t.ledger.earn(user, 10, "login", "Daily login reward", None).await?;
    t.ledger.spend(user, 5, "shop", "Ad skip", None).await?;

    let (status, body) = call(&app, Method::GET, &format!("/users/{user}/history?kind=spend"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["kind"], "spend");

    let (status, _) = call(&app, Method::GET, &format!("/users/{user}/history?kind=refund"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, &format!("/users/{user}/history?page_size=500"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/users/{user}/history?before_id={}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn boosters_and_rankings_over_http() -> Result<(), Error> {
    let t = TestLedger::new();
    let app = router(t.api_state());
    let user = t.identities.add_user("ranked");
    t.ledger.admin_adjust(user, 800, "seed", Uuid::new_v4()).await?;

    let (status, body) = call(
        &app,
        Method::POST,
        "/boosters",
        Some(json!({ "user_id": user, "booster_type": "double" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["multiplier"], 2.0);

    let (status, body) = call(&app, Method::GET, &format!("/users/{user}/booster"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["multiplier"], 2.0);

    let (status, body) = call(&app, Method::GET, "/rankings/balances?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["username"], "ranked");
    assert_eq!(body[0]["current_points"], 300);

    let (status, body) = call(&app, Method::GET, &format!("/users/{user}/rank"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rank"], 1);

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}
