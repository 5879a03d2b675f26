// src/api/handlers.rs

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::Error;
use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::models::{
    AccountBalance, ActiveBooster, ActivityKind, AttendanceRecord, BoosterType, CheckInResult,
    GiftResult, MissionResult, MonthlyEarning, RankedBalance, ShopListing, ShopReceipt, Standing,
    TransactionFilter, TransactionKind, TransactionRecord, UserRank,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_field<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T, Error> {
    value.parse::<T>().map_err(Error::Validation)
}

#[derive(Debug, Serialize)]
pub struct TransactionCreated {
    pub transaction_id: Uuid,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LedgerEntryRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub related_id: Option<String>,
}

pub async fn earn(
    State(state): State<ApiState>,
    Json(req): Json<LedgerEntryRequest>,
) -> Result<(StatusCode, Json<TransactionCreated>), ApiError> {
    let transaction_id = state
        .ledger
        .earn(req.user_id, req.amount, &req.category, &req.description, req.related_id)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { transaction_id })))
}

pub async fn spend(
    State(state): State<ApiState>,
    Json(req): Json<LedgerEntryRequest>,
) -> Result<(StatusCode, Json<TransactionCreated>), ApiError> {
    let transaction_id = state
        .ledger
        .spend(req.user_id, req.amount, &req.category, &req.description, req.related_id)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { transaction_id })))
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub amount: i64,
    pub description: String,
}

pub async fn transfer(
    State(state): State<ApiState>,
    Json(req): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransactionCreated>), ApiError> {
    let transaction_id = state
        .ledger
        .transfer(req.from_user_id, req.to_user_id, req.amount, &req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { transaction_id })))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub user_id: Uuid,
    /// Signed: negative debits.
    pub amount: i64,
    pub reason: String,
    pub admin_id: Uuid,
}

pub async fn admin_adjust(
    State(state): State<ApiState>,
    Json(req): Json<AdjustRequest>,
) -> Result<(StatusCode, Json<TransactionCreated>), ApiError> {
    let transaction_id = state
        .ledger
        .admin_adjust(req.user_id, req.amount, &req.reason, req.admin_id)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { transaction_id })))
}

pub async fn get_balance(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<AccountBalance> {
    Ok(Json(state.ledger.get_balance(user_id).await?))
}

pub async fn get_standing(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Standing> {
    Ok(Json(state.ledger.get_standing(user_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub before_at: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

impl HistoryQuery {
    fn filter(&self) -> Result<TransactionFilter, Error> {
        let kind = self.kind.as_deref().map(parse_field::<TransactionKind>).transpose()?;
        let before = match (self.before_at, self.before_id) {
            (Some(at), Some(id)) => Some((at, id)),
            (None, None) => None,
            _ => {
                return Err(Error::Validation("before_at and before_id must be given together".into()));
            }
        };
        Ok(TransactionFilter {
            kind,
            category: self.category.clone(),
            since: self.since,
            until: self.until,
            before,
        })
    }
}

pub async fn get_history(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<TransactionRecord>> {
    let filter = query.filter()?;
    let records = state
        .ledger
        .get_history_filtered(user_id, filter, query.page.unwrap_or(1), query.page_size.unwrap_or(20))
        .await?;
    Ok(Json(records))
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Check-ins always count for the current platform day.
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub user_id: Uuid,
}

pub async fn check_in(
    State(state): State<ApiState>,
    Json(req): Json<CheckInRequest>,
) -> ApiResult<CheckInResult> {
    Ok(Json(state.rewards.check_in_today(req.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MissionRequest {
    pub user_id: Uuid,
    pub mission_id: String,
    pub reward: i64,
}

pub async fn complete_mission(
    State(state): State<ApiState>,
    Json(req): Json<MissionRequest>,
) -> ApiResult<MissionResult> {
    let today = state.rewards.today()?;
    let result = state
        .rewards
        .complete_daily_mission(req.user_id, &req.mission_id, req.reward, today)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct GiftRequest {
    pub from_user_id: Uuid,
    pub to_username: String,
    pub amount: i64,
    #[serde(default)]
    pub message: String,
}

pub async fn gift(
    State(state): State<ApiState>,
    Json(req): Json<GiftRequest>,
) -> ApiResult<GiftResult> {
    let result = state
        .rewards
        .gift_points(req.from_user_id, &req.to_username, req.amount, &req.message)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub user_id: Uuid,
    pub activity: String,
    #[serde(default)]
    pub related_id: Option<String>,
}

pub async fn reward_activity(
    State(state): State<ApiState>,
    Json(req): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<TransactionCreated>), ApiError> {
    let kind = parse_field::<ActivityKind>(&req.activity)?;
    let transaction_id = state
        .rewards
        .reward_activity(req.user_id, kind, req.related_id)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { transaction_id })))
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub limit: Option<i64>,
}

impl MonthQuery {
    /// Falls back to the current platform month.
    fn resolve(&self, today: NaiveDate) -> (i32, u32) {
        (self.year.unwrap_or(today.year()), self.month.unwrap_or(today.month()))
    }
}

pub async fn monthly_attendance(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Vec<AttendanceRecord>> {
    let (year, month) = query.resolve(state.rewards.today()?);
    Ok(Json(state.rewards.monthly_attendance(user_id, year, month).await?))
}

// ---------------------------------------------------------------------------
// Boosters and shop
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BoosterRequest {
    pub user_id: Uuid,
    pub booster_type: String,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

pub async fn purchase_booster(
    State(state): State<ApiState>,
    Json(req): Json<BoosterRequest>,
) -> Result<(StatusCode, Json<ActiveBooster>), ApiError> {
    let booster_type = parse_field::<BoosterType>(&req.booster_type)?;
    let booster = match req.duration_seconds {
        Some(seconds) => state.boosters.purchase(req.user_id, booster_type, seconds).await?,
        None => state.boosters.purchase_default(req.user_id, booster_type).await?,
    };
    Ok((StatusCode::CREATED, Json(booster)))
}

pub async fn get_booster(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Value> {
    let booster = state.boosters.active_booster(user_id).await?;
    let multiplier = booster.as_ref().map(|b| b.multiplier).unwrap_or(1.0);
    Ok(Json(json!({ "booster": booster, "multiplier": multiplier })))
}

pub async fn shop_items(State(state): State<ApiState>) -> Json<Vec<ShopListing>> {
    Json(state.shop.catalog())
}

#[derive(Debug, Deserialize)]
pub struct ShopPurchaseRequest {
    pub user_id: Uuid,
    pub item_id: String,
}

pub async fn shop_purchase(
    State(state): State<ApiState>,
    Json(req): Json<ShopPurchaseRequest>,
) -> Result<(StatusCode, Json<ShopReceipt>), ApiError> {
    let receipt = state.shop.purchase_item(req.user_id, &req.item_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn top_balances(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<RankedBalance>> {
    Ok(Json(state.rankings.top_balances(query.limit.unwrap_or(10)).await?))
}

pub async fn monthly_ranking(
    State(state): State<ApiState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Vec<MonthlyEarning>> {
    let (year, month) = query.resolve(state.rewards.today()?);
    let limit = query.limit.unwrap_or(10);
    Ok(Json(state.rankings.monthly_earned_ranking(year, month, limit).await?))
}

pub async fn user_rank(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserRank> {
    Ok(Json(state.rankings.user_rank(user_id).await?))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
