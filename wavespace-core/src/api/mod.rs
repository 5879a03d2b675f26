// src/api/mod.rs
//
// HTTP surface over the ledger, reward, booster, shop and ranking services.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use axum_server::{Handle, Server};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::Error;
use crate::services::{BoosterService, LedgerService, RankingService, RewardService, ShopService};

pub use error::{ApiError, ErrorBody};

#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<LedgerService>,
    pub rewards: Arc<RewardService>,
    pub boosters: Arc<BoosterService>,
    pub shop: Arc<ShopService>,
    pub rankings: Arc<RankingService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/users/{user_id}/balance", get(handlers::get_balance))
        .route("/users/{user_id}/standing", get(handlers::get_standing))
        .route("/users/{user_id}/history", get(handlers::get_history))
        .route("/users/{user_id}/attendance", get(handlers::monthly_attendance))
        .route("/users/{user_id}/booster", get(handlers::get_booster))
        .route("/users/{user_id}/rank", get(handlers::user_rank))
        .route("/ledger/earn", post(handlers::earn))
        .route("/ledger/spend", post(handlers::spend))
        .route("/ledger/transfer", post(handlers::transfer))
        .route("/ledger/adjust", post(handlers::admin_adjust))
        .route("/rewards/check-in", post(handlers::check_in))
        .route("/rewards/missions", post(handlers::complete_mission))
        .route("/rewards/gift", post(handlers::gift))
        .route("/rewards/activity", post(handlers::reward_activity))
        .route("/boosters", post(handlers::purchase_booster))
        .route("/shop/items", get(handlers::shop_items))
        .route("/shop/purchase", post(handlers::shop_purchase))
        .route("/rankings/balances", get(handlers::top_balances))
        .route("/rankings/monthly", get(handlers::monthly_ranking))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Serves the API until `handle` is told to shut down.
pub async fn serve(addr: SocketAddr, state: ApiState, handle: Handle) -> Result<(), Error> {
    let app = router(state);
    info!("WAVE SPACE API listening on http://{}", addr);

    Server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("WAVE SPACE API shut down.");
    Ok(())
}
