// src/services/shop_service.rs

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::Error;
use crate::models::{ShopItem, ShopListing, ShopReceipt};
use crate::services::booster_service::BoosterService;
use crate::services::ledger_service::{Entry, LedgerService};

pub const CATEGORY_SHOP: &str = "shop";

/// Point shop. Cosmetic items are a plain spend; boosters are handed to the booster engine.
pub struct ShopService {
    ledger: Arc<LedgerService>,
    boosters: Arc<BoosterService>,
}

impl ShopService {
    pub fn new(ledger: Arc<LedgerService>, boosters: Arc<BoosterService>) -> Self {
        Self { ledger, boosters }
    }

    pub fn catalog(&self) -> Vec<ShopListing> {
        ShopItem::catalog().into_iter().map(ShopListing::from).collect()
    }

    pub async fn purchase_item(&self, user_id: Uuid, item_id: &str) -> Result<ShopReceipt, Error> {
        let item: ShopItem = item_id
            .parse()
            .map_err(|_| Error::NotFound(format!("shop item '{item_id}'")))?;

        let receipt = match item {
            ShopItem::Booster(booster_type) => {
                let booster = self.boosters.purchase_default(user_id, booster_type).await?;
                let balance = self.ledger.get_balance(user_id).await?;
                ShopReceipt {
                    item_id: item.id().to_string(),
                    cost: item.cost(),
                    booster: Some(booster),
                    remaining_points: balance.current_points,
                }
            }
            _ => {
                let entry = Entry::debit(user_id, item.cost(), CATEGORY_SHOP, item.name())
                    .related(Some(item.id().to_string()));
                let posted = self.ledger.post_entry(entry).await?;
                ShopReceipt {
                    item_id: item.id().to_string(),
                    cost: item.cost(),
                    booster: None,
                    remaining_points: posted.balance.current_points,
                }
            }
        };

        info!(%user_id, item = item.id(), cost = item.cost(), "shop purchase");
        Ok(receipt)
    }
}
