use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::models::booster::{ActiveBooster, BoosterType};

/// Point shop catalog. Boosters are sold here too but are activated by the booster engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopItem {
    Booster(BoosterType),
    ProfileFrame,
    NicknameColor,
    PostHighlight,
    AdSkip,
}

impl ShopItem {
    pub fn id(&self) -> &'static str {
        match self {
            ShopItem::Booster(BoosterType::Double) => "booster_double",
            ShopItem::Booster(BoosterType::Triple) => "booster_triple",
            ShopItem::Booster(BoosterType::Mega) => "booster_mega",
            ShopItem::ProfileFrame => "profile_frame",
            ShopItem::NicknameColor => "nickname_color",
            ShopItem::PostHighlight => "post_highlight",
            ShopItem::AdSkip => "ad_skip",
        }
    }

    pub fn cost(&self) -> i64 {
        match self {
            ShopItem::Booster(b) => b.cost(),
            ShopItem::ProfileFrame => 2000,
            ShopItem::NicknameColor => 1500,
            ShopItem::PostHighlight => 800,
            ShopItem::AdSkip => 300,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShopItem::Booster(BoosterType::Double) => "2x booster",
            ShopItem::Booster(BoosterType::Triple) => "3x booster",
            ShopItem::Booster(BoosterType::Mega) => "5x booster",
            ShopItem::ProfileFrame => "Profile frame",
            ShopItem::NicknameColor => "Nickname color",
            ShopItem::PostHighlight => "Post highlight",
            ShopItem::AdSkip => "Ad skip pass",
        }
    }

    pub fn catalog() -> Vec<ShopItem> {
        let mut items: Vec<ShopItem> = BoosterType::ALL.iter().map(|b| ShopItem::Booster(*b)).collect();
        items.extend([
            ShopItem::ProfileFrame,
            ShopItem::NicknameColor,
            ShopItem::PostHighlight,
            ShopItem::AdSkip,
        ]);
        items
    }
}

impl fmt::Display for ShopItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ShopItem {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShopItem::catalog()
            .into_iter()
            .find(|item| item.id() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown shop item: {}", s))
    }
}

/// Serialized view of a catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct ShopListing {
    pub id: &'static str,
    pub name: &'static str,
    pub cost: i64,
}

impl From<ShopItem> for ShopListing {
    fn from(item: ShopItem) -> Self {
        Self { id: item.id(), name: item.name(), cost: item.cost() }
    }
}

/// Outcome of a shop purchase.
#[derive(Debug, Clone, Serialize)]
pub struct ShopReceipt {
    pub item_id: String,
    pub cost: i64,
    /// Set when the item was a booster.
    pub booster: Option<ActiveBooster>,
    pub remaining_points: i64,
}
