use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBalance {
    pub rank: i64,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub current_points: i64,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyEarning {
    pub rank: i64,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub monthly_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRank {
    pub user_id: Uuid,
    /// `None` for users without a balance row.
    pub rank: Option<i64>,
    pub current_points: i64,
}
