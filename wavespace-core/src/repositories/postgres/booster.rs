// src/repositories/postgres/booster.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;
use crate::models::{ActiveBooster, BoosterType};
use crate::repositories::BoosterRepository;

#[derive(Clone)]
pub struct PostgresBoosterRepository {
    pool: Pool<Postgres>,
}

impl PostgresBoosterRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BoosterRepository for PostgresBoosterRepository {
    async fn get_booster(&self, user_id: Uuid) -> Result<Option<ActiveBooster>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, booster_type, multiplier, start_time, duration_ms, end_time
            FROM active_boosters
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = row {
            let booster_type: String = r.try_get("booster_type")?;
            Ok(Some(ActiveBooster {
                user_id: r.try_get("user_id")?,
                booster_type: booster_type.parse::<BoosterType>().map_err(Error::Parse)?,
                multiplier: r.try_get("multiplier")?,
                start_time: r.try_get("start_time")?,
                duration_ms: r.try_get("duration_ms")?,
                end_time: r.try_get("end_time")?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn clear_booster(&self, user_id: Uuid, end_time: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query("DELETE FROM active_boosters WHERE user_id = $1 AND end_time = $2")
            .bind(user_id)
            .bind(end_time)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
