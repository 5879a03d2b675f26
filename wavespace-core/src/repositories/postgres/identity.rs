// src/repositories/postgres/identity.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;
use crate::models::Identity;
use crate::repositories::IdentityProvider;

/// Reads the platform's `users` table. The ledger never writes to it.
#[derive(Clone)]
pub struct PostgresIdentityProvider {
    pool: Pool<Postgres>,
}

impl PostgresIdentityProvider {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Seeds a user row. Only test and demo setups call this.
    pub async fn create_user(&self, user_id: Uuid, username: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, is_active)
            VALUES ($1, $2, TRUE)
            "#,
        )
            .bind(user_id)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for PostgresIdentityProvider {
    async fn resolve_username(&self, username: &str) -> Result<Option<Uuid>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id
            FROM users
            WHERE username = $1
              AND is_active
            "#,
        )
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(r.try_get("user_id")?)),
            None => Ok(None),
        }
    }

    async fn find_identity(&self, user_id: Uuid) -> Result<Option<Identity>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, username, is_active
            FROM users
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = row {
            Ok(Some(Identity {
                user_id: r.try_get("user_id")?,
                username: r.try_get("username")?,
                is_active: r.try_get("is_active")?,
            }))
        } else {
            Ok(None)
        }
    }
}
