// src/repositories/postgres/ledger.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Error;
use crate::models::{
    AccountBalance, AttendanceRecord, CommitOutcome, DuplicateRecord, LedgerBatch,
    MissionCompletion, PageRequest, TransactionFilter, TransactionKind, TransactionRecord,
};
use crate::repositories::{LedgerRepository, RankingRepository};

/// SQLSTATEs that mean "another transaction got there first": serialization_failure
/// and deadlock_detected.
const CONFLICT_STATES: [&str; 2] = ["40001", "40P01"];

#[derive(Clone)]
pub struct PostgresLedgerRepository {
    pool: Pool<Postgres>,
}

impl PostgresLedgerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn is_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| CONFLICT_STATES.contains(&code.as_ref()))
        .unwrap_or(false)
}

fn balance_from_row(row: &PgRow) -> Result<AccountBalance, Error> {
    Ok(AccountBalance {
        user_id: row.try_get("user_id")?,
        current_points: row.try_get("current_points")?,
        total_earned: row.try_get("total_earned")?,
        total_spent: row.try_get("total_spent")?,
        last_transaction_at: row.try_get("last_transaction_at")?,
        version: row.try_get("version")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord, Error> {
    let kind: String = row.try_get("kind")?;
    Ok(TransactionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        kind: kind.parse::<TransactionKind>().map_err(Error::Parse)?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        related_id: row.try_get("related_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceRecord, Error> {
    Ok(AttendanceRecord {
        user_id: row.try_get("user_id")?,
        attendance_date: row.try_get("attendance_date")?,
        consecutive_days: row.try_get("consecutive_days")?,
        points_earned: row.try_get("points_earned")?,
        bonus_points: row.try_get("bonus_points")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Applies the batch on an open transaction. Returns early (without committing)
/// on a failed guard or a duplicate key; the caller rolls back.
async fn apply_batch(conn: &mut PgConnection, batch: &LedgerBatch) -> Result<CommitOutcome, sqlx::Error> {
    // Lock rows in a fixed order so overlapping transfers cannot deadlock each other.
    let mut updates: Vec<_> = batch.balances.iter().collect();
    updates.sort_by_key(|u| u.next.user_id);

    for update in updates {
        let next = &update.next;
        let result = match update.expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO point_balances (
                        user_id, current_points, total_earned, total_spent,
                        last_transaction_at, version
                    )
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (user_id) DO NOTHING
                    "#,
                )
                    .bind(next.user_id)
                    .bind(next.current_points)
                    .bind(next.total_earned)
                    .bind(next.total_spent)
                    .bind(next.last_transaction_at)
                    .bind(next.version)
                    .execute(&mut *conn)
                    .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE point_balances
                    SET current_points = $2,
                        total_earned = $3,
                        total_spent = $4,
                        last_transaction_at = $5,
                        version = $6
                    WHERE user_id = $1
                      AND version = $7
                    "#,
                )
                    .bind(next.user_id)
                    .bind(next.current_points)
                    .bind(next.total_earned)
                    .bind(next.total_spent)
                    .bind(next.last_transaction_at)
                    .bind(next.version)
                    .bind(expected)
                    .execute(&mut *conn)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            debug!(user_id = %next.user_id, "balance guard failed");
            return Ok(CommitOutcome::Conflict);
        }
    }

    for record in &batch.transactions {
        sqlx::query(
            r#"
            INSERT INTO point_transactions (
                id, user_id, amount, kind, category, description, related_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.amount)
            .bind(record.kind.as_str())
            .bind(&record.category)
            .bind(&record.description)
            .bind(&record.related_id)
            .bind(record.created_at)
            .execute(&mut *conn)
            .await?;
    }

    if let Some(att) = &batch.attendance {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records (
                user_id, attendance_date, consecutive_days, points_earned, bonus_points, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, attendance_date) DO NOTHING
            "#,
        )
            .bind(att.user_id)
            .bind(att.attendance_date)
            .bind(att.consecutive_days)
            .bind(att.points_earned)
            .bind(att.bonus_points)
            .bind(att.created_at)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(CommitOutcome::Duplicate(DuplicateRecord::Attendance));
        }
    }

    if let Some(mission) = &batch.mission {
        let result = sqlx::query(
            r#"
            INSERT INTO mission_completions (
                user_id, mission_id, completed_on, reward, transaction_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, mission_id, completed_on) DO NOTHING
            "#,
        )
            .bind(mission.user_id)
            .bind(&mission.mission_id)
            .bind(mission.completed_on)
            .bind(mission.reward)
            .bind(mission.transaction_id)
            .bind(mission.created_at)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(CommitOutcome::Duplicate(DuplicateRecord::Mission));
        }
    }

    if let Some(booster) = &batch.booster {
        sqlx::query(
            r#"
            INSERT INTO active_boosters (
                user_id, booster_type, multiplier, start_time, duration_ms, end_time
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
                SET booster_type = EXCLUDED.booster_type,
                    multiplier = EXCLUDED.multiplier,
                    start_time = EXCLUDED.start_time,
                    duration_ms = EXCLUDED.duration_ms,
                    end_time = EXCLUDED.end_time
            "#,
        )
            .bind(booster.user_id)
            .bind(booster.booster_type.as_str())
            .bind(booster.multiplier)
            .bind(booster.start_time)
            .bind(booster.duration_ms)
            .bind(booster.end_time)
            .execute(&mut *conn)
            .await?;
    }

    Ok(CommitOutcome::Committed)
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn read_balance(&self, user_id: Uuid) -> Result<Option<AccountBalance>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, current_points, total_earned, total_spent,
                   last_transaction_at, version
            FROM point_balances
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(balance_from_row).transpose()
    }

    async fn commit(&self, batch: &LedgerBatch) -> Result<CommitOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        match apply_batch(&mut tx, batch).await {
            Ok(CommitOutcome::Committed) => match tx.commit().await {
                Ok(()) => Ok(CommitOutcome::Committed),
                Err(e) if is_conflict(&e) => Ok(CommitOutcome::Conflict),
                Err(e) => Err(e.into()),
            },
            Ok(outcome) => {
                tx.rollback().await?;
                Ok(outcome)
            }
            Err(e) if is_conflict(&e) => {
                warn!("ledger commit hit a serialization conflict: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("rollback after conflict failed: {}", rollback_err);
                }
                Ok(CommitOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn query_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<Vec<TransactionRecord>, Error> {
        let (before_at, before_id) = match filter.before {
            Some((at, id)) => (Some(at), Some(id)),
            None => (None, None),
        };

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, kind, category, description, related_id, created_at
            FROM point_transactions
            WHERE user_id = $1
              AND ($2::text IS NULL OR kind = $2)
              AND ($3::text IS NULL OR category = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
              AND ($6::timestamptz IS NULL OR (created_at, id) < ($6, $7::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $8
            OFFSET $9
            "#,
        )
            .bind(user_id)
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(&filter.category)
            .bind(filter.since)
            .bind(filter.until)
            .bind(before_at)
            .bind(before_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn latest_attendance(
        &self,
        user_id: Uuid,
        on_or_before: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, attendance_date, consecutive_days, points_earned,
                   bonus_points, created_at
            FROM attendance_records
            WHERE user_id = $1
              AND attendance_date <= $2
            ORDER BY attendance_date DESC
            LIMIT 1
            "#,
        )
            .bind(user_id)
            .bind(on_or_before)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(attendance_from_row).transpose()
    }

    async fn list_attendance(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, attendance_date, consecutive_days, points_earned,
                   bonus_points, created_at
            FROM attendance_records
            WHERE user_id = $1
              AND attendance_date BETWEEN $2 AND $3
            ORDER BY attendance_date ASC
            "#,
        )
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(attendance_from_row).collect()
    }

    async fn find_mission_completion(
        &self,
        user_id: Uuid,
        mission_id: &str,
        day: NaiveDate,
    ) -> Result<Option<MissionCompletion>, Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, mission_id, completed_on, reward, transaction_id, created_at
            FROM mission_completions
            WHERE user_id = $1
              AND mission_id = $2
              AND completed_on = $3
            "#,
        )
            .bind(user_id)
            .bind(mission_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = row {
            Ok(Some(MissionCompletion {
                user_id: r.try_get("user_id")?,
                mission_id: r.try_get("mission_id")?,
                completed_on: r.try_get("completed_on")?,
                reward: r.try_get("reward")?,
                transaction_id: r.try_get("transaction_id")?,
                created_at: r.try_get("created_at")?,
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl RankingRepository for PostgresLedgerRepository {
    async fn top_balances(&self, limit: i64) -> Result<Vec<AccountBalance>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, current_points, total_earned, total_spent,
                   last_transaction_at, version
            FROM point_balances
            ORDER BY current_points DESC, user_id ASC
            LIMIT $1
            "#,
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(balance_from_row).collect()
    }

    async fn earned_totals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(Uuid, i64)>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, SUM(amount)::BIGINT AS earned
            FROM point_transactions
            WHERE kind = 'earn'
              AND created_at >= $1
              AND created_at < $2
            GROUP BY user_id
            ORDER BY earned DESC, user_id ASC
            LIMIT $3
            "#,
        )
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push((row.try_get("user_id")?, row.try_get("earned")?));
        }
        Ok(result)
    }

    async fn count_balances_above(&self, points: i64) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM point_balances WHERE current_points > $1",
        )
            .bind(points)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
