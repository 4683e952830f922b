use chrono::{DateTime, Utc};
use docketcc_common::{docket_health, validate_docket_number, DocketHealth, DocketStatus};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;

/// A row from the `active_dockets` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DocketEntry {
    pub docket_number: String,
    pub subscriber_count: i64,
    pub status: DocketStatus,
    pub error_count: i64,
    pub last_checked: Option<DateTime<Utc>>,
    pub latest_filing_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocketEntry {
    pub fn health(&self, now: DateTime<Utc>) -> DocketHealth {
        docket_health(self.error_count, self.last_checked, now)
    }
}

/// Outcome of one poll of one docket.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub checked_at: DateTime<Utc>,
    pub new_filing_count: usize,
    pub latest_filing_id: Option<String>,
    pub succeeded: bool,
}

impl PollResult {
    pub fn success(
        checked_at: DateTime<Utc>,
        new_filing_count: usize,
        latest_filing_id: Option<String>,
    ) -> Self {
        Self {
            checked_at,
            new_filing_count,
            latest_filing_id,
            succeeded: true,
        }
    }

    pub fn failure(checked_at: DateTime<Utc>) -> Self {
        Self {
            checked_at,
            new_filing_count: 0,
            latest_filing_id: None,
            succeeded: false,
        }
    }
}

/// Which dockets are monitored, and how polling has gone for each.
#[derive(Clone)]
pub struct DocketRegistry {
    pool: SqlitePool,
}

impl DocketRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an active entry with zero subscribers if absent. Returns true
    /// when a row was created.
    pub async fn register_or_touch(&self, docket_number: &str) -> Result<bool> {
        let docket_number = validate_docket_number(docket_number)?;
        let result = sqlx::query(
            r#"
            INSERT INTO active_dockets
                (docket_number, subscriber_count, status, error_count, created_at)
            VALUES (?1, 0, 'active', 0, ?2)
            ON CONFLICT (docket_number) DO NOTHING
            "#,
        )
        .bind(&docket_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            debug!(docket = %docket_number, "Registered docket");
        }
        Ok(created)
    }

    pub async fn increment_subscribers(&self, docket_number: &str) -> Result<()> {
        sqlx::query(
            "UPDATE active_dockets SET subscriber_count = subscriber_count + 1 WHERE docket_number = ?1",
        )
        .bind(docket_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Decrement, never below zero.
    pub async fn decrement_subscribers(&self, docket_number: &str) -> Result<()> {
        sqlx::query(
            "UPDATE active_dockets SET subscriber_count = MAX(subscriber_count - 1, 0) WHERE docket_number = ?1",
        )
        .bind(docket_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Success resets the error streak and advances `last_checked`; failure
    /// only bumps `error_count`.
    pub async fn record_poll_result(&self, docket_number: &str, result: &PollResult) -> Result<()> {
        if result.succeeded {
            sqlx::query(
                r#"
                UPDATE active_dockets
                SET error_count = 0,
                    last_checked = ?2,
                    latest_filing_id = COALESCE(?3, latest_filing_id)
                WHERE docket_number = ?1
                "#,
            )
            .bind(docket_number)
            .bind(result.checked_at)
            .bind(&result.latest_filing_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "UPDATE active_dockets SET error_count = error_count + 1 WHERE docket_number = ?1",
            )
            .bind(docket_number)
            .execute(&self.pool)
            .await?;
        }

        debug!(
            docket = %docket_number,
            succeeded = result.succeeded,
            new_filings = result.new_filing_count,
            "Recorded poll result"
        );
        Ok(())
    }

    /// Active dockets in polling priority order: most subscribers first,
    /// then the stalest (never-checked before everything else).
    pub async fn list_active(&self) -> Result<Vec<DocketEntry>> {
        let rows = sqlx::query_as::<_, DocketEntry>(
            r#"
            SELECT docket_number, subscriber_count, status, error_count,
                   last_checked, latest_filing_id, created_at
            FROM active_dockets
            WHERE status = 'active'
            ORDER BY subscriber_count DESC, last_checked ASC NULLS FIRST, docket_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_all(&self) -> Result<Vec<DocketEntry>> {
        let rows = sqlx::query_as::<_, DocketEntry>(
            r#"
            SELECT docket_number, subscriber_count, status, error_count,
                   last_checked, latest_filing_id, created_at
            FROM active_dockets
            ORDER BY docket_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get(&self, docket_number: &str) -> Result<Option<DocketEntry>> {
        let row = sqlx::query_as::<_, DocketEntry>(
            r#"
            SELECT docket_number, subscriber_count, status, error_count,
                   last_checked, latest_filing_id, created_at
            FROM active_dockets
            WHERE docket_number = ?1
            "#,
        )
        .bind(docket_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Admin status transition. Returns false if the docket is unknown.
    pub async fn set_status(&self, docket_number: &str, status: DocketStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE active_dockets SET status = ?2 WHERE docket_number = ?1")
            .bind(docket_number)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
