use chrono::{DateTime, Duration, Utc};
use docketcc_common::{DigestType, QueueStatus};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Parameters for enqueueing a digest.
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub user_email: String,
    pub docket_number: String,
    pub digest_type: DigestType,
    pub filing_ids: Vec<String>,
    pub filing_data: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
}

/// A row from the `notification_queue` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: i64,
    pub user_email: String,
    pub docket_number: String,
    pub digest_type: DigestType,
    pub filing_ids: Json<Vec<String>>,
    pub filing_data: Json<serde_json::Value>,
    pub status: QueueStatus,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub claim_token: Option<String>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

/// A (filing, subscription) pair with no queue row covering it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnnotifiedPair {
    pub filing_id: String,
    pub subscription_id: i64,
}

const QUEUE_COLUMNS: &str = "id, user_email, docket_number, digest_type, filing_ids, filing_data, \
     status, scheduled_for, sent_at, error_message, claim_token, claimed_until, created_at";

/// Outbound digest queue.
///
/// Claiming takes a time-bounded lease: a claimed row is invisible to other
/// claimers until `claimed_until` passes, and terminal transitions require
/// the claim token that is current on the row.
#[derive(Clone)]
pub struct NotificationQueue {
    pool: SqlitePool,
}

impl NotificationQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending row. No dedup happens here; callers check
    /// `has_been_notified` first.
    pub async fn enqueue(&self, entry: &NewQueueEntry) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO notification_queue
                (user_email, docket_number, digest_type, filing_ids, filing_data,
                 status, scheduled_for, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)
            RETURNING id
            "#,
        )
        .bind(&entry.user_email)
        .bind(&entry.docket_number)
        .bind(entry.digest_type)
        .bind(Json(&entry.filing_ids))
        .bind(Json(&entry.filing_data))
        .bind(entry.scheduled_for)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(
            id,
            user = %entry.user_email,
            docket = %entry.docket_number,
            digest_type = %entry.digest_type,
            filings = entry.filing_ids.len(),
            "Enqueued digest"
        );
        Ok(id)
    }

    /// Whether a pending or sent row for this user already covers the filing.
    /// Failed rows don't count; redelivery after a failure is an operator decision.
    pub async fn has_been_notified(&self, user_email: &str, filing_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM notification_queue q, json_each(q.filing_ids) j
                WHERE q.user_email = ?1
                  AND j.value = ?2
                  AND q.status IN ('pending', 'sent')
            )
            "#,
        )
        .bind(user_email)
        .bind(filing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Lease up to `limit` due pending rows, earliest `scheduled_for` first.
    ///
    /// Rows already leased by someone else are skipped until their lease
    /// expires. The select and the lease stamp are one statement.
    pub async fn claim_pending(
        &self,
        limit: i64,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueEntry>> {
        let token = Uuid::new_v4().to_string();

        let mut rows = sqlx::query_as::<_, QueueEntry>(&format!(
            r#"
            UPDATE notification_queue
            SET claim_token = ?1, claimed_until = ?2
            WHERE id IN (
                SELECT id FROM notification_queue
                WHERE status = 'pending'
                  AND scheduled_for <= ?3
                  AND (claimed_until IS NULL OR claimed_until < ?3)
                ORDER BY scheduled_for ASC, id ASC
                LIMIT ?4
            )
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(&token)
        .bind(now + lease)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING order is unspecified
        rows.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for).then(a.id.cmp(&b.id)));

        if !rows.is_empty() {
            debug!(claimed = rows.len(), token = %token, "Claimed queue rows");
        }
        Ok(rows)
    }

    /// Push a held lease out to `until`. Returns false if the row is no longer
    /// pending under this claim token.
    pub async fn renew_lease(&self, id: i64, claim_token: &str, until: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET claimed_until = ?3
            WHERE id = ?1 AND claim_token = ?2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(claim_token)
        .bind(until)
        .execute(&self.pool)
        .await?;

        let renewed = result.rows_affected() > 0;
        if !renewed {
            warn!(id, "Lease renewal skipped: row not pending under this claim");
        }
        Ok(renewed)
    }

    /// Terminal transition to `sent`. Returns false if the row is no longer
    /// pending under this claim token (lease lost or already finalized).
    pub async fn mark_sent(&self, id: i64, claim_token: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET status = 'sent', sent_at = ?3, error_message = NULL
            WHERE id = ?1 AND claim_token = ?2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(claim_token)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if !updated {
            warn!(id, "mark_sent skipped: row not pending under this claim");
        }
        Ok(updated)
    }

    /// Terminal transition to `failed`.
    pub async fn mark_failed(&self, id: i64, claim_token: &str, error_message: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET status = 'failed', error_message = ?3
            WHERE id = ?1 AND claim_token = ?2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(claim_token)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if !updated {
            warn!(id, "mark_failed skipped: row not pending under this claim");
        }
        Ok(updated)
    }

    pub async fn get(&self, id: i64) -> Result<Option<QueueEntry>> {
        let row = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM notification_queue WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM notification_queue ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query_as::<_, (QueueStatus, i64)>(
            "SELECT status, COUNT(*) FROM notification_queue GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            match status {
                QueueStatus::Pending => stats.pending = count,
                QueueStatus::Sent => stats.sent = count,
                QueueStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }

    /// Filings stored since `since` that have no queue row for a subscriber
    /// who was already subscribed when the filing was stored. These are the
    /// gaps left when a run stopped between storing and enqueueing.
    pub async fn unnotified_pairs(&self, since: DateTime<Utc>) -> Result<Vec<UnnotifiedPair>> {
        let rows = sqlx::query_as::<_, UnnotifiedPair>(
            r#"
            SELECT f.id AS filing_id, s.id AS subscription_id
            FROM filings f
            JOIN subscriptions s ON s.docket_number = f.docket_number
            JOIN users u ON u.id = s.user_id
            WHERE f.created_at >= ?1
              AND s.created_at <= f.created_at
              AND NOT EXISTS (
                  SELECT 1
                  FROM notification_queue q, json_each(q.filing_ids) j
                  WHERE q.user_email = u.email AND j.value = f.id
              )
            ORDER BY f.created_at ASC, s.id ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
