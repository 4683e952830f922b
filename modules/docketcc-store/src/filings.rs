use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use docketcc_common::{Filing, FilingDocument, FilingEnrichment, FilingStatus};
use serde::Serialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::system_log::{LogEntry, SystemLog};

const COMPONENT: &str = "filing_store";

/// A row from the `filings` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredFiling {
    pub id: String,
    pub docket_number: String,
    pub title: String,
    pub author: String,
    pub filing_type: String,
    pub date_received: DateTime<Utc>,
    pub filing_url: String,
    pub documents: Json<Vec<FilingDocument>>,
    pub raw_data: Json<serde_json::Value>,
    pub summary: Option<String>,
    pub key_points: Option<Json<Vec<String>>>,
    pub stakeholders: Option<Json<Vec<String>>>,
    pub regulatory_impact: Option<String>,
    pub confidence: Option<f64>,
    pub documents_processed: Option<i64>,
    pub status: FilingStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl StoredFiling {
    /// The AI analysis, if enrichment has attached one.
    pub fn enrichment(&self) -> Option<FilingEnrichment> {
        let summary = self.summary.clone()?;
        Some(FilingEnrichment {
            summary,
            key_points: self.key_points.as_ref().map(|k| k.0.clone()).unwrap_or_default(),
            stakeholders: self.stakeholders.as_ref().map(|s| s.0.clone()).unwrap_or_default(),
            regulatory_impact: self.regulatory_impact.clone().unwrap_or_default(),
            confidence: self.confidence.unwrap_or(0.0),
            documents_processed: self.documents_processed.unwrap_or(0),
        })
    }

    pub fn to_filing(&self) -> Filing {
        Filing {
            id: self.id.clone(),
            docket_number: self.docket_number.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            filing_type: self.filing_type.clone(),
            date_received: self.date_received,
            filing_url: self.filing_url.clone(),
            documents: self.documents.0.clone(),
            raw_data: self.raw_data.0.clone(),
        }
    }
}

/// Result of `store_new`. Every input is accounted for exactly once:
/// `stored_count + duplicate_count + failed.len() == input length`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreOutcome {
    pub stored_count: usize,
    pub duplicate_count: usize,
    pub stored_ids: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: FilingStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilingStats {
    pub total: i64,
    pub recent_24h: i64,
    pub by_status: Vec<StatusCount>,
}

const SELECT_FILING: &str = r#"
    SELECT id, docket_number, title, author, filing_type, date_received, filing_url,
           documents, raw_data, summary, key_points, stakeholders, regulatory_impact,
           confidence, documents_processed, status, created_at, processed_at
    FROM filings
"#;

/// Deduplicating filing persistence. Identity is the source-assigned id only.
#[derive(Clone)]
pub struct FilingStore {
    pool: SqlitePool,
    log: SystemLog,
}

impl FilingStore {
    pub fn new(pool: SqlitePool) -> Self {
        let log = SystemLog::new(pool.clone());
        Self { pool, log }
    }

    /// Persist the filings whose ids are not yet stored.
    ///
    /// Existing ids are looked up in one query. Remaining filings are inserted
    /// one at a time; a failed insert is logged and skipped, and a unique
    /// conflict (a concurrent run got there first) counts as a duplicate.
    pub async fn store_new(&self, filings: &[Filing]) -> Result<StoreOutcome> {
        let mut outcome = StoreOutcome::default();
        if filings.is_empty() {
            return Ok(outcome);
        }

        let ids: Vec<&str> = filings.iter().map(|f| f.id.as_str()).collect();
        let existing = self.existing_ids(&ids).await?;

        let mut seen: HashSet<&str> = HashSet::new();
        for filing in filings {
            if existing.contains(&filing.id) || !seen.insert(filing.id.as_str()) {
                outcome.duplicate_count += 1;
                continue;
            }

            match self.insert(filing).await {
                Ok(()) => {
                    outcome.stored_count += 1;
                    outcome.stored_ids.push(filing.id.clone());
                }
                Err(e) if e.is_conflict() => {
                    outcome.duplicate_count += 1;
                }
                Err(e) => {
                    warn!(
                        filing_id = %filing.id,
                        docket = %filing.docket_number,
                        error = %e,
                        "Failed to store filing"
                    );
                    self.log
                        .write(
                            LogEntry::error(COMPONENT, format!("Failed to store filing: {e}"))
                                .with_docket(&filing.docket_number)
                                .with_filing(&filing.id)
                                .with_details(json!({ "title": filing.title })),
                        )
                        .await;
                    outcome.failed.push(filing.id.clone());
                }
            }
        }

        info!(
            candidates = filings.len(),
            stored = outcome.stored_count,
            duplicates = outcome.duplicate_count,
            failed = outcome.failed.len(),
            "Stored new filings"
        );
        Ok(outcome)
    }

    async fn existing_ids(&self, ids: &[&str]) -> Result<HashSet<String>> {
        let ids_json = serde_json::to_string(ids)?;
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT id FROM filings WHERE id IN (SELECT value FROM json_each(?1))",
        )
        .bind(ids_json)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn insert(&self, filing: &Filing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO filings
                (id, docket_number, title, author, filing_type, date_received,
                 filing_url, documents, raw_data, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10)
            "#,
        )
        .bind(&filing.id)
        .bind(&filing.docket_number)
        .bind(&filing.title)
        .bind(&filing.author)
        .bind(&filing.filing_type)
        .bind(filing.date_received)
        .bind(&filing.filing_url)
        .bind(Json(&filing.documents))
        .bind(Json(&filing.raw_data))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredFiling>> {
        let row = sqlx::query_as::<_, StoredFiling>(&format!("{SELECT_FILING} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Fetch several filings by id, newest received first.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<StoredFiling>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids_json = serde_json::to_string(ids)?;
        let rows = sqlx::query_as::<_, StoredFiling>(&format!(
            "{SELECT_FILING} WHERE id IN (SELECT value FROM json_each(?1)) ORDER BY date_received DESC"
        ))
        .bind(ids_json)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Most recently received filings for a docket.
    pub async fn get_recent(&self, docket_number: &str, limit: i64) -> Result<Vec<StoredFiling>> {
        let rows = sqlx::query_as::<_, StoredFiling>(&format!(
            "{SELECT_FILING} WHERE docket_number = ?1 ORDER BY date_received DESC, id DESC LIMIT ?2"
        ))
        .bind(docket_number)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Filings in a status, oldest stored first.
    pub async fn list_by_status(&self, status: FilingStatus, limit: i64) -> Result<Vec<StoredFiling>> {
        let rows = sqlx::query_as::<_, StoredFiling>(&format!(
            "{SELECT_FILING} WHERE status = ?1 ORDER BY created_at ASC LIMIT ?2"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Filings stored at or after `since`, oldest first.
    pub async fn stored_since(&self, since: DateTime<Utc>) -> Result<Vec<StoredFiling>> {
        let rows = sqlx::query_as::<_, StoredFiling>(&format!(
            "{SELECT_FILING} WHERE created_at >= ?1 ORDER BY created_at ASC"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_stats(&self) -> Result<FilingStats> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM filings")
            .fetch_one(&self.pool)
            .await?;

        let recent_24h =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM filings WHERE created_at >= ?1")
                .bind(Utc::now() - Duration::hours(24))
                .fetch_one(&self.pool)
                .await?;

        let by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM filings GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(FilingStats {
            total,
            recent_24h,
            by_status,
        })
    }

    /// Move a filing to `status`, attaching AI fields when given.
    pub async fn update_status(
        &self,
        filing_id: &str,
        status: FilingStatus,
        enrichment: Option<&FilingEnrichment>,
    ) -> Result<()> {
        let result = match enrichment {
            Some(e) => {
                sqlx::query(
                    r#"
                    UPDATE filings
                    SET status = ?2,
                        summary = ?3,
                        key_points = ?4,
                        stakeholders = ?5,
                        regulatory_impact = ?6,
                        confidence = ?7,
                        documents_processed = ?8,
                        processed_at = ?9
                    WHERE id = ?1
                    "#,
                )
                .bind(filing_id)
                .bind(status)
                .bind(&e.summary)
                .bind(Json(&e.key_points))
                .bind(Json(&e.stakeholders))
                .bind(&e.regulatory_impact)
                .bind(e.confidence)
                .bind(e.documents_processed)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("UPDATE filings SET status = ?2 WHERE id = ?1")
                    .bind(filing_id)
                    .bind(status)
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("filing {filing_id}")));
        }
        Ok(())
    }
}
