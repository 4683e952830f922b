// Append-only diagnostic log in the `system_logs` table.

use chrono::{DateTime, Utc};
use docketcc_common::LogLevel;
use serde::Serialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::Result;

/// A log record to append. Build with `LogEntry::new(..)` and the `with_*` methods.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    pub docket_number: Option<String>,
    pub filing_id: Option<String>,
    pub details: serde_json::Value,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            component: component.into(),
            message: message.into(),
            docket_number: None,
            filing_id: None,
            details: json!({}),
        }
    }

    pub fn info(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, component, message)
    }

    pub fn warn(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, component, message)
    }

    pub fn error(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, component, message)
    }

    pub fn with_docket(mut self, docket_number: impl Into<String>) -> Self {
        self.docket_number = Some(docket_number.into());
        self
    }

    pub fn with_filing(mut self, filing_id: impl Into<String>) -> Self {
        self.filing_id = Some(filing_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredLogEntry {
    pub id: i64,
    pub level: LogLevel,
    pub message: String,
    pub component: String,
    pub docket_number: Option<String>,
    pub filing_id: Option<String>,
    pub details: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SystemLog {
    pool: SqlitePool,
}

impl SystemLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry. Failures are traced and swallowed; a diagnostic
    /// write must never take down the operation it describes.
    pub async fn write(&self, entry: LogEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO system_logs
                (level, message, component, docket_number, filing_id, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(entry.level)
        .bind(&entry.message)
        .bind(&entry.component)
        .bind(&entry.docket_number)
        .bind(&entry.filing_id)
        .bind(Json(&entry.details))
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(
                component = %entry.component,
                message = %entry.message,
                error = %e,
                "Failed to write system log"
            );
        }
    }

    /// Most recent entries first, optionally filtered by level.
    pub async fn recent(&self, limit: i64, level: Option<LogLevel>) -> Result<Vec<StoredLogEntry>> {
        let rows = sqlx::query_as::<_, StoredLogEntry>(
            r#"
            SELECT id, level, message, component, docket_number, filing_id, details, created_at
            FROM system_logs
            WHERE ?1 IS NULL OR level = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(level)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Entries that reference a filing, newest first.
    pub async fn for_filing(&self, filing_id: &str) -> Result<Vec<StoredLogEntry>> {
        let rows = sqlx::query_as::<_, StoredLogEntry>(
            r#"
            SELECT id, level, message, component, docket_number, filing_id, details, created_at
            FROM system_logs
            WHERE filing_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(filing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
