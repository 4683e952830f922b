use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Status enums
// =============================================================================

/// Generates `as_str`, `Display` and `FromStr` for a text-backed enum.
/// The strings match the values persisted in SQLite.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($name))),
                }
            }
        }
    };
}

/// Service level controlling content richness and notification frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Trial,
    Pro,
}

text_enum!(Tier { Free => "free", Trial => "trial", Pro => "pro" });

impl Tier {
    /// Whether this tier receives AI analysis in digests.
    pub fn includes_analysis(&self) -> bool {
        !matches!(self, Tier::Free)
    }

    /// The tier actually in force at `now`: a trial past its expiry is free.
    pub fn effective(self, trial_expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Tier {
        match (self, trial_expires_at) {
            (Tier::Trial, Some(expires)) if expires <= now => Tier::Free,
            (tier, _) => tier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Immediate,
}

text_enum!(Frequency { Daily => "daily", Weekly => "weekly", Immediate => "immediate" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DigestType {
    Daily,
    Weekly,
    Immediate,
    SeedDigest,
}

text_enum!(DigestType {
    Daily => "daily",
    Weekly => "weekly",
    Immediate => "immediate",
    SeedDigest => "seed_digest",
});

impl From<Frequency> for DigestType {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => DigestType::Daily,
            Frequency::Weekly => DigestType::Weekly,
            Frequency::Immediate => DigestType::Immediate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FilingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

text_enum!(FilingStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

/// Queue row lifecycle: `pending -> {sent, failed}`, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Sent,
    Failed,
}

text_enum!(QueueStatus { Pending => "pending", Sent => "sent", Failed => "failed" });

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueueStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DocketStatus {
    Active,
    Paused,
    Error,
}

text_enum!(DocketStatus { Active => "active", Paused => "paused", Error => "error" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

text_enum!(LogLevel { Debug => "debug", Info => "info", Warn => "warn", Error => "error" });

// =============================================================================
// Filings
// =============================================================================

/// An attachment on a filing, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingDocument {
    pub filename: String,
    pub url: String,
}

/// A filing normalized from the regulator's API. `id` is the source-assigned
/// identifier and the only dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub id: String,
    pub docket_number: String,
    pub title: String,
    pub author: String,
    pub filing_type: String,
    pub date_received: DateTime<Utc>,
    pub filing_url: String,
    pub documents: Vec<FilingDocument>,
    pub raw_data: serde_json::Value,
}

/// AI-generated analysis attached to a filing once enrichment completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingEnrichment {
    pub summary: String,
    pub key_points: Vec<String>,
    pub stakeholders: Vec<String>,
    pub regulatory_impact: String,
    pub confidence: f64,
    pub documents_processed: i64,
}
