use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use tracing::info;

use crate::error::DocketError;

/// Application configuration loaded from environment variables.
///
/// Built once at startup and handed to each component; nothing downstream
/// reads the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Filing source (FCC ECFS)
    pub ecfs_api_key: String,
    pub ecfs_base_url: String,

    // AI enrichment
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub extract_api_url: Option<String>,
    pub extract_api_key: Option<String>,
    pub max_documents: usize,
    pub max_document_chars: usize,

    // Email delivery
    pub email_api_key: Option<String>,
    pub email_api_url: String,
    pub email_from: String,
    pub app_url: String,

    // Scheduling
    pub timezone: Tz,
    pub fetch_concurrency: usize,
    pub fetch_wave_delay_ms: u64,
    pub seed_filing_count: i64,
    pub tick_minutes: Option<u64>,

    // Delivery
    pub queue_lease_secs: i64,
    pub delivery_batch: i64,

    // Admin surface
    pub admin_token: Option<String>,
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, DocketError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://docketcc.db?mode=rwc".to_string()),
            ecfs_api_key: required_env("ECFS_API_KEY")?,
            ecfs_base_url: env::var("ECFS_BASE_URL")
                .unwrap_or_else(|_| "https://publicapi.fcc.gov/ecfs".to_string()),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5-20250929".to_string()),
            extract_api_url: optional_env("EXTRACT_API_URL"),
            extract_api_key: optional_env("EXTRACT_API_KEY"),
            max_documents: parsed_env("MAX_DOCUMENTS", 3)?,
            max_document_chars: parsed_env("MAX_DOCUMENT_CHARS", 50_000)?,
            email_api_key: optional_env("EMAIL_API_KEY"),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "DocketCC <alerts@docketcc.com>".to_string()),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "https://docketcc.com".to_string()),
            timezone: parsed_env("TIMEZONE", chrono_tz::America::New_York)?,
            fetch_concurrency: parsed_env("FETCH_CONCURRENCY", 3)?,
            fetch_wave_delay_ms: parsed_env("FETCH_WAVE_DELAY_MS", 1_000)?,
            seed_filing_count: parsed_env("SEED_FILING_COUNT", 5)?,
            tick_minutes: match optional_env("TICK_MINUTES") {
                Some(v) => Some(parse_value("TICK_MINUTES", &v)?),
                None => None,
            },
            queue_lease_secs: parsed_env("QUEUE_LEASE_SECS", 300)?,
            delivery_batch: parsed_env("DELIVERY_BATCH", 50)?,
            admin_token: optional_env("ADMIN_TOKEN"),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: parsed_env("API_PORT", 3000)?,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            database_url = %self.database_url,
            ecfs_base_url = %self.ecfs_base_url,
            ecfs_api_key = %redact(&self.ecfs_api_key),
            anthropic_api_key = %redact_opt(&self.anthropic_api_key),
            anthropic_model = %self.anthropic_model,
            extract_api_url = ?self.extract_api_url,
            email_api_key = %redact_opt(&self.email_api_key),
            email_from = %self.email_from,
            app_url = %self.app_url,
            timezone = %self.timezone,
            fetch_concurrency = self.fetch_concurrency,
            fetch_wave_delay_ms = self.fetch_wave_delay_ms,
            tick_minutes = ?self.tick_minutes,
            queue_lease_secs = self.queue_lease_secs,
            admin_token = %redact_opt(&self.admin_token),
            "Loaded configuration"
        );
    }
}

fn required_env(key: &str) -> Result<String, DocketError> {
    optional_env(key).ok_or_else(|| DocketError::Config(format!("{key} environment variable is required")))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, DocketError> {
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, DocketError> {
    raw.trim()
        .parse()
        .map_err(|_| DocketError::Config(format!("{key} has an invalid value: {raw}")))
}

fn redact(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", secret.chars().take(4).collect::<String>())
    }
}

fn redact_opt(secret: &Option<String>) -> String {
    secret.as_deref().map(redact).unwrap_or_else(|| "<unset>".to_string())
}
