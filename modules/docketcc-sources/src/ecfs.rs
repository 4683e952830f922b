use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use docketcc_common::{validate_docket_number, Config, Filing};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SourceError};
use crate::normalize::normalize_response;
use crate::source::FilingSource;

pub const DEFAULT_BASE_URL: &str = "https://publicapi.fcc.gov/ecfs";

/// Page size for windowed fetches. A docket rarely sees this many filings
/// inside one polling window.
const WINDOW_LIMIT: usize = 100;

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// FCC Electronic Comment Filing System public API client.
pub struct EcfsSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl EcfsSource {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ecfs_api_key.clone(), config.ecfs_base_url.clone())
    }

    async fn get_filings(&self, docket_number: &str, params: &[(&str, String)]) -> Result<Vec<Filing>> {
        let url = format!("{}/filings", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("proceedings.name", docket_number.to_string()),
            ("sort", "date_disseminated,DESC".to_string()),
        ];
        query.extend(params.iter().cloned());

        let resp = self.client.get(&url).query(&query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = SourceError::from_status(status.as_u16(), body);
            warn!(docket = %docket_number, status = status.as_u16(), error = %err, "ECFS request failed");
            return Err(err);
        }

        let body: Value = resp.json().await?;
        let filings = normalize_response(docket_number, &body)?;
        debug!(docket = %docket_number, count = filings.len(), "Fetched filings from ECFS");
        Ok(filings)
    }
}

#[async_trait]
impl FilingSource for EcfsSource {
    async fn fetch_filings(&self, docket_number: &str, lookback: Duration) -> Result<Vec<Filing>> {
        let docket_number = validate_docket_number(docket_number)?;
        let cutoff = Utc::now() - lookback;

        let filings = self
            .get_filings(
                &docket_number,
                &[
                    ("limit", WINDOW_LIMIT.to_string()),
                    ("received_from", received_from(cutoff)),
                ],
            )
            .await?;

        let filings = within_window(filings, cutoff);
        info!(
            docket = %docket_number,
            lookback_hours = lookback.num_hours(),
            count = filings.len(),
            "Fetched filings in window"
        );
        Ok(filings)
    }

    async fn fetch_latest(&self, docket_number: &str, count: usize) -> Result<Vec<Filing>> {
        let docket_number = validate_docket_number(docket_number)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut filings = self
            .get_filings(&docket_number, &[("limit", count.to_string())])
            .await?;
        filings.sort_by(|a, b| b.date_received.cmp(&a.date_received));
        filings.truncate(count);
        Ok(filings)
    }
}

/// ECFS filters by calendar date only.
fn received_from(cutoff: DateTime<Utc>) -> String {
    cutoff.format("%Y-%m-%d").to_string()
}

/// Trim a date-granular response to the exact window, newest first.
fn within_window(mut filings: Vec<Filing>, cutoff: DateTime<Utc>) -> Vec<Filing> {
    filings.retain(|f| f.date_received >= cutoff);
    filings.sort_by(|a, b| b.date_received.cmp(&a.date_received));
    filings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn filing(id: &str, received: DateTime<Utc>) -> Filing {
        Filing {
            id: id.to_string(),
            docket_number: "23-108".to_string(),
            title: String::new(),
            author: String::new(),
            filing_type: String::new(),
            date_received: received,
            filing_url: String::new(),
            documents: vec![],
            raw_data: json!({}),
        }
    }

    #[test]
    fn received_from_is_a_calendar_date() {
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        assert_eq!(received_from(cutoff), "2024-03-01");
    }

    #[test]
    fn window_drops_older_same_day_filings() {
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let kept = within_window(
            vec![
                filing("early", Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
                filing("edge", cutoff),
                filing("late", Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap()),
            ],
            cutoff,
        );
        let ids: Vec<_> = kept.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "edge"]);
    }

    #[test]
    fn auth_statuses_are_distinguished() {
        assert!(matches!(
            SourceError::from_status(403, String::new()),
            SourceError::Auth { status: 403 }
        ));
        assert!(matches!(
            SourceError::from_status(502, "bad gateway".into()),
            SourceError::Status { status: 502, .. }
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let source = EcfsSource::new("key", "https://publicapi.fcc.gov/ecfs/");
        assert_eq!(source.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn invalid_docket_fails_before_any_request() {
        let source = EcfsSource::new("key", "http://127.0.0.1:9");
        let err = source
            .fetch_filings("2023-108", Duration::hours(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidDocket(_)));
    }
}
