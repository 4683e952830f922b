use async_trait::async_trait;
use chrono::Duration;
use docketcc_common::Filing;

use crate::error::Result;

/// Anything that can list filings on a docket.
///
/// An empty window is `Ok(vec![])`; failures to reach or authenticate with
/// the source are errors. Implementations don't retry.
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Filings received within `lookback` of now, newest first.
    async fn fetch_filings(&self, docket_number: &str, lookback: Duration) -> Result<Vec<Filing>>;

    /// The `count` most recent filings regardless of age.
    async fn fetch_latest(&self, docket_number: &str, count: usize) -> Result<Vec<Filing>>;
}
