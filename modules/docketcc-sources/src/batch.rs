use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use docketcc_common::Filing;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::SourceError;
use crate::source::FilingSource;

/// A docket whose fetch failed during a batch.
#[derive(Debug)]
pub struct DocketFetchError {
    pub docket_number: String,
    pub error: SourceError,
}

/// Per-docket results of a multi-docket fetch. Every requested docket lands
/// in exactly one of `results` or `errors`.
#[derive(Debug, Default)]
pub struct BatchFetch {
    pub results: HashMap<String, Vec<Filing>>,
    pub errors: Vec<DocketFetchError>,
}

impl BatchFetch {
    pub fn total_filings(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }
}

/// Fetch several dockets in waves of `concurrency`, pausing `wave_delay`
/// between waves to stay polite to the source. A failing docket is recorded
/// and the batch carries on. The returned future is `Send`.
pub async fn fetch_many(
    source: Arc<dyn FilingSource>,
    docket_numbers: &[String],
    lookback: Duration,
    concurrency: usize,
    wave_delay: StdDuration,
) -> BatchFetch {
    let concurrency = concurrency.max(1);
    let mut batch = BatchFetch::default();

    for (wave, dockets) in docket_numbers.chunks(concurrency).enumerate() {
        if wave > 0 && !wave_delay.is_zero() {
            tokio::time::sleep(wave_delay).await;
        }

        let fetches: Vec<BoxFuture<'static, (String, crate::Result<Vec<Filing>>)>> = dockets
            .iter()
            .cloned()
            .map(|docket| {
                let source = Arc::clone(&source);
                async move {
                    let outcome = source.fetch_filings(&docket, lookback).await;
                    (docket, outcome)
                }
                .boxed()
            })
            .collect();

        let outcomes: Vec<_> = stream::iter(fetches)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (docket_number, outcome) in outcomes {
            match outcome {
                Ok(filings) => {
                    batch.results.insert(docket_number, filings);
                }
                Err(error) => {
                    warn!(docket = %docket_number, error = %error, "Docket fetch failed");
                    batch.errors.push(DocketFetchError {
                        docket_number,
                        error,
                    });
                }
            }
        }
    }

    info!(
        dockets = docket_numbers.len(),
        succeeded = batch.results.len(),
        failed = batch.errors.len(),
        filings = batch.total_filings(),
        "Batch fetch complete"
    );
    batch
}
