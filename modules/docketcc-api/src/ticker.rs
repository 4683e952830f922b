use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::AppState;

/// Run the scheduled poll and a delivery pass every `minutes`. Each tick
/// finishes before the next starts; a tick that lands while a manual trigger
/// holds the run lock waits for it.
pub fn start_ticker(state: Arc<AppState>, minutes: u64) -> tokio::task::JoinHandle<()> {
    info!(minutes, "Starting pipeline ticker");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(minutes.max(1) * 60));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            tick(&state).await;
        }
    })
}

pub async fn tick(state: &AppState) {
    let _guard = state.run_lock.lock().await;

    match state.pipeline.run_scheduled(Utc::now()).await {
        Ok(report) if report.skipped => {}
        Ok(report) => info!(
            polled = report.dockets_polled,
            stored = report.filings_stored,
            enqueued = report.notifications_enqueued,
            "Scheduled poll complete"
        ),
        Err(e) => error!(error = %e, "Scheduled poll failed"),
    }

    // The poll can run long; lease and due-ness are measured from here.
    if let Err(e) = state.pipeline.deliver(Utc::now()).await {
        error!(error = %e, "Delivery pass failed");
    }
}
