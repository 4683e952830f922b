use chrono::{DateTime, Duration, Utc};
use docketcc_common::{validate_docket_number, Filing};
use docketcc_sources::fetch_many;
use docketcc_store::{
    DocketRegistry, FilingStore, LogEntry, NotificationQueue, PollResult, SystemLog, UserStore,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::delivery::{DeliveryReport, DeliveryWorker};
use crate::deps::PipelineDeps;
use crate::enrichment::{EnrichReport, Enricher};
use crate::notify::{Notifier, ReconcileReport};
use crate::schedule::{processing_strategy, ProcessingStrategy};

const COMPONENT: &str = "pipeline";

/// What one invocation did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Quiet hours: nothing was polled.
    pub skipped: bool,
    pub strategy: Option<ProcessingStrategy>,
    pub dockets_polled: usize,
    pub dockets_failed: usize,
    pub filings_fetched: usize,
    pub filings_stored: usize,
    pub duplicates: usize,
    pub store_failures: usize,
    pub enrichment: EnrichReport,
    pub notifications_enqueued: usize,
    pub seed_digests: usize,
}

/// The ingestion pipeline: poll, store, enrich, queue.
pub struct Pipeline {
    deps: PipelineDeps,
    registry: DocketRegistry,
    filings: FilingStore,
    users: UserStore,
    queue: NotificationQueue,
    log: SystemLog,
    enricher: Enricher,
    notifier: Notifier,
    worker: DeliveryWorker,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let pool = deps.pool.clone();
        let registry = DocketRegistry::new(pool.clone());
        let filings = FilingStore::new(pool.clone());
        let users = UserStore::new(pool.clone());
        let queue = NotificationQueue::new(pool.clone());
        let log = SystemLog::new(pool);

        let enricher = Enricher::new(
            filings.clone(),
            log.clone(),
            deps.extractor.clone(),
            deps.summarizer.clone(),
            deps.max_documents,
        );
        let notifier = Notifier::new(
            users.clone(),
            queue.clone(),
            filings.clone(),
            log.clone(),
            deps.timezone,
            deps.seed_filing_count,
        );
        let worker = DeliveryWorker::new(
            queue.clone(),
            users.clone(),
            log.clone(),
            deps.email.clone(),
            deps.app_url.clone(),
            deps.queue_lease,
        );

        Self {
            deps,
            registry,
            filings,
            users,
            queue,
            log,
            enricher,
            notifier,
            worker,
        }
    }

    pub fn registry(&self) -> &DocketRegistry {
        &self.registry
    }

    pub fn filings(&self) -> &FilingStore {
        &self.filings
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn system_log(&self) -> &SystemLog {
        &self.log
    }

    /// Timer entry point. Consults the time-of-day heuristic, then polls the
    /// highest-priority active dockets.
    pub async fn run_scheduled(&self, now: DateTime<Utc>) -> anyhow::Result<RunReport> {
        let strategy = processing_strategy(now, self.deps.timezone);
        if !strategy.should_process {
            info!(timezone = %self.deps.timezone, "Quiet hours, skipping poll");
            return Ok(RunReport {
                skipped: true,
                strategy: Some(strategy),
                ..Default::default()
            });
        }

        let dockets: Vec<String> = self
            .registry
            .list_active()
            .await?
            .into_iter()
            .take(strategy.batch_size)
            .map(|d| d.docket_number)
            .collect();

        info!(
            lookback_hours = strategy.lookback_hours,
            batch_size = strategy.batch_size,
            dockets = dockets.len(),
            "Scheduled run starting"
        );

        let mut report = self.poll(&dockets, strategy.lookback_hours, now).await?;
        report.strategy = Some(strategy);
        Ok(report)
    }

    /// Manual trigger: poll one docket now, ignoring the heuristic.
    pub async fn run_docket(&self, docket_number: &str, lookback_hours: i64) -> anyhow::Result<RunReport> {
        let docket_number = validate_docket_number(docket_number)?;
        self.registry.register_or_touch(&docket_number).await?;

        info!(docket = %docket_number, lookback_hours, "Manual poll triggered");
        self.log
            .write(
                LogEntry::info(COMPONENT, "Manual poll triggered")
                    .with_docket(&docket_number)
                    .with_details(json!({ "lookback_hours": lookback_hours })),
            )
            .await;

        self.poll(&[docket_number], lookback_hours, Utc::now()).await
    }

    async fn poll(
        &self,
        dockets: &[String],
        lookback_hours: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RunReport> {
        let mut report = RunReport::default();

        let mut batch = fetch_many(
            self.deps.source.clone(),
            dockets,
            Duration::hours(lookback_hours),
            self.deps.fetch_concurrency,
            self.deps.fetch_wave_delay,
        )
        .await;

        for failure in &batch.errors {
            report.dockets_failed += 1;
            self.record_failure(&failure.docket_number, &failure.error.to_string(), now)
                .await;
        }

        let mut fresh_by_docket: Vec<(String, Vec<String>)> = Vec::new();
        let mut fresh_filings: Vec<Filing> = Vec::new();

        // Priority order, not completion order
        for docket in dockets {
            let Some(fetched) = batch.results.remove(docket) else {
                continue;
            };
            report.dockets_polled += 1;
            report.filings_fetched += fetched.len();

            let outcome = match self.filings.store_new(&fetched).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    report.dockets_failed += 1;
                    self.record_failure(docket, &e.to_string(), now).await;
                    continue;
                }
            };
            report.filings_stored += outcome.stored_count;
            report.duplicates += outcome.duplicate_count;
            report.store_failures += outcome.failed.len();

            let latest = fetched
                .iter()
                .max_by_key(|f| f.date_received)
                .map(|f| f.id.clone());
            if let Err(e) = self
                .registry
                .record_poll_result(docket, &PollResult::success(now, outcome.stored_count, latest))
                .await
            {
                warn!(docket = %docket, error = %e, "Failed to record poll result");
            }

            if !outcome.stored_ids.is_empty() {
                fresh_filings.extend(
                    fetched
                        .into_iter()
                        .filter(|f| outcome.stored_ids.contains(&f.id)),
                );
                fresh_by_docket.push((docket.clone(), outcome.stored_ids));
            }
        }

        report.enrichment = self.enricher.enrich_all(&fresh_filings).await;

        // Seeds first so a brand-new subscriber isn't sent the same filing twice.
        match self.notifier.enqueue_seed_digests(now).await {
            Ok(count) => report.seed_digests = count,
            Err(e) => warn!(error = %e, "Seed digest pass failed"),
        }

        for (docket, filing_ids) in &fresh_by_docket {
            match self.notifier.notify_new_filings(docket, filing_ids, now).await {
                Ok(notified) => report.notifications_enqueued += notified.enqueued,
                Err(e) => {
                    warn!(docket = %docket, error = %e, "Notification fan-out failed");
                    self.log
                        .write(
                            LogEntry::error(COMPONENT, format!("Notification fan-out failed: {e}"))
                                .with_docket(docket),
                        )
                        .await;
                }
            }
        }

        info!(
            polled = report.dockets_polled,
            failed = report.dockets_failed,
            fetched = report.filings_fetched,
            stored = report.filings_stored,
            duplicates = report.duplicates,
            enriched = report.enrichment.completed,
            enqueued = report.notifications_enqueued,
            seeds = report.seed_digests,
            "Poll complete"
        );
        Ok(report)
    }

    async fn record_failure(&self, docket: &str, message: &str, now: DateTime<Utc>) {
        if let Err(e) = self
            .registry
            .record_poll_result(docket, &PollResult::failure(now))
            .await
        {
            warn!(docket = %docket, error = %e, "Failed to record poll failure");
        }
        self.log
            .write(LogEntry::error(COMPONENT, format!("Docket poll failed: {message}")).with_docket(docket))
            .await;
    }

    /// Send due digests.
    pub async fn deliver(&self, now: DateTime<Utc>) -> anyhow::Result<DeliveryReport> {
        self.worker.deliver(self.deps.delivery_batch, now).await
    }

    pub async fn reconcile(&self, window_hours: i64, now: DateTime<Utc>) -> anyhow::Result<ReconcileReport> {
        self.notifier.reconcile(Duration::hours(window_hours), now).await
    }

    pub async fn reprocess_pending(&self, limit: i64) -> anyhow::Result<EnrichReport> {
        Ok(self.enricher.reprocess_pending(limit).await?)
    }

    pub async fn expire_trials(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(self.users.expire_trials(now).await?)
    }
}
