use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use docketcc_common::DigestType;
use docketcc_store::{
    FilingStore, LogEntry, NewQueueEntry, NotificationQueue, StoredFiling, Subscriber,
    SystemLog, UserStore,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::content::build_payload;
use crate::timing::scheduled_for;

const COMPONENT: &str = "notifier";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub enqueued: usize,
    /// Subscribers for whom every filing was already covered.
    pub already_notified: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub gaps_found: usize,
    pub enqueued: usize,
    pub failed: usize,
}

/// Turns stored filings into queued digests.
pub struct Notifier {
    users: UserStore,
    queue: NotificationQueue,
    filings: FilingStore,
    log: SystemLog,
    timezone: Tz,
    seed_filing_count: i64,
}

impl Notifier {
    pub fn new(
        users: UserStore,
        queue: NotificationQueue,
        filings: FilingStore,
        log: SystemLog,
        timezone: Tz,
        seed_filing_count: i64,
    ) -> Self {
        Self {
            users,
            queue,
            filings,
            log,
            timezone,
            seed_filing_count,
        }
    }

    /// Queue one digest per subscriber of `docket_number` covering whichever
    /// of `filing_ids` they haven't already been sent or queued.
    pub async fn notify_new_filings(
        &self,
        docket_number: &str,
        filing_ids: &[String],
        now: DateTime<Utc>,
    ) -> anyhow::Result<NotifyReport> {
        let mut report = NotifyReport::default();
        if filing_ids.is_empty() {
            return Ok(report);
        }

        let subscribers = self.users.subscribers_for_docket(docket_number).await?;
        if subscribers.is_empty() {
            return Ok(report);
        }
        let filings = self.filings.get_many(filing_ids).await?;

        for subscriber in &subscribers {
            match self.enqueue_for(subscriber, &filings, now).await {
                Ok(true) => report.enqueued += 1,
                Ok(false) => report.already_notified += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        docket = %docket_number,
                        user = %subscriber.email,
                        error = %e,
                        "Failed to enqueue digest"
                    );
                    self.log
                        .write(
                            LogEntry::error(COMPONENT, format!("Failed to enqueue digest: {e}"))
                                .with_docket(docket_number)
                                .with_details(json!({ "subscription_id": subscriber.subscription_id })),
                        )
                        .await;
                }
            }
        }

        info!(
            docket = %docket_number,
            filings = filings.len(),
            subscribers = subscribers.len(),
            enqueued = report.enqueued,
            already_notified = report.already_notified,
            failed = report.failed,
            "Notifications queued"
        );
        Ok(report)
    }

    /// Returns false when nothing was left to send this subscriber.
    async fn enqueue_for(
        &self,
        subscriber: &Subscriber,
        filings: &[StoredFiling],
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut fresh = Vec::with_capacity(filings.len());
        for filing in filings {
            if !self.queue.has_been_notified(&subscriber.email, &filing.id).await? {
                fresh.push(filing.clone());
            }
        }
        if fresh.is_empty() {
            return Ok(false);
        }

        self.enqueue_digest(subscriber, subscriber.frequency.into(), &fresh, now)
            .await?;
        Ok(true)
    }

    async fn enqueue_digest(
        &self,
        subscriber: &Subscriber,
        digest_type: DigestType,
        filings: &[StoredFiling],
        now: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let payload = build_payload(
            &subscriber.docket_number,
            digest_type,
            subscriber.tier,
            subscriber.trial_expires_at,
            filings,
            now,
        );

        let id = self
            .queue
            .enqueue(&NewQueueEntry {
                user_email: subscriber.email.clone(),
                docket_number: subscriber.docket_number.clone(),
                digest_type,
                filing_ids: payload.filing_ids(),
                filing_data: serde_json::to_value(&payload)?,
                scheduled_for: scheduled_for(digest_type, now, self.timezone),
            })
            .await?;
        Ok(id)
    }

    /// Queue a catch-up digest of the docket's most recent filings for every
    /// subscription still flagged `needs_seed`. A docket with nothing stored
    /// yet keeps the flag so the next run tries again.
    pub async fn enqueue_seed_digests(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let pending = self.users.subscribers_needing_seed().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut recent_by_docket: HashMap<String, Vec<StoredFiling>> = HashMap::new();
        let mut seeded = 0;

        for subscriber in &pending {
            if !recent_by_docket.contains_key(&subscriber.docket_number) {
                let recent = self
                    .filings
                    .get_recent(&subscriber.docket_number, self.seed_filing_count)
                    .await?;
                recent_by_docket.insert(subscriber.docket_number.clone(), recent);
            }
            let recent = &recent_by_docket[&subscriber.docket_number];
            if recent.is_empty() {
                continue;
            }

            match self
                .enqueue_digest(subscriber, DigestType::SeedDigest, recent, now)
                .await
            {
                Ok(_) => {
                    self.users.mark_seeded(subscriber.subscription_id).await?;
                    seeded += 1;
                }
                Err(e) => {
                    warn!(
                        user = %subscriber.email,
                        docket = %subscriber.docket_number,
                        error = %e,
                        "Failed to enqueue seed digest"
                    );
                }
            }
        }

        if seeded > 0 {
            info!(seeded, "Seed digests queued");
        }
        Ok(seeded)
    }

    /// Outbox backfill: find filings stored in the last `window` that a
    /// then-current subscriber has no queue row for, and queue them.
    pub async fn reconcile(&self, window: Duration, now: DateTime<Utc>) -> anyhow::Result<ReconcileReport> {
        let pairs = self.queue.unnotified_pairs(now - window).await?;
        let mut report = ReconcileReport {
            gaps_found: pairs.len(),
            ..Default::default()
        };
        if pairs.is_empty() {
            return Ok(report);
        }

        let mut by_subscription: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for pair in pairs {
            by_subscription
                .entry(pair.subscription_id)
                .or_default()
                .push(pair.filing_id);
        }

        for (subscription_id, filing_ids) in by_subscription {
            // unsubscribed since the gap opened
            let Some(subscriber) = self.users.subscriber(subscription_id).await? else {
                continue;
            };
            let filings = self.filings.get_many(&filing_ids).await?;
            if filings.is_empty() {
                continue;
            }

            let digest_type = DigestType::from(subscriber.frequency);
            match self.enqueue_digest(&subscriber, digest_type, &filings, now).await {
                Ok(_) => report.enqueued += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(subscription_id, error = %e, "Reconcile enqueue failed");
                }
            }
        }

        info!(
            gaps = report.gaps_found,
            enqueued = report.enqueued,
            failed = report.failed,
            "Reconciliation complete"
        );
        if report.enqueued > 0 {
            self.log
                .write(
                    LogEntry::warn(
                        COMPONENT,
                        format!("Backfilled {} missing digests", report.enqueued),
                    )
                    .with_details(json!({ "gaps": report.gaps_found })),
                )
                .await;
        }
        Ok(report)
    }
}
