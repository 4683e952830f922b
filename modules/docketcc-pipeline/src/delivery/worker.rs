use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use docketcc_store::{LogEntry, NotificationQueue, QueueEntry, StoreError, SystemLog, UserStore};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::backend::{EmailSender, OutgoingEmail};
use super::render::render_digest;
use crate::content::DigestPayload;

const COMPONENT: &str = "delivery";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    /// Rows this pass no longer held: another worker took the lease over, or
    /// the lease could not be renewed before sending.
    pub lost: usize,
    /// Sends or failures that happened but could not be written back. These
    /// rows stay pending and are retried once their lease runs out.
    pub unrecorded: usize,
}

/// Drains due queue rows: lease, render, send, finalize.
pub struct DeliveryWorker {
    queue: NotificationQueue,
    users: UserStore,
    log: SystemLog,
    sender: Arc<dyn EmailSender>,
    app_url: String,
    lease: Duration,
}

impl DeliveryWorker {
    pub fn new(
        queue: NotificationQueue,
        users: UserStore,
        log: SystemLog,
        sender: Arc<dyn EmailSender>,
        app_url: String,
        lease: Duration,
    ) -> Self {
        Self {
            queue,
            users,
            log,
            sender,
            app_url,
            lease,
        }
    }

    /// Claim up to `limit` due rows and deliver them one at a time.
    ///
    /// The lease on each row is renewed just before its send, so a long batch
    /// never sends a row whose original lease already ran out. Time elapsed
    /// during the pass is added on top of `now`.
    pub async fn deliver(&self, limit: i64, now: DateTime<Utc>) -> anyhow::Result<DeliveryReport> {
        let started = Utc::now();
        let rows = self.queue.claim_pending(limit, self.lease, now).await?;
        let mut report = DeliveryReport {
            claimed: rows.len(),
            ..Default::default()
        };

        for row in rows {
            let Some(token) = row.claim_token.clone() else {
                continue;
            };

            let at = now + (Utc::now() - started);
            match self.queue.renew_lease(row.id, &token, at + self.lease).await {
                Ok(true) => {}
                Ok(false) => {
                    report.lost += 1;
                    continue;
                }
                Err(e) => {
                    warn!(id = row.id, error = %e, "Lease renewal failed, leaving row for a later pass");
                    report.lost += 1;
                    continue;
                }
            }

            match self.send_row(&row).await {
                Ok(()) => {
                    let sent_at = Utc::now();
                    match self.queue.mark_sent(row.id, &token, sent_at).await {
                        Ok(true) => {
                            report.sent += 1;
                            if let Err(e) = self
                                .users
                                .touch_last_notified(&row.user_email, &row.docket_number, sent_at)
                                .await
                            {
                                warn!(id = row.id, error = %e, "Failed to update last_notified");
                            }
                        }
                        Ok(false) => report.lost += 1,
                        Err(e) => {
                            report.unrecorded += 1;
                            self.record_unwritten(&row, "sent", &e).await;
                        }
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(id = row.id, user = %row.user_email, error = %message, "Digest delivery failed");
                    match self.queue.mark_failed(row.id, &token, &message).await {
                        Ok(true) => {
                            report.failed += 1;
                            self.log
                                .write(
                                    LogEntry::error(COMPONENT, format!("Delivery failed: {message}"))
                                        .with_docket(&row.docket_number)
                                        .with_details(json!({
                                            "queue_id": row.id,
                                            "digest_type": row.digest_type,
                                        })),
                                )
                                .await;
                        }
                        Ok(false) => report.lost += 1,
                        Err(e) => {
                            report.unrecorded += 1;
                            self.record_unwritten(&row, "failed", &e).await;
                        }
                    }
                }
            }
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                sent = report.sent,
                failed = report.failed,
                lost = report.lost,
                unrecorded = report.unrecorded,
                "Delivery pass complete"
            );
        }
        Ok(report)
    }

    async fn record_unwritten(&self, row: &QueueEntry, outcome: &str, error: &StoreError) {
        error!(id = row.id, outcome, error = %error, "Could not record delivery outcome");
        self.log
            .write(
                LogEntry::error(COMPONENT, format!("Could not record delivery outcome: {error}"))
                    .with_docket(&row.docket_number)
                    .with_details(json!({
                        "queue_id": row.id,
                        "outcome": outcome,
                        "digest_type": row.digest_type,
                    })),
            )
            .await;
    }

    async fn send_row(&self, row: &QueueEntry) -> anyhow::Result<()> {
        let payload: DigestPayload = serde_json::from_value(row.filing_data.0.clone())
            .map_err(|e| anyhow::anyhow!("Unreadable digest snapshot: {e}"))?;
        let rendered = render_digest(&payload, &self.app_url);

        let email = OutgoingEmail {
            to: row.user_email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };
        let message_id = self.sender.send(&email).await?;

        info!(
            id = row.id,
            user = %row.user_email,
            docket = %row.docket_number,
            message_id = %message_id,
            "Digest sent"
        );
        Ok(())
    }
}
