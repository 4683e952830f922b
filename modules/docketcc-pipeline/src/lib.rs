//! DocketCC ingestion and notification pipeline.
//!
//! A run polls the monitored dockets, stores new filings, enriches them,
//! and queues one digest per subscriber. Delivery drains the queue
//! separately. Invocations share nothing in memory; all coordination goes
//! through the database.

pub mod content;
pub mod delivery;
pub mod deps;
pub mod enrichment;
pub mod ingest;
pub mod notify;
pub mod schedule;
pub mod timing;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use content::{build_payload, DigestPayload, FilingAnalysis, FilingSnapshot, TrialReminder};
pub use delivery::{DeliveryReport, DeliveryWorker, EmailSender, OutgoingEmail};
pub use deps::PipelineDeps;
pub use enrichment::{EnrichOutcome, EnrichReport, Enricher};
pub use ingest::{Pipeline, RunReport};
pub use notify::{Notifier, NotifyReport, ReconcileReport};
pub use schedule::{processing_strategy, ProcessingStrategy};
pub use timing::scheduled_for;
