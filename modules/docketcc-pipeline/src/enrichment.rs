use std::sync::Arc;

use docketcc_common::{Filing, FilingStatus};
use docketcc_enrich::{DocumentExtractor, ExtractedDocument, Summarizer};
use docketcc_store::{FilingStore, LogEntry, SystemLog};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

const COMPONENT: &str = "enrichment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnrichOutcome {
    Completed,
    Failed,
    /// No summarizer configured; the filing stays pending.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl EnrichReport {
    fn record(&mut self, outcome: EnrichOutcome) {
        self.attempted += 1;
        match outcome {
            EnrichOutcome::Completed => self.completed += 1,
            EnrichOutcome::Failed => self.failed += 1,
            EnrichOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Attaches AI analysis to stored filings. A filing that can't be enriched
/// is marked failed and still gets notified, just without analysis.
pub struct Enricher {
    filings: FilingStore,
    log: SystemLog,
    extractor: Option<Arc<dyn DocumentExtractor>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    max_documents: usize,
}

impl Enricher {
    pub fn new(
        filings: FilingStore,
        log: SystemLog,
        extractor: Option<Arc<dyn DocumentExtractor>>,
        summarizer: Option<Arc<dyn Summarizer>>,
        max_documents: usize,
    ) -> Self {
        Self {
            filings,
            log,
            extractor,
            summarizer,
            max_documents,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.summarizer.is_some()
    }

    pub async fn enrich_filing(&self, filing: &Filing) -> docketcc_store::Result<EnrichOutcome> {
        let Some(summarizer) = &self.summarizer else {
            return Ok(EnrichOutcome::Skipped);
        };

        self.filings
            .update_status(&filing.id, FilingStatus::Processing, None)
            .await?;

        let documents = self.extract_documents(filing).await;

        match summarizer.summarize(filing, &documents).await {
            Ok(enrichment) => {
                self.filings
                    .update_status(&filing.id, FilingStatus::Completed, Some(&enrichment))
                    .await?;
                debug!(filing_id = %filing.id, documents = documents.len(), "Filing enriched");
                Ok(EnrichOutcome::Completed)
            }
            Err(e) => {
                warn!(filing_id = %filing.id, docket = %filing.docket_number, error = %e, "Summarization failed");
                self.filings
                    .update_status(&filing.id, FilingStatus::Failed, None)
                    .await?;
                self.log
                    .write(
                        LogEntry::error(COMPONENT, format!("Summarization failed: {e}"))
                            .with_docket(&filing.docket_number)
                            .with_filing(&filing.id)
                            .with_details(json!({ "documents": documents.len() })),
                    )
                    .await;
                Ok(EnrichOutcome::Failed)
            }
        }
    }

    /// Extract up to `max_documents` attachments. A document that fails to
    /// extract is skipped; the summary works from what remains.
    async fn extract_documents(&self, filing: &Filing) -> Vec<ExtractedDocument> {
        let Some(extractor) = &self.extractor else {
            return Vec::new();
        };

        let mut extracted = Vec::new();
        for document in filing.documents.iter().take(self.max_documents) {
            match extractor.extract(document).await {
                Ok(doc) => extracted.push(doc),
                Err(e) => {
                    warn!(
                        filing_id = %filing.id,
                        filename = %document.filename,
                        error = %e,
                        "Document extraction failed, skipping"
                    );
                }
            }
        }
        extracted
    }

    /// Enrich a batch of filings, logging rather than propagating store errors.
    pub async fn enrich_all(&self, filings: &[Filing]) -> EnrichReport {
        let mut report = EnrichReport::default();
        for filing in filings {
            match self.enrich_filing(filing).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(filing_id = %filing.id, error = %e, "Enrichment bookkeeping failed");
                    report.record(EnrichOutcome::Failed);
                }
            }
        }
        report
    }

    /// Retry filings left pending or failed by earlier runs, pending first.
    pub async fn reprocess_pending(&self, limit: i64) -> docketcc_store::Result<EnrichReport> {
        if !self.is_enabled() {
            return Ok(EnrichReport::default());
        }

        let mut candidates = self.filings.list_by_status(FilingStatus::Pending, limit).await?;
        let remaining = limit - candidates.len() as i64;
        if remaining > 0 {
            candidates.extend(
                self.filings
                    .list_by_status(FilingStatus::Failed, remaining)
                    .await?,
            );
        }

        let filings: Vec<Filing> = candidates.iter().map(|f| f.to_filing()).collect();
        let report = self.enrich_all(&filings).await;

        info!(
            attempted = report.attempted,
            completed = report.completed,
            failed = report.failed,
            "Reprocessed filings"
        );
        Ok(report)
    }
}
