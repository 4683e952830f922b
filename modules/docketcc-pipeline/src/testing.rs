// Test mocks for the pipeline.
//
// One mock per adapter trait:
// - MockSource (FilingSource): docket -> filings, with scripted failures
// - MockExtractor (DocumentExtractor): url -> text
// - MockSummarizer (Summarizer): fixed analysis, with scripted failures
// - RecordingSender (EmailSender): captures outgoing mail
//
// Plus `filing()` and `deps()` helpers for building fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use docketcc_common::{Filing, FilingDocument, FilingEnrichment};
use docketcc_enrich::{DocumentExtractor, EnrichError, ExtractedDocument, Summarizer};
use docketcc_sources::{FilingSource, SourceError};
use serde_json::json;
use sqlx::SqlitePool;

use crate::delivery::{EmailSender, OutgoingEmail};
use crate::deps::PipelineDeps;

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Returns the filings registered for a docket; unknown dockets return an
/// empty window. Dockets marked failing return a 503. An optional delay
/// stands in for a slow upstream.
#[derive(Default)]
pub struct MockSource {
    filings: Mutex<HashMap<String, Vec<Filing>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    delay: Option<StdDuration>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_docket(self, docket_number: &str, filings: Vec<Filing>) -> Self {
        self.set_filings(docket_number, filings);
        self
    }

    pub fn failing(self, docket_number: &str) -> Self {
        self.failing.lock().unwrap().insert(docket_number.to_string());
        self
    }

    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_filings(&self, docket_number: &str, filings: Vec<Filing>) {
        self.filings
            .lock()
            .unwrap()
            .insert(docket_number.to_string(), filings);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FilingSource for MockSource {
    async fn fetch_filings(
        &self,
        docket_number: &str,
        _lookback: Duration,
    ) -> docketcc_sources::Result<Vec<Filing>> {
        self.calls.lock().unwrap().push(docket_number.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(docket_number) {
            return Err(SourceError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(self
            .filings
            .lock()
            .unwrap()
            .get(docket_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_latest(&self, docket_number: &str, count: usize) -> docketcc_sources::Result<Vec<Filing>> {
        let mut filings = self.fetch_filings(docket_number, Duration::zero()).await?;
        filings.truncate(count);
        Ok(filings)
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// URL -> text. Unregistered URLs fail.
#[derive(Default)]
pub struct MockExtractor {
    texts: HashMap<String, String>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_url(mut self, url: &str, text: &str) -> Self {
        self.texts.insert(url.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl DocumentExtractor for MockExtractor {
    async fn extract(&self, document: &FilingDocument) -> docketcc_enrich::Result<ExtractedDocument> {
        let text = self
            .texts
            .get(&document.url)
            .ok_or_else(|| EnrichError::EmptyDocument(document.filename.clone()))?;
        Ok(ExtractedDocument {
            filename: document.filename.clone(),
            url: document.url.clone(),
            chunks: vec![text.clone()],
        })
    }
}

// ---------------------------------------------------------------------------
// MockSummarizer
// ---------------------------------------------------------------------------

/// Summarizes every filing as "Summary of {title}". Filings whose id is
/// marked failing return an API error.
#[derive(Default)]
pub struct MockSummarizer {
    failing: HashSet<String>,
    seen_documents: Mutex<HashMap<String, usize>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, filing_id: &str) -> Self {
        self.failing.insert(filing_id.to_string());
        self
    }

    /// How many extracted documents the summarizer was handed per filing.
    pub fn documents_seen(&self, filing_id: &str) -> Option<usize> {
        self.seen_documents.lock().unwrap().get(filing_id).copied()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        filing: &Filing,
        documents: &[ExtractedDocument],
    ) -> docketcc_enrich::Result<FilingEnrichment> {
        self.seen_documents
            .lock()
            .unwrap()
            .insert(filing.id.clone(), documents.len());

        if self.failing.contains(&filing.id) {
            return Err(EnrichError::Api {
                service: "mock",
                status: 529,
                body: "overloaded".to_string(),
            });
        }
        Ok(FilingEnrichment {
            summary: format!("Summary of {}", filing.title),
            key_points: vec!["First point".to_string()],
            stakeholders: vec!["Carriers".to_string()],
            regulatory_impact: "Moderate".to_string(),
            confidence: 0.75,
            documents_processed: documents.len() as i64,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingSender
// ---------------------------------------------------------------------------

/// Captures sent mail. Addresses marked failing are rejected. With a delay,
/// each send takes that long before it is recorded.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: HashSet<String>,
    delay: Option<StdDuration>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&email.to) {
            anyhow::bail!("mailbox unavailable: {}", email.to);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn filing(id: &str, docket_number: &str, date_received: DateTime<Utc>) -> Filing {
    Filing {
        id: id.to_string(),
        docket_number: docket_number.to_string(),
        title: format!("Comments {id}"),
        author: "Example Filer".to_string(),
        filing_type: "COMMENT".to_string(),
        date_received,
        filing_url: format!("https://www.fcc.gov/ecfs/search/search-filings/filing/{id}"),
        documents: vec![FilingDocument {
            filename: format!("{id}.pdf"),
            url: format!("https://docs.test/{id}.pdf"),
        }],
        raw_data: json!({ "id_submission": id }),
    }
}

/// Deps wired to mocks, with no wave delay and New York time.
pub fn deps(
    pool: SqlitePool,
    source: Arc<MockSource>,
    summarizer: Option<Arc<MockSummarizer>>,
    sender: Arc<RecordingSender>,
) -> PipelineDeps {
    PipelineDeps::builder()
        .pool(pool)
        .source(source as Arc<dyn FilingSource>)
        .summarizer(summarizer.map(|s| s as Arc<dyn Summarizer>))
        .email(sender as Arc<dyn EmailSender>)
        .fetch_wave_delay(StdDuration::ZERO)
        .build()
}
