//! Tiered digest content. The payload is built once, when the row is
//! queued, and stored as the row's snapshot; delivery renders only from it.

use chrono::{DateTime, Utc};
use docketcc_common::{DigestType, Filing, FilingEnrichment, Tier};
use docketcc_store::StoredFiling;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingAnalysis {
    pub summary: String,
    pub key_points: Vec<String>,
    pub stakeholders: Vec<String>,
    pub regulatory_impact: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingSnapshot {
    pub id: String,
    pub title: String,
    pub author: String,
    pub filing_type: String,
    pub date_received: DateTime<Utc>,
    pub filing_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<FilingAnalysis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialReminder {
    pub expires_at: DateTime<Utc>,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestPayload {
    pub docket_number: String,
    pub digest_type: DigestType,
    pub tier: Tier,
    pub filings: Vec<FilingSnapshot>,
    #[serde(default)]
    pub upgrade_prompt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_reminder: Option<TrialReminder>,
    pub generated_at: DateTime<Utc>,
}

impl DigestPayload {
    pub fn filing_ids(&self) -> Vec<String> {
        self.filings.iter().map(|f| f.id.clone()).collect()
    }
}

/// Project one filing for a tier. Free readers get metadata only; trial and
/// pro readers also get the analysis when enrichment has produced one.
pub fn snapshot(tier: Tier, filing: &Filing, enrichment: Option<&FilingEnrichment>) -> FilingSnapshot {
    let analysis = if tier.includes_analysis() {
        enrichment.map(|e| FilingAnalysis {
            summary: e.summary.clone(),
            key_points: e.key_points.clone(),
            stakeholders: e.stakeholders.clone(),
            regulatory_impact: e.regulatory_impact.clone(),
            confidence: e.confidence,
        })
    } else {
        None
    };

    FilingSnapshot {
        id: filing.id.clone(),
        title: filing.title.clone(),
        author: filing.author.clone(),
        filing_type: filing.filing_type.clone(),
        date_received: filing.date_received,
        filing_url: filing.filing_url.clone(),
        analysis,
    }
}

/// Whole days left on a trial, rounded up, never negative.
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    const DAY_SECS: i64 = 24 * 60 * 60;
    let secs = (expires_at - now).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + DAY_SECS - 1) / DAY_SECS
    }
}

/// Build the snapshot for one subscriber. `tier` is the stored tier; a trial
/// past its expiry is resolved to free here.
pub fn build_payload(
    docket_number: &str,
    digest_type: DigestType,
    tier: Tier,
    trial_expires_at: Option<DateTime<Utc>>,
    filings: &[StoredFiling],
    now: DateTime<Utc>,
) -> DigestPayload {
    let tier = tier.effective(trial_expires_at, now);

    let trial_reminder = match (tier, trial_expires_at) {
        (Tier::Trial, Some(expires_at)) => Some(TrialReminder {
            expires_at,
            days_remaining: days_remaining(expires_at, now),
        }),
        _ => None,
    };

    let filings = filings
        .iter()
        .map(|stored| snapshot(tier, &stored.to_filing(), stored.enrichment().as_ref()))
        .collect();

    DigestPayload {
        docket_number: docket_number.to_string(),
        digest_type,
        tier,
        filings,
        upgrade_prompt: tier == Tier::Free,
        trial_reminder,
        generated_at: now,
    }
}
