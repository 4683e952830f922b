use async_trait::async_trait;
use docketcc_common::{Filing, FilingEnrichment};

use crate::error::Result;
use crate::extract::ExtractedDocument;

/// Produces the AI analysis for a filing from its metadata and whatever
/// document text could be extracted.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        filing: &Filing,
        documents: &[ExtractedDocument],
    ) -> Result<FilingEnrichment>;
}
