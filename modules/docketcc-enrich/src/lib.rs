//! Filing enrichment: attachment text extraction and AI summarization.
//! Both sit behind traits so the pipeline can run without either service.

pub mod chunk;
pub mod claude;
pub mod error;
pub mod extract;
pub mod prompt;
pub mod summarize;

pub use chunk::chunk_text;
pub use claude::{tool_schema, ClaudeSummarizer, SummaryOutput};
pub use error::{EnrichError, Result};
pub use extract::{DocumentExtractor, ExtractedDocument, HttpExtractor};
pub use summarize::Summarizer;
