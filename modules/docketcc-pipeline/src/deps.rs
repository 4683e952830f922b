use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use chrono_tz::Tz;
use docketcc_common::Config;
use docketcc_enrich::{ClaudeSummarizer, DocumentExtractor, HttpExtractor, Summarizer};
use docketcc_sources::{EcfsSource, FilingSource};
use sqlx::SqlitePool;
use tracing::info;
use typed_builder::TypedBuilder;

use crate::delivery::{EmailSender, NoopSender, ResendSender};

/// Long-lived resources shared by every pipeline invocation.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub pool: SqlitePool,
    pub source: Arc<dyn FilingSource>,
    #[builder(default)]
    pub extractor: Option<Arc<dyn DocumentExtractor>>,
    #[builder(default)]
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub email: Arc<dyn EmailSender>,
    #[builder(default = chrono_tz::America::New_York)]
    pub timezone: Tz,
    #[builder(default = 3)]
    pub fetch_concurrency: usize,
    #[builder(default = StdDuration::from_secs(1))]
    pub fetch_wave_delay: StdDuration,
    #[builder(default = 5)]
    pub seed_filing_count: i64,
    #[builder(default = 3)]
    pub max_documents: usize,
    #[builder(default = Duration::seconds(300))]
    pub queue_lease: Duration,
    #[builder(default = 50)]
    pub delivery_batch: i64,
    #[builder(default = "https://docketcc.com".to_string())]
    pub app_url: String,
}

impl PipelineDeps {
    /// Production wiring. Optional services fall back to disabled: no
    /// Anthropic key means no summaries, no email key means the no-op sender.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Self {
        let source: Arc<dyn FilingSource> = Arc::new(EcfsSource::from_config(config));

        let extractor: Option<Arc<dyn DocumentExtractor>> =
            config.extract_api_url.as_ref().map(|url| {
                Arc::new(HttpExtractor::new(
                    url.clone(),
                    config.extract_api_key.clone(),
                    config.max_document_chars,
                )) as Arc<dyn DocumentExtractor>
            });

        let summarizer: Option<Arc<dyn Summarizer>> = match &config.anthropic_api_key {
            Some(key) => Some(Arc::new(ClaudeSummarizer::new(
                key.clone(),
                config.anthropic_model.clone(),
                config.max_document_chars,
            ))),
            None => {
                info!("No ANTHROPIC_API_KEY set, AI summaries disabled");
                None
            }
        };

        let email: Arc<dyn EmailSender> = match &config.email_api_key {
            Some(key) => Arc::new(ResendSender::new(
                key.clone(),
                &config.email_api_url,
                config.email_from.clone(),
            )),
            None => {
                info!("No EMAIL_API_KEY set, email delivery disabled");
                Arc::new(NoopSender)
            }
        };

        Self::builder()
            .pool(pool)
            .source(source)
            .extractor(extractor)
            .summarizer(summarizer)
            .email(email)
            .timezone(config.timezone)
            .fetch_concurrency(config.fetch_concurrency)
            .fetch_wave_delay(StdDuration::from_millis(config.fetch_wave_delay_ms))
            .seed_filing_count(config.seed_filing_count)
            .max_documents(config.max_documents)
            .queue_lease(Duration::seconds(config.queue_lease_secs))
            .delivery_batch(config.delivery_batch)
            .app_url(config.app_url.clone())
            .build()
    }
}
