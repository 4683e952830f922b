//! Polling, storage, enrichment and notification fan-out, end to end over an
//! in-memory database and mocked adapters.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use docketcc_common::{DigestType, FilingStatus, Frequency, Tier};
use docketcc_pipeline::testing::{deps, filing, MockSource, MockSummarizer, RecordingSender};
use docketcc_pipeline::{DigestPayload, Pipeline};
use docketcc_store::{memory_pool, DocketRegistry, UserStore};
use sqlx::SqlitePool;

const DOCKET: &str = "23-108";

async fn subscribe_seeded(users: &UserStore, email: &str, docket: &str) {
    let outcome = users.subscribe(email, docket, Frequency::Daily).await.unwrap();
    users.mark_seeded(outcome.subscription().id).await.unwrap();
}

fn two_filings() -> Vec<docketcc_common::Filing> {
    vec![
        filing("A", DOCKET, Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()),
        filing("B", DOCKET, Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap()),
    ]
}

fn pipeline(pool: SqlitePool, source: Arc<MockSource>, summarizer: Option<Arc<MockSummarizer>>) -> Pipeline {
    Pipeline::new(deps(pool, source, summarizer, Arc::new(RecordingSender::new())))
}

fn payloads(rows: &[docketcc_store::QueueEntry]) -> Vec<(String, DigestPayload)> {
    rows.iter()
        .map(|row| {
            let payload: DigestPayload = serde_json::from_value(row.filing_data.0.clone()).unwrap();
            (row.user_email.clone(), payload)
        })
        .collect()
}

#[tokio::test]
async fn trigger_stores_enriches_and_queues_tiered_digests() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    users.upsert_user("pro@example.com").await.unwrap();
    users.set_tier("pro@example.com", Tier::Pro, None).await.unwrap();
    subscribe_seeded(&users, "pro@example.com", DOCKET).await;
    subscribe_seeded(&users, "free@example.com", DOCKET).await;

    let source = Arc::new(MockSource::new().on_docket(DOCKET, two_filings()));
    let summarizer = Arc::new(MockSummarizer::new());
    let pipeline = pipeline(pool, source, Some(summarizer.clone()));

    let report = pipeline.run_docket(DOCKET, 24).await.unwrap();
    assert_eq!(report.dockets_polled, 1);
    assert_eq!(report.filings_fetched, 2);
    assert_eq!(report.filings_stored, 2);
    assert_eq!(report.enrichment.completed, 2);
    assert_eq!(report.notifications_enqueued, 2);
    assert_eq!(report.seed_digests, 0);

    let stored = pipeline.filings().get("A").await.unwrap().unwrap();
    assert_eq!(stored.status, FilingStatus::Completed);
    assert_eq!(stored.summary.as_deref(), Some("Summary of Comments A"));
    assert_eq!(summarizer.documents_seen("A"), Some(0));

    let docket = pipeline.registry().get(DOCKET).await.unwrap().unwrap();
    assert_eq!(docket.error_count, 0);
    assert_eq!(docket.latest_filing_id.as_deref(), Some("B"));
    assert!(docket.last_checked.is_some());

    let rows = pipeline.queue().list_recent(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    for (email, payload) in payloads(&rows) {
        assert_eq!(payload.digest_type, DigestType::Daily);
        assert_eq!(payload.filings.len(), 2);
        match email.as_str() {
            "pro@example.com" => {
                assert_eq!(payload.tier, Tier::Pro);
                assert!(!payload.upgrade_prompt);
                assert!(payload.filings.iter().all(|f| f.analysis.is_some()));
            }
            "free@example.com" => {
                assert_eq!(payload.tier, Tier::Free);
                assert!(payload.upgrade_prompt);
                assert!(payload.filings.iter().all(|f| f.analysis.is_none()));
            }
            other => panic!("unexpected recipient {other}"),
        }
    }
    for row in &rows {
        assert!(row.scheduled_for > Utc::now());
    }
}

#[tokio::test]
async fn rerunning_a_window_is_idempotent() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    subscribe_seeded(&users, "free@example.com", DOCKET).await;

    let source = Arc::new(MockSource::new().on_docket(DOCKET, two_filings()));
    let pipeline = pipeline(pool, source.clone(), None);

    let first = pipeline.run_docket(DOCKET, 24).await.unwrap();
    assert_eq!(first.filings_stored, 2);
    assert_eq!(first.notifications_enqueued, 1);

    let second = pipeline.run_docket(DOCKET, 24).await.unwrap();
    assert_eq!(second.filings_stored, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(second.notifications_enqueued, 0);

    // One more filing lands: only it is queued.
    let mut filings = two_filings();
    filings.push(filing("C", DOCKET, Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()));
    source.set_filings(DOCKET, filings);

    let third = pipeline.run_docket(DOCKET, 24).await.unwrap();
    assert_eq!(third.filings_stored, 1);
    assert_eq!(third.notifications_enqueued, 1);

    let rows = pipeline.queue().list_recent(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].filing_ids.0, vec!["C".to_string()]);
    assert_eq!(pipeline.queue().stats().await.unwrap().pending, 2);
}

#[tokio::test]
async fn without_a_summarizer_filings_stay_pending_until_reprocessed() {
    let pool = memory_pool().await.unwrap();
    let source = Arc::new(MockSource::new().on_docket(DOCKET, two_filings()));

    let plain = pipeline(pool.clone(), source.clone(), None);
    let report = plain.run_docket(DOCKET, 24).await.unwrap();
    assert_eq!(report.enrichment.skipped, 2);
    assert_eq!(
        plain.filings().get("A").await.unwrap().unwrap().status,
        FilingStatus::Pending
    );

    let enriched = pipeline(pool, source, Some(Arc::new(MockSummarizer::new())));
    let report = enriched.reprocess_pending(10).await.unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(
        enriched.filings().get("B").await.unwrap().unwrap().status,
        FilingStatus::Completed
    );
}

#[tokio::test]
async fn failed_enrichment_still_notifies_without_analysis() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    users.upsert_user("pro@example.com").await.unwrap();
    users.set_tier("pro@example.com", Tier::Pro, None).await.unwrap();
    subscribe_seeded(&users, "pro@example.com", DOCKET).await;

    let source = Arc::new(MockSource::new().on_docket(DOCKET, two_filings()));
    let summarizer = Arc::new(MockSummarizer::new().failing_on("B"));
    let pipeline = pipeline(pool, source, Some(summarizer));

    let report = pipeline.run_docket(DOCKET, 24).await.unwrap();
    assert_eq!(report.enrichment.completed, 1);
    assert_eq!(report.enrichment.failed, 1);
    assert_eq!(report.notifications_enqueued, 1);

    assert_eq!(
        pipeline.filings().get("B").await.unwrap().unwrap().status,
        FilingStatus::Failed
    );
    assert!(!pipeline.system_log().for_filing("B").await.unwrap().is_empty());

    let rows = pipeline.queue().list_recent(10).await.unwrap();
    let (_, payload) = payloads(&rows).remove(0);
    let a = payload.filings.iter().find(|f| f.id == "A").unwrap();
    let b = payload.filings.iter().find(|f| f.id == "B").unwrap();
    assert!(a.analysis.is_some());
    assert!(b.analysis.is_none());
}

#[tokio::test]
async fn trigger_rejects_malformed_docket_numbers() {
    let pool = memory_pool().await.unwrap();
    let source = Arc::new(MockSource::new());
    let pipeline = pipeline(pool, source.clone(), None);

    assert!(pipeline.run_docket("not-a-docket", 24).await.is_err());
    assert!(source.calls().is_empty());
    assert!(pipeline.registry().list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn quiet_hours_skip_polling() {
    let pool = memory_pool().await.unwrap();
    DocketRegistry::new(pool.clone()).register_or_touch(DOCKET).await.unwrap();
    let source = Arc::new(MockSource::new().on_docket(DOCKET, two_filings()));
    let pipeline = pipeline(pool, source.clone(), None);

    // 03:00 in New York
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
    let report = pipeline.run_scheduled(now).await.unwrap();
    assert!(report.skipped);
    assert!(source.calls().is_empty());
    assert_eq!(pipeline.filings().get_stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn business_hours_poll_the_top_dockets_and_isolate_failures() {
    let pool = memory_pool().await.unwrap();
    let registry = DocketRegistry::new(pool.clone());
    let dockets = ["10-90", "11-42", "17-108", "19-195", "21-450", "23-108"];
    for docket in dockets {
        registry.register_or_touch(docket).await.unwrap();
    }
    registry.increment_subscribers("23-108").await.unwrap();

    let source = Arc::new(
        MockSource::new()
            .on_docket("23-108", two_filings())
            .failing("10-90"),
    );
    let pipeline = pipeline(pool, source.clone(), None);

    // 10:00 in New York
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
    let report = pipeline.run_scheduled(now).await.unwrap();

    let strategy = report.strategy.unwrap();
    assert_eq!(strategy.lookback_hours, 2);
    assert_eq!(strategy.batch_size, 5);

    let calls = source.calls();
    assert_eq!(calls.len(), 5);
    assert!(calls.contains(&"23-108".to_string()));
    assert!(calls.contains(&"10-90".to_string()));

    assert_eq!(report.dockets_failed, 1);
    assert_eq!(report.dockets_polled, 4);
    assert_eq!(report.filings_stored, 2);

    let failed = registry.get("10-90").await.unwrap().unwrap();
    assert_eq!(failed.error_count, 1);
    let healthy = registry.get("23-108").await.unwrap().unwrap();
    assert_eq!(healthy.error_count, 0);
    assert_eq!(healthy.last_checked, Some(now));
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn pipeline_operations_run_on_spawned_tasks() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    subscribe_seeded(&users, "a@example.com", DOCKET).await;

    let source = Arc::new(MockSource::new().on_docket(DOCKET, two_filings()));
    let pipeline = Arc::new(pipeline(pool, source, None));
    let now = Utc::now();

    assert_send(&pipeline.run_scheduled(now));
    assert_send(&pipeline.deliver(now));
    assert_send(&pipeline.reconcile(24, now));
    assert_send(&pipeline.reprocess_pending(10));

    let task = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_docket(DOCKET, 24).await }
    });
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.filings_stored, 2);
}
