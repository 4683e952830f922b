//! Filing store dedup and partial-failure behavior against in-memory SQLite.

use chrono::{TimeZone, Utc};
use docketcc_common::{Filing, FilingDocument, FilingEnrichment, FilingStatus};
use docketcc_store::{memory_pool, FilingStore, SystemLog};
use serde_json::json;

fn filing(id: &str) -> Filing {
    Filing {
        id: id.to_string(),
        docket_number: "23-108".to_string(),
        title: format!("Comments of {id}"),
        author: "Example Carrier LLC".to_string(),
        filing_type: "COMMENT".to_string(),
        date_received: Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
        filing_url: format!("https://www.fcc.gov/ecfs/search/search-filings/filing/{id}"),
        documents: vec![FilingDocument {
            filename: format!("{id}.pdf"),
            url: format!("https://www.fcc.gov/ecfs/document/{id}/1"),
        }],
        raw_data: json!({ "id_submission": id }),
    }
}

#[tokio::test]
async fn dedup_stores_only_new_ids() {
    let pool = memory_pool().await.unwrap();
    let store = FilingStore::new(pool);

    let first = store.store_new(&[filing("A"), filing("B")]).await.unwrap();
    assert_eq!(first.stored_count, 2);
    assert_eq!(first.duplicate_count, 0);

    let second = store
        .store_new(&[filing("A"), filing("B"), filing("C")])
        .await
        .unwrap();
    assert_eq!(second.stored_count, 1);
    assert_eq!(second.duplicate_count, 2);
    assert_eq!(second.stored_ids, vec!["C".to_string()]);
}

#[tokio::test]
async fn storing_the_same_batch_twice_is_idempotent() {
    let pool = memory_pool().await.unwrap();
    let store = FilingStore::new(pool);
    let batch = vec![filing("X1"), filing("X2"), filing("X3")];

    let first = store.store_new(&batch).await.unwrap();
    assert_eq!(first.stored_count + first.duplicate_count, batch.len());

    let second = store.store_new(&batch).await.unwrap();
    assert_eq!(second.stored_count, 0);
    assert_eq!(second.stored_count + second.duplicate_count, batch.len());
    assert_eq!(store.get_stats().await.unwrap().total, 3);
}

#[tokio::test]
async fn repeated_id_within_one_batch_counts_as_duplicate() {
    let pool = memory_pool().await.unwrap();
    let store = FilingStore::new(pool);

    let outcome = store
        .store_new(&[filing("D"), filing("D")])
        .await
        .unwrap();
    assert_eq!(outcome.stored_count, 1);
    assert_eq!(outcome.duplicate_count, 1);
}

#[tokio::test]
async fn one_failed_insert_does_not_abort_the_batch() {
    let pool = memory_pool().await.unwrap();

    sqlx::query(
        r#"
        CREATE TRIGGER reject_b BEFORE INSERT ON filings
        WHEN NEW.id = 'B'
        BEGIN
            SELECT RAISE(ABORT, 'simulated storage failure');
        END
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = FilingStore::new(pool.clone());
    let outcome = store
        .store_new(&[filing("A"), filing("B"), filing("C")])
        .await
        .unwrap();

    assert_eq!(outcome.stored_count, 2);
    assert_eq!(outcome.failed, vec!["B".to_string()]);
    assert!(store.get("A").await.unwrap().is_some());
    assert!(store.get("B").await.unwrap().is_none());
    assert!(store.get("C").await.unwrap().is_some());

    let logged = SystemLog::new(pool).for_filing("B").await.unwrap();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].message.contains("simulated storage failure"));
}

#[tokio::test]
async fn update_status_attaches_enrichment() {
    let pool = memory_pool().await.unwrap();
    let store = FilingStore::new(pool);
    store.store_new(&[filing("E")]).await.unwrap();

    let stored = store.get("E").await.unwrap().unwrap();
    assert_eq!(stored.status, FilingStatus::Pending);
    assert!(stored.enrichment().is_none());
    assert_eq!(stored.documents.0.len(), 1);

    let enrichment = FilingEnrichment {
        summary: "Carrier opposes the proposed reporting rule.".to_string(),
        key_points: vec!["Cost burden".to_string(), "Timeline too short".to_string()],
        stakeholders: vec!["Rural carriers".to_string()],
        regulatory_impact: "Could delay implementation.".to_string(),
        confidence: 0.82,
        documents_processed: 1,
    };
    store
        .update_status("E", FilingStatus::Completed, Some(&enrichment))
        .await
        .unwrap();

    let updated = store.get("E").await.unwrap().unwrap();
    assert_eq!(updated.status, FilingStatus::Completed);
    assert_eq!(updated.enrichment(), Some(enrichment));
    assert!(updated.processed_at.is_some());
}

#[tokio::test]
async fn update_status_on_unknown_filing_is_not_found() {
    let pool = memory_pool().await.unwrap();
    let store = FilingStore::new(pool);
    assert!(store
        .update_status("missing", FilingStatus::Failed, None)
        .await
        .is_err());
}

#[tokio::test]
async fn recent_and_stats() {
    let pool = memory_pool().await.unwrap();
    let store = FilingStore::new(pool);

    let mut older = filing("OLD");
    older.date_received = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let mut other_docket = filing("OTHER");
    other_docket.docket_number = "11-42".to_string();
    store
        .store_new(&[older, filing("NEW"), other_docket])
        .await
        .unwrap();
    store
        .update_status("NEW", FilingStatus::Failed, None)
        .await
        .unwrap();

    let recent = store.get_recent("23-108", 10).await.unwrap();
    let ids: Vec<_> = recent.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["NEW", "OLD"]);

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.recent_24h, 3);
    let failed = stats
        .by_status
        .iter()
        .find(|s| s.status == FilingStatus::Failed)
        .unwrap();
    assert_eq!(failed.count, 1);

    let pending = store.list_by_status(FilingStatus::Pending, 10).await.unwrap();
    assert_eq!(pending.len(), 2);
}
