//! Users, tiers and the free-tier subscription rule.

use chrono::{Duration, Utc};
use docketcc_common::{Frequency, Tier};
use docketcc_store::{memory_pool, DocketRegistry, SubscribeOutcome, UserStore};

#[tokio::test]
async fn emails_are_case_insensitive() {
    let users = UserStore::new(memory_pool().await.unwrap());

    let first = users.upsert_user("  Analyst@Example.com ").await.unwrap();
    let second = users.upsert_user("analyst@example.COM").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.email, "analyst@example.com");
    assert_eq!(first.tier, Tier::Free);

    assert!(users.upsert_user("not an email").await.is_err());
}

#[tokio::test]
async fn free_user_keeps_a_single_subscription() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    let registry = DocketRegistry::new(pool);

    users.subscribe("free@example.com", "23-108", Frequency::Daily).await.unwrap();
    let outcome = users
        .subscribe("free@example.com", "11-42", Frequency::Daily)
        .await
        .unwrap();

    match &outcome {
        SubscribeOutcome::Created { replaced, .. } => assert_eq!(replaced, &vec!["23-108".to_string()]),
        other => panic!("expected a new subscription, got {other:?}"),
    }

    let user = users.find_user("free@example.com").await.unwrap().unwrap();
    let subs = users.subscriptions_for_user(user.id).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].docket_number, "11-42");

    assert_eq!(registry.get("23-108").await.unwrap().unwrap().subscriber_count, 0);
    assert_eq!(registry.get("11-42").await.unwrap().unwrap().subscriber_count, 1);
}

#[tokio::test]
async fn free_users_are_held_to_daily() {
    let users = UserStore::new(memory_pool().await.unwrap());
    let outcome = users
        .subscribe("free@example.com", "23-108", Frequency::Immediate)
        .await
        .unwrap();
    assert_eq!(outcome.subscription().frequency, Frequency::Daily);
    assert!(outcome.subscription().needs_seed);
}

#[tokio::test]
async fn pro_user_may_hold_many_subscriptions() {
    let users = UserStore::new(memory_pool().await.unwrap());
    users.upsert_user("pro@example.com").await.unwrap();
    users.set_tier("pro@example.com", Tier::Pro, None).await.unwrap();

    users.subscribe("pro@example.com", "23-108", Frequency::Immediate).await.unwrap();
    users.subscribe("pro@example.com", "11-42", Frequency::Weekly).await.unwrap();

    let user = users.find_user("pro@example.com").await.unwrap().unwrap();
    let subs = users.subscriptions_for_user(user.id).await.unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].frequency, Frequency::Immediate);
    assert_eq!(subs[1].frequency, Frequency::Weekly);
}

#[tokio::test]
async fn resubscribing_to_the_same_docket_is_a_no_op() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    let registry = DocketRegistry::new(pool);

    let first = users.subscribe("a@example.com", "23-108", Frequency::Daily).await.unwrap();
    let second = users.subscribe("a@example.com", "23-108", Frequency::Daily).await.unwrap();

    assert!(matches!(second, SubscribeOutcome::Existing { .. }));
    assert_eq!(first.subscription().id, second.subscription().id);
    assert_eq!(registry.get("23-108").await.unwrap().unwrap().subscriber_count, 1);
}

#[tokio::test]
async fn invalid_docket_is_rejected_before_any_write() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());

    assert!(users.subscribe("a@example.com", "2023-108", Frequency::Daily).await.is_err());
    assert!(users.find_user("a@example.com").await.unwrap().is_none());
    assert!(DocketRegistry::new(pool).list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribe_decrements_count() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    let registry = DocketRegistry::new(pool);

    users.subscribe("a@example.com", "23-108", Frequency::Daily).await.unwrap();
    assert!(users.unsubscribe("a@example.com", "23-108").await.unwrap());
    assert!(!users.unsubscribe("a@example.com", "23-108").await.unwrap());
    assert!(!users.unsubscribe("nobody@example.com", "23-108").await.unwrap());

    assert_eq!(registry.get("23-108").await.unwrap().unwrap().subscriber_count, 0);
    assert!(users.subscribers_for_docket("23-108").await.unwrap().is_empty());
}

#[tokio::test]
async fn lapsed_trials_resolve_to_free() {
    let users = UserStore::new(memory_pool().await.unwrap());
    let now = Utc::now();

    let trial = users.start_trial("trial@example.com", 14, now).await.unwrap();
    assert_eq!(trial.tier, Tier::Trial);
    assert_eq!(trial.effective_tier(now), Tier::Trial);
    assert_eq!(trial.effective_tier(now + Duration::days(15)), Tier::Free);

    assert_eq!(users.expire_trials(now).await.unwrap(), 0);
    assert_eq!(users.expire_trials(now + Duration::days(15)).await.unwrap(), 1);
    let user = users.find_user("trial@example.com").await.unwrap().unwrap();
    assert_eq!(user.tier, Tier::Free);
}

#[tokio::test]
async fn lapsed_trial_keeps_only_its_oldest_subscription() {
    let pool = memory_pool().await.unwrap();
    let users = UserStore::new(pool.clone());
    let registry = DocketRegistry::new(pool);
    let now = Utc::now();

    users.start_trial("trial@example.com", 14, now).await.unwrap();
    users.subscribe("trial@example.com", "23-108", Frequency::Weekly).await.unwrap();
    users.subscribe("trial@example.com", "11-42", Frequency::Immediate).await.unwrap();

    assert_eq!(users.expire_trials(now + Duration::days(15)).await.unwrap(), 1);

    let user = users.find_user("trial@example.com").await.unwrap().unwrap();
    let subs = users.subscriptions_for_user(user.id).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].docket_number, "23-108");
    assert_eq!(subs[0].frequency, Frequency::Daily);

    assert_eq!(registry.get("23-108").await.unwrap().unwrap().subscriber_count, 1);
    assert_eq!(registry.get("11-42").await.unwrap().unwrap().subscriber_count, 0);
}

#[tokio::test]
async fn seed_flag_lifecycle() {
    let users = UserStore::new(memory_pool().await.unwrap());
    let outcome = users.subscribe("a@example.com", "23-108", Frequency::Daily).await.unwrap();
    let id = outcome.subscription().id;

    let needing = users.subscribers_needing_seed().await.unwrap();
    assert_eq!(needing.len(), 1);
    assert_eq!(needing[0].subscription_id, id);
    assert_eq!(needing[0].email, "a@example.com");

    users.mark_seeded(id).await.unwrap();
    assert!(users.subscribers_needing_seed().await.unwrap().is_empty());

    let at = Utc::now();
    users.touch_last_notified("a@example.com", "23-108", at).await.unwrap();
    let sub = users.subscriber(id).await.unwrap().unwrap();
    assert_eq!(sub.last_notified, Some(at));
}
