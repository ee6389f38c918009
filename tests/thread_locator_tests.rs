mod fixtures;

use std::sync::Arc;

use discuss_pilot::config::{RetryConfig, ThreadConfig};
use discuss_pilot::error::{ApiError, DiscussError};
use discuss_pilot::identity::AgentIdentity;
use discuss_pilot::retry::{RecordingSleeper, RetryPolicy};
use discuss_pilot::thread::{ResolveOutcome, ThreadLocator, ThreadOrigin};

use fixtures::memory_thread::{MemoryThreadService, Op};

fn identity() -> AgentIdentity {
    AgentIdentity::new("node-a", "main", "acme", "widgets")
}

fn locator(service: &Arc<MemoryThreadService>) -> ThreadLocator {
    let retry = RetryPolicy::from_config(&RetryConfig::default())
        .with_sleeper(Arc::new(RecordingSleeper::new()));
    ThreadLocator::new(service.clone(), retry, ThreadConfig::default())
}

#[tokio::test]
async fn explicit_thread_is_joined_without_search() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    let id = service.add_thread("[discuss] Anything at all");

    let resolution = locator(&service)
        .resolve("Unrelated topic", Some(id), &identity())
        .await
        .unwrap();

    assert_eq!(resolution.handle.id, id);
    assert_eq!(resolution.outcome, ResolveOutcome::Explicit);
    assert_eq!(service.call_count(Op::Search), 0);
    assert_eq!(service.call_count(Op::Create), 0);
}

#[tokio::test]
async fn missing_explicit_thread_is_permanent() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));

    let err = locator(&service)
        .resolve("Cache layer", Some(42), &identity())
        .await
        .unwrap_err();

    assert!(matches!(err, DiscussError::PermanentApi(ApiError::NotFound(_))));
    assert_eq!(service.call_count(Op::Get), 1);
}

#[tokio::test]
async fn similar_open_thread_is_reused() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    service.add_thread("[discuss] Billing export format");
    let cache = service.add_thread("[discuss] Refactor query cache layer");

    let resolution = locator(&service)
        .resolve("Refactor the query cache layer", None, &identity())
        .await
        .unwrap();

    assert_eq!(resolution.handle.id, cache);
    assert_eq!(resolution.handle.created_by, ThreadOrigin::Existing);
    assert!(matches!(
        resolution.outcome,
        ResolveOutcome::Matched { similarity_pct: 100 }
    ));
    assert_eq!(service.call_count(Op::Create), 0);
}

#[tokio::test]
async fn unrelated_threads_lead_to_creation() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    service.add_thread("[discuss] Billing export format");

    let resolution = locator(&service)
        .resolve("Refactor the query cache layer", None, &identity())
        .await
        .unwrap();

    assert_eq!(resolution.outcome, ResolveOutcome::Created);
    assert_eq!(resolution.handle.created_by, ThreadOrigin::ThisAgent);
    assert_eq!(resolution.handle.title, "[discuss] Refactor the query cache layer");
    assert_eq!(service.thread_ids().len(), 2);
}

#[tokio::test]
async fn transient_search_failures_are_retried() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    let cache = service.add_thread("[discuss] Query cache layer");
    service.fail_next(Op::Search, 2, ApiError::RateLimited { retry_after_secs: Some(5) });

    let resolution = locator(&service)
        .resolve("query cache layer", None, &identity())
        .await
        .unwrap();

    assert_eq!(resolution.handle.id, cache);
    assert_eq!(service.call_count(Op::Search), 3);
}

#[tokio::test]
async fn concurrent_creation_keeps_the_older_thread() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    service.race_on_create("[discuss] Refactor the query cache layer");

    let resolution = locator(&service)
        .resolve("Refactor the query cache layer", None, &identity())
        .await
        .unwrap();

    let ids = service.thread_ids();
    assert_eq!(ids.len(), 2);
    let (older, ours) = (ids[0], ids[1]);
    assert_eq!(resolution.handle.id, older);
    assert_eq!(resolution.outcome, ResolveOutcome::Reconciled { closed: ours });
    assert!(service.is_open(older));
    assert!(!service.is_open(ours));
}

#[tokio::test]
async fn failed_duplicate_close_is_a_conflict() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    service.race_on_create("[discuss] Refactor the query cache layer");
    service.fail_close(ApiError::Unauthorized("HTTP 403".into()));

    let err = locator(&service)
        .resolve("Refactor the query cache layer", None, &identity())
        .await
        .unwrap_err();

    match err {
        DiscussError::ThreadCreationConflict {
            existing, created, ..
        } => {
            assert_eq!(existing, "1");
            assert_eq!(created, "2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn keywordless_topic_is_shared_by_exact_title() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));

    let first = locator(&service).resolve("UI", None, &identity()).await.unwrap();
    assert_eq!(first.outcome, ResolveOutcome::Created);

    let other = AgentIdentity::new("node-b", "main", "acme", "widgets");
    let second = locator(&service).resolve("ui", None, &other).await.unwrap();

    assert_eq!(second.handle.id, first.handle.id);
    assert_eq!(second.outcome, ResolveOutcome::Matched { similarity_pct: 100 });
    assert_eq!(service.thread_ids().len(), 1);
    assert!(service.call_count(Op::Search) >= 3);
}

#[tokio::test]
async fn keywordless_topic_does_not_join_longer_titles() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    service.add_thread("[discuss] UI tests");

    let resolution = locator(&service).resolve("UI", None, &identity()).await.unwrap();

    assert_eq!(resolution.outcome, ResolveOutcome::Created);
    assert_eq!(resolution.handle.title, "[discuss] UI");
    assert_eq!(service.thread_ids().len(), 2);
}

#[tokio::test]
async fn keywordless_topic_still_reconciles_duplicates() {
    let service = Arc::new(MemoryThreadService::new("agent-bot"));
    service.race_on_create("[discuss] UI");

    let resolution = locator(&service).resolve("UI", None, &identity()).await.unwrap();

    let ids = service.thread_ids();
    assert_eq!(resolution.handle.id, ids[0]);
    assert_eq!(resolution.outcome, ResolveOutcome::Reconciled { closed: ids[1] });
}
