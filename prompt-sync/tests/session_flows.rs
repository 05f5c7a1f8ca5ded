use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prompt_cache::{LocalCache, MemoryCache};
use prompt_primitives::{Collection, Prompt, PromptDraft, PromptId};
use prompt_remote::client::{DocumentLocation, RemoteStoreClient};
use prompt_remote::memory::InMemoryDocumentService;
use prompt_remote::retry::RetryPolicy;
use prompt_remote::traits::{DocumentService, RemoteError, StaticCredentials};
use prompt_sync::{
    ChangeKind, InjectionOutcome, PropagationOutcome, RefreshOutcome, SyncErrorKind, SyncNotice,
    SyncSession, SyncState, TextInjector,
};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::TryRecvError;

const CONTAINER: &str = "PromptManager";
const DOCUMENT: &str = "prompts.json";

fn prompt(id: i64, name: &str) -> Prompt {
    Prompt::create(PromptId::from_millis(id), PromptDraft::new(name, format!("{name} body")))
        .unwrap()
}

fn ids(collection: &Collection) -> Vec<i64> {
    collection.iter().map(|p| p.id().as_millis()).collect()
}

fn remote_client(service: &Arc<InMemoryDocumentService>) -> Arc<RemoteStoreClient> {
    Arc::new(
        RemoteStoreClient::new(
            Arc::clone(service) as Arc<dyn DocumentService>,
            Arc::new(StaticCredentials::new("token")),
            DocumentLocation::new(CONTAINER, DOCUMENT).unwrap(),
        )
        .with_retry_policy(RetryPolicy::new(
            NonZeroU32::new(2).unwrap(),
            Duration::from_millis(1),
        )),
    )
}

async fn seed_remote(service: &InMemoryDocumentService, prompts: Vec<Prompt>) {
    let body = serde_json::to_vec(&Collection::from(prompts)).unwrap();
    service.put_document(CONTAINER, DOCUMENT, body).await;
}

async fn remote_ids(service: &InMemoryDocumentService) -> Vec<i64> {
    let body = service.document_body(CONTAINER, DOCUMENT).await.unwrap();
    let collection: Collection = serde_json::from_slice(&body).unwrap();
    ids(&collection)
}

fn session(service: &Arc<InMemoryDocumentService>, cache: &Arc<MemoryCache>) -> SyncSession {
    SyncSession::builder()
        .cache(Arc::clone(cache) as Arc<dyn LocalCache>)
        .remote(remote_client(service))
        .build()
        .unwrap()
}

#[derive(Default)]
struct RecordingInjector {
    inserted: Mutex<Vec<String>>,
}

#[async_trait]
impl TextInjector for RecordingInjector {
    async fn insert(&self, text: &str) -> InjectionOutcome {
        self.inserted.lock().await.push(text.to_owned());
        InjectionOutcome::delivered("recording")
    }
}

#[tokio::test]
async fn cold_start_adopts_remote_collection() {
    let service = Arc::new(InMemoryDocumentService::new());
    seed_remote(&service, vec![prompt(3, "c"), prompt(1, "a")]).await;
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);

    assert_eq!(session.start().await.unwrap(), SyncState::ReadyMerged);
    assert_eq!(ids(&session.prompts().await), [3, 1]);
    assert_eq!(ids(cache.read().await.unwrap().prompts()), [3, 1]);
}

#[tokio::test]
async fn first_run_creates_remote_document() {
    let service = Arc::new(InMemoryDocumentService::new());
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);

    assert_eq!(session.start().await.unwrap(), SyncState::ReadyMerged);
    assert!(session.prompts().await.is_empty());
    assert_eq!(service.container_count().await, 1);
    assert_eq!(remote_ids(&service).await, Vec::<i64>::new());
}

#[tokio::test]
async fn warm_start_shows_cache_then_merges_remote_wins() {
    let service = Arc::new(InMemoryDocumentService::new());
    seed_remote(&service, vec![prompt(3, "remote-only"), prompt(2, "remote")]).await;
    let cache = Arc::new(MemoryCache::seeded(
        Collection::from(vec![prompt(2, "local"), prompt(1, "local-only")]),
        Some(1),
    ));
    let session = session(&service, &cache);
    let mut notices = session.subscribe();

    session.start().await.unwrap();

    assert_eq!(notices.recv().await.unwrap(), SyncNotice::Loaded { prompts: 2 });
    assert_eq!(
        notices.recv().await.unwrap(),
        SyncNotice::Synced {
            changed: true,
            prompts: 3
        }
    );
    let prompts = session.prompts().await;
    assert_eq!(ids(&prompts), [3, 2, 1]);
    assert_eq!(prompts.get(PromptId::from_millis(2)).unwrap().name(), "remote");
    assert_eq!(cache.read().await.unwrap().prompts(), &prompts);
}

#[tokio::test]
async fn unchanged_merge_skips_cache_write() {
    let service = Arc::new(InMemoryDocumentService::new());
    let shared = vec![prompt(2, "b"), prompt(1, "a")];
    seed_remote(&service, shared.clone()).await;
    let cache = Arc::new(MemoryCache::seeded(Collection::from(shared), Some(42)));
    let session = session(&service, &cache);

    session.start().await.unwrap();
    assert_eq!(session.refresh().await.unwrap(), RefreshOutcome::Unchanged);
    assert_eq!(cache.read().await.unwrap().last_sync(), Some(42));
}

#[tokio::test]
async fn create_is_local_first_and_propagates() {
    let service = Arc::new(InMemoryDocumentService::new());
    seed_remote(&service, vec![prompt(1, "existing")]).await;
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);
    session.start().await.unwrap();

    let created = session
        .create(PromptDraft::new("  Greeting ", "Hello there").with_tags(["a", " ", "b"]))
        .await
        .unwrap();
    let id = created.prompt().id();
    assert_eq!(created.prompt().name(), "Greeting");
    assert_eq!(created.prompt().tags(), ["a", "b"]);
    assert_eq!(ids(&session.prompts().await)[0], id.as_millis());
    assert!(cache.read().await.unwrap().prompts().contains(id));

    assert_eq!(created.propagated().await, PropagationOutcome::Written);
    assert_eq!(remote_ids(&service).await, [id.as_millis(), 1]);
}

#[tokio::test]
async fn create_survives_remote_failure() {
    let service = Arc::new(InMemoryDocumentService::new());
    let cache = Arc::new(MemoryCache::seeded(
        Collection::from(vec![prompt(1, "existing")]),
        None,
    ));
    let session = session(&service, &cache);
    session.start().await.unwrap();
    let mut notices = session.subscribe();

    service
        .fail_next(
            10,
            RemoteError::Status {
                status: 503,
                reason: "unavailable".into(),
            },
        )
        .await;
    let created = session.create(PromptDraft::new("n", "t")).await.unwrap();
    let id = created.prompt().id();
    let outcome = created.propagated().await;
    service.clear_failures().await;

    assert!(matches!(
        outcome,
        PropagationOutcome::Failed {
            kind: SyncErrorKind::Transport,
            ..
        }
    ));
    assert_eq!(ids(&session.prompts().await), [id.as_millis(), 1]);
    assert_eq!(ids(cache.read().await.unwrap().prompts()), [id.as_millis(), 1]);
    assert!(matches!(
        notices.recv().await.unwrap(),
        SyncNotice::RemoteWriteFailed {
            change: ChangeKind::Create,
            kind: SyncErrorKind::Transport,
            ..
        }
    ));

    // Local-only entries survive the next merge.
    session.refresh().await.unwrap();
    assert_eq!(ids(&session.prompts().await), [id.as_millis(), 1]);
}

#[tokio::test]
async fn consecutive_creates_get_distinct_ids() {
    let service = Arc::new(InMemoryDocumentService::new());
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);
    session.start().await.unwrap();

    let first = session.create(PromptDraft::new("one", "1")).await.unwrap();
    let second = session.create(PromptDraft::new("two", "2")).await.unwrap();
    assert!(second.prompt().id() > first.prompt().id());

    first.propagated().await;
    second.propagated().await;
    assert_eq!(remote_ids(&service).await.len(), 2);
}

#[tokio::test]
async fn delete_propagates_and_skips_absent_remote_entries() {
    let service = Arc::new(InMemoryDocumentService::new());
    seed_remote(&service, vec![prompt(2, "shared")]).await;
    let cache = Arc::new(MemoryCache::seeded(
        Collection::from(vec![prompt(5, "local-only")]),
        None,
    ));
    let session = session(&service, &cache);
    session.start().await.unwrap();
    assert_eq!(ids(&session.prompts().await), [5, 2]);

    let removed = session.delete(PromptId::from_millis(2)).await.unwrap();
    assert_eq!(removed.prompt().name(), "shared");
    assert_eq!(removed.propagated().await, PropagationOutcome::Written);
    assert!(remote_ids(&service).await.is_empty());

    let writes = service.write_count().await;
    let removed = session.delete(PromptId::from_millis(5)).await.unwrap();
    assert_eq!(removed.propagated().await, PropagationOutcome::Unchanged);
    assert_eq!(service.write_count().await, writes);
    assert!(session.prompts().await.is_empty());
}

#[tokio::test]
async fn deleting_unknown_prompt_is_not_found() {
    let service = Arc::new(InMemoryDocumentService::new());
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);
    session.start().await.unwrap();

    let err = session.delete(PromptId::from_millis(9)).await.unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Usage);
}

#[tokio::test]
async fn overlapping_refreshes_collapse_to_one_fetch() {
    let service = Arc::new(InMemoryDocumentService::new().with_latency(Duration::from_millis(30)));
    seed_remote(&service, vec![prompt(1, "a")]).await;
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);
    session.start().await.unwrap();

    let reads = service.read_count().await;
    let (first, second) = tokio::join!(session.refresh(), session.refresh());
    let mut outcomes = [first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| *outcome == RefreshOutcome::Collapsed);

    assert_eq!(outcomes, [RefreshOutcome::Unchanged, RefreshOutcome::Collapsed]);
    assert_eq!(service.read_count().await, reads + 1);
}

#[tokio::test]
async fn decode_failure_keeps_cache_and_degrades() {
    let service = Arc::new(InMemoryDocumentService::new());
    service.put_document(CONTAINER, DOCUMENT, "not json").await;
    let cached = Collection::from(vec![prompt(1, "cached")]);
    let cache = Arc::new(MemoryCache::seeded(cached.clone(), Some(7)));
    let session = session(&service, &cache);
    let mut notices = session.subscribe();

    assert_eq!(session.start().await.unwrap(), SyncState::Degraded);
    assert_eq!(session.prompts().await, cached);
    assert_eq!(cache.read().await.unwrap().last_sync(), Some(7));

    assert!(matches!(notices.recv().await.unwrap(), SyncNotice::Loaded { .. }));
    assert!(matches!(
        notices.recv().await.unwrap(),
        SyncNotice::SyncFailed {
            kind: SyncErrorKind::Decode,
            state: SyncState::Degraded,
            ..
        }
    ));

    let err = session.refresh().await.unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Decode);
}

#[tokio::test]
async fn cold_start_failure_is_hard_then_recovers() {
    let service = Arc::new(InMemoryDocumentService::new());
    service.fail_next(10, RemoteError::transport("offline")).await;
    let cache = Arc::new(MemoryCache::new());
    let session = session(&service, &cache);

    assert_eq!(session.start().await.unwrap(), SyncState::Failed);

    service.clear_failures().await;
    seed_remote(&service, vec![prompt(4, "d")]).await;
    assert_eq!(session.refresh().await.unwrap(), RefreshOutcome::Updated);
    assert_eq!(session.state().await, SyncState::ReadyMerged);
}

#[tokio::test]
async fn credential_failure_is_classified() {
    struct Denied;

    #[async_trait]
    impl prompt_remote::traits::CredentialProvider for Denied {
        async fn token(&self) -> prompt_remote::traits::RemoteResult<prompt_remote::traits::BearerToken> {
            Err(RemoteError::credential("consent revoked"))
        }
    }

    let service = Arc::new(InMemoryDocumentService::new());
    let remote = RemoteStoreClient::new(
        Arc::clone(&service) as Arc<dyn DocumentService>,
        Arc::new(Denied),
        DocumentLocation::new(CONTAINER, DOCUMENT).unwrap(),
    );
    let session = SyncSession::builder()
        .cache(Arc::new(MemoryCache::seeded(
            Collection::from(vec![prompt(1, "a")]),
            None,
        )))
        .remote(Arc::new(remote))
        .build()
        .unwrap();

    session.load_cache().await.unwrap();
    let err = session.refresh().await.unwrap_err();
    assert_eq!(err.kind(), SyncErrorKind::Credential);
    assert_eq!(session.state().await, SyncState::Degraded);
}

#[tokio::test]
async fn insert_hands_text_to_injector() {
    let service = Arc::new(InMemoryDocumentService::new());
    let cache = Arc::new(MemoryCache::seeded(
        Collection::from(vec![prompt(1, "greeting")]),
        None,
    ));
    let injector = Arc::new(RecordingInjector::default());
    let session = SyncSession::builder()
        .cache(Arc::clone(&cache) as Arc<dyn LocalCache>)
        .remote(remote_client(&service))
        .injector(Arc::clone(&injector) as Arc<dyn TextInjector>)
        .build()
        .unwrap();
    session.start().await.unwrap();

    let outcome = session.insert(PromptId::from_millis(1)).await.unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.method(), "recording");

    session.queue_insert(PromptId::from_millis(1)).await.unwrap();
    assert!(session.deliver_pending_insert().await.unwrap().is_some());
    assert!(session.deliver_pending_insert().await.unwrap().is_none());

    assert_eq!(
        *injector.inserted.lock().await,
        ["greeting body", "greeting body"]
    );
}

#[tokio::test]
async fn periodic_sync_is_quiet_and_stops_after_close() {
    let service = Arc::new(InMemoryDocumentService::new());
    seed_remote(&service, vec![prompt(1, "a")]).await;
    let cache = Arc::new(MemoryCache::new());
    let session = SyncSession::builder()
        .cache(Arc::clone(&cache) as Arc<dyn LocalCache>)
        .remote(remote_client(&service))
        .sync_interval(Duration::from_millis(20))
        .check_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    session.start().await.unwrap();
    let mut notices = session.subscribe();

    let periodic = session.start_periodic_sync().await.unwrap();
    let reads = service.read_count().await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(service.read_count().await > reads);
    assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));

    seed_remote(&service, vec![prompt(2, "b"), prompt(1, "a")]).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(ids(&session.prompts().await), [2, 1]);
    assert!(matches!(
        notices.try_recv(),
        Ok(SyncNotice::Synced { changed: true, .. })
    ));

    session.close();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(!periodic.is_running());
    let reads = service.read_count().await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(service.read_count().await, reads);
}

#[tokio::test]
async fn periodic_sync_failures_are_silent() {
    let service = Arc::new(InMemoryDocumentService::new());
    seed_remote(&service, vec![prompt(1, "a")]).await;
    let cache = Arc::new(MemoryCache::seeded(
        Collection::from(vec![prompt(1, "a")]),
        None,
    ));
    let session = SyncSession::builder()
        .cache(Arc::clone(&cache) as Arc<dyn LocalCache>)
        .remote(remote_client(&service))
        .sync_interval(Duration::from_millis(20))
        .check_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    assert_eq!(session.start().await.unwrap(), SyncState::ReadyMerged);
    let mut notices = session.subscribe();

    service
        .fail_next(10_000, RemoteError::transport("offline"))
        .await;
    let periodic = session.start_periodic_sync().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.state().await, SyncState::Degraded);
    assert_eq!(ids(&session.prompts().await), [1]);
    assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));

    periodic.stop().await;
    session.close();
}

#[tokio::test]
async fn dropping_periodic_handle_stops_worker() {
    let service = Arc::new(InMemoryDocumentService::new());
    let cache = Arc::new(MemoryCache::new());
    let session = SyncSession::builder()
        .cache(Arc::clone(&cache) as Arc<dyn LocalCache>)
        .remote(remote_client(&service))
        .sync_interval(Duration::from_millis(10))
        .check_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    session.start().await.unwrap();

    drop(session.start_periodic_sync().await.unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let reads = service.read_count().await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(service.read_count().await, reads);
}
