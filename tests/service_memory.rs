mod common;

use std::collections::HashSet;
use std::sync::Arc;

use url_store::domain::entities::NewShortUrl;
use url_store::error::AppError;

#[tokio::test]
async fn test_create_same_target_twice_returns_same_id() {
    let (service, repository) = common::memory_service();

    let first = service.create("u1", "https://example.com/a").await.unwrap();
    let second = service.create("u1", "https://example.com/a").await.unwrap();

    assert!(first.is_new());
    assert!(!second.is_new());
    assert_eq!(first.entry().id, second.entry().id);
    assert_eq!(repository.stats().await.unwrap().urls, 1);
}

#[tokio::test]
async fn test_create_same_target_from_other_owner_returns_existing_id() {
    let (service, _) = common::memory_service();

    let first = service.create("u1", "https://example.com/a").await.unwrap();
    let second = service.create("u2", "https://example.com/a").await.unwrap();

    assert_eq!(first.entry().id, second.entry().id);
    assert_eq!(second.entry().owner_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_create_batch_assigns_distinct_resolvable_ids() {
    let (service, _) = common::memory_service();

    let stored = service
        .create_batch(
            "u1",
            vec![
                NewShortUrl::new("https://x", Some("1".to_string())),
                NewShortUrl::new("https://y", Some("2".to_string())),
            ],
        )
        .await
        .unwrap();

    assert_eq!(stored.len(), 2);
    assert_ne!(stored[0].id, stored[1].id);

    for entry in &stored {
        let target = service.redirect_target(&entry.id).await.unwrap();
        assert_eq!(target, entry.target);
    }
}

#[tokio::test]
async fn test_create_batch_reuses_existing_ids() {
    let (service, repository) = common::memory_service();
    let existing = service.create("u1", "https://x").await.unwrap().into_entry();

    let stored = service
        .create_batch(
            "u1",
            vec![
                NewShortUrl::new("https://x", None),
                NewShortUrl::new("https://y", None),
                NewShortUrl::new("https://y", None),
            ],
        )
        .await
        .unwrap();

    assert_eq!(stored[0].id, existing.id);
    assert_eq!(stored[1].id, stored[2].id);
    assert_eq!(repository.stats().await.unwrap().urls, 2);
}

#[tokio::test]
async fn test_delete_then_resolve_reports_gone() {
    let (service, _) = common::memory_service();
    let entry = service
        .create("u1", "https://example.com/a")
        .await
        .unwrap()
        .into_entry();

    service
        .request_delete("u1", vec![entry.id.clone()])
        .unwrap();
    service.shutdown().await;

    let resolved = service.resolve(&entry.id).await.unwrap().unwrap();
    assert!(resolved.deleted);
    assert!(matches!(
        service.redirect_target(&entry.id).await.unwrap_err(),
        AppError::Gone { .. }
    ));
}

#[tokio::test]
async fn test_resolve_missing_is_distinct_from_deleted() {
    let (service, _) = common::memory_service();

    assert!(service.resolve("doesnotexist").await.unwrap().is_none());
    assert!(matches!(
        service.redirect_target("doesnotexist").await.unwrap_err(),
        AppError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_delete_by_other_owner_is_ignored() {
    let (service, repository) = common::memory_service();
    let entry = service
        .create("owner-b", "https://example.com/b")
        .await
        .unwrap()
        .into_entry();

    assert!(
        service
            .request_delete("owner-a", vec![entry.id.clone()])
            .is_ok()
    );
    service.shutdown().await;

    let stored = repository.get_by_id(&entry.id).await.unwrap().unwrap();
    assert!(!stored.deleted);
}

#[tokio::test]
async fn test_deleted_target_can_be_shortened_again() {
    let (service, repository) = common::memory_service();
    let entry = service
        .create("u1", "https://example.com/a")
        .await
        .unwrap()
        .into_entry();

    service
        .request_delete("u1", vec![entry.id.clone()])
        .unwrap();
    assert!(common::wait_until_deleted(&repository, &entry.id).await);

    let again = service.create("u1", "https://example.com/a").await.unwrap();
    assert!(again.is_new());
    assert_ne!(again.entry().id, entry.id);
}

#[tokio::test]
async fn test_list_by_owner_includes_deleted_entries() {
    let (service, repository) = common::memory_service();
    let kept = service.create("u1", "https://a").await.unwrap().into_entry();
    let removed = service.create("u1", "https://b").await.unwrap().into_entry();
    service.create("u2", "https://c").await.unwrap();

    service
        .request_delete("u1", vec![removed.id.clone()])
        .unwrap();
    assert!(common::wait_until_deleted(&repository, &removed.id).await);

    let listed = service.list_by_owner("u1").await.unwrap();
    let ids: HashSet<_> = listed.iter().map(|e| e.id.as_str()).collect();

    assert_eq!(listed.len(), 2);
    assert!(ids.contains(kept.id.as_str()));
    assert!(ids.contains(removed.id.as_str()));
}

#[tokio::test]
async fn test_stats_counts_distinct_owners() {
    let (service, _) = common::memory_service();
    service.create("u1", "https://a").await.unwrap();
    service.create("u1", "https://b").await.unwrap();
    service.create("u2", "https://c").await.unwrap();

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.urls, 3);
    assert_eq!(stats.users, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes_all_applied_after_shutdown() {
    let (service, repository) = common::memory_service();
    let service = Arc::new(service);

    let mut ids = Vec::new();
    for i in 0..100 {
        let entry = service
            .create("u1", &format!("https://example.com/{i}"))
            .await
            .unwrap()
            .into_entry();
        ids.push(entry.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let service = service.clone();
            tokio::spawn(async move { service.request_delete("u1", vec![id]) })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    service.shutdown().await;

    for id in &ids {
        assert!(repository.get_by_id(id).await.unwrap().unwrap().deleted);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_of_same_target_store_one_entry() {
    let (service, repository) = common::memory_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create("u1", "https://example.com/same").await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap().into_entry().id);
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(repository.stats().await.unwrap().urls, 1);
}
