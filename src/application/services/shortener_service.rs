//! Short URL creation, resolution and deletion service.

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::domain::delete_worker::DeletionPipeline;
use crate::domain::entities::{NewShortUrl, ShortUrl, StoreStats};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::{AppError, StoreError};
use crate::utils::id_generator::generate_id;
use crate::utils::url_validator::validate_url;

/// Attempts at finding an unused id before giving up.
const MAX_ID_ATTEMPTS: usize = 10;

/// Result of a single create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new entry was stored.
    Created(ShortUrl),
    /// The target was already shortened; this is the existing entry.
    Existing(ShortUrl),
}

impl CreateOutcome {
    pub fn entry(&self) -> &ShortUrl {
        match self {
            CreateOutcome::Created(entry) | CreateOutcome::Existing(entry) => entry,
        }
    }

    pub fn into_entry(self) -> ShortUrl {
        match self {
            CreateOutcome::Created(entry) | CreateOutcome::Existing(entry) => entry,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Facade the transport layer talks to.
///
/// Combines the store, the deletion pipeline and the id generator. Owner ids
/// arrive already authenticated; an empty owner id means anonymous.
pub struct ShortenerService {
    repository: Arc<dyn ShortUrlRepository>,
    pipeline: DeletionPipeline,
    short_id_length: usize,
    owner_id_length: usize,
}

impl ShortenerService {
    /// Creates a new shortener service.
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        pipeline: DeletionPipeline,
        short_id_length: usize,
        owner_id_length: usize,
    ) -> Self {
        Self {
            repository,
            pipeline,
            short_id_length,
            owner_id_length,
        }
    }

    /// Creates the service and starts its deletion pipeline from `config`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_config(repository: Arc<dyn ShortUrlRepository>, config: &Config) -> Self {
        let pipeline = DeletionPipeline::start(
            repository.clone(),
            config.delete_workers,
            config.delete_queue_capacity,
        );

        Self::new(
            repository,
            pipeline,
            config.short_id_length,
            config.owner_id_length,
        )
    }

    /// Generates an owner id for a caller that has none yet.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the random source fails.
    pub fn new_owner_id(&self) -> Result<String, AppError> {
        self.new_id(self.owner_id_length)
    }

    fn new_id(&self, length: usize) -> Result<String, AppError> {
        generate_id(length).map_err(|e| {
            AppError::internal(
                "Failed to generate identifier",
                json!({ "reason": e.to_string() }),
            )
        })
    }

    /// Shortens `url` for `owner_id`.
    ///
    /// # Deduplication
    ///
    /// If a live entry already has exactly this target, no new entry is
    /// stored and [`CreateOutcome::Existing`] carries the existing one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the URL is not an absolute HTTP(S) URL.
    /// Returns [`AppError::Storage`] on storage failures.
    /// Returns [`AppError::Internal`] if no free id is found after 10 attempts.
    pub async fn create(&self, owner_id: &str, url: &str) -> Result<CreateOutcome, AppError> {
        validate_url(url).map_err(|e| {
            AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
        })?;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.new_id(self.short_id_length)?;
            let entry = ShortUrl::new(id, url.to_string(), Some(owner_id.to_string()));

            match self.repository.add(entry.clone()).await {
                Ok(_) => return Ok(CreateOutcome::Created(entry)),
                Err(StoreError::CreateConflict { existing_id }) => {
                    let existing = match self.repository.get_by_id(&existing_id).await? {
                        Some(existing) => existing,
                        None => ShortUrl {
                            id: existing_id,
                            ..entry
                        },
                    };
                    return Ok(CreateOutcome::Existing(existing));
                }
                Err(StoreError::DuplicateId { id }) => {
                    warn!(attempt, id, "Short id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::internal(
            "Failed to generate unique id",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    /// Shortens a list of URLs in one store call.
    ///
    /// Every item gets a distinct fresh id. Items whose target is already
    /// shortened come back as the stored entry, with its id and owner.
    /// Correlation ids are passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if any URL is invalid; nothing is stored.
    /// Returns [`AppError::Storage`] on storage failures.
    pub async fn create_batch(
        &self,
        owner_id: &str,
        items: Vec<NewShortUrl>,
    ) -> Result<Vec<ShortUrl>, AppError> {
        for (index, item) in items.iter().enumerate() {
            validate_url(&item.target).map_err(|e| {
                AppError::bad_request(
                    "Invalid URL format",
                    json!({
                        "index": index,
                        "correlation_id": item.correlation_id,
                        "reason": e.to_string(),
                    }),
                )
            })?;
        }

        if items.is_empty() {
            return Ok(Vec::new());
        }

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let ids = self.distinct_ids(items.len())?;
            let batch = items
                .iter()
                .zip(ids)
                .map(|(item, id)| {
                    ShortUrl::new(id, item.target.clone(), Some(owner_id.to_string()))
                        .with_correlation_id(item.correlation_id.clone())
                })
                .collect();

            match self.repository.create_batch(batch).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::DuplicateId { id }) => {
                    warn!(attempt, id, "Short id collision in batch, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::internal(
            "Failed to generate unique ids",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    fn distinct_ids(&self, count: usize) -> Result<Vec<String>, AppError> {
        let mut seen = HashSet::with_capacity(count);
        let mut ids = Vec::with_capacity(count);

        while ids.len() < count {
            let id = self.new_id(self.short_id_length)?;
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }

        Ok(ids)
    }

    /// Looks up an entry, deleted or not.
    ///
    /// `Ok(None)` means the id never existed.
    pub async fn resolve(&self, id: &str) -> Result<Option<ShortUrl>, AppError> {
        Ok(self.repository.get_by_id(id).await?)
    }

    /// Returns the redirect target for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the id never existed and
    /// [`AppError::Gone`] if it was deleted.
    pub async fn redirect_target(&self, id: &str) -> Result<String, AppError> {
        match self.resolve(id).await? {
            None => Err(AppError::not_found(id)),
            Some(entry) if entry.is_deleted() => Err(AppError::gone(id)),
            Some(entry) => Ok(entry.target),
        }
    }

    /// Lists every entry of `owner_id`, including deleted ones.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortUrl>, AppError> {
        if owner_id.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repository.all_by_owner(owner_id).await?)
    }

    /// Queues a soft delete of `ids` for `owner_id` and returns immediately.
    ///
    /// Ids owned by someone else are ignored when the job runs. Anonymous
    /// entries can be deleted by any identified owner.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] if the queue is full or shutting down.
    pub fn request_delete(&self, owner_id: &str, ids: Vec<String>) -> Result<(), AppError> {
        self.pipeline
            .submit(owner_id, ids)
            .map_err(|e| AppError::unavailable(e.to_string()))
    }

    /// Counts entries and distinct owners.
    pub async fn stats(&self) -> Result<StoreStats, AppError> {
        Ok(self.repository.stats().await?)
    }

    /// Checks that the store answers.
    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.repository.ping().await?)
    }

    /// Drains the deletion pipeline, then closes the store.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
        self.repository.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockShortUrlRepository;
    use std::time::Duration;

    fn service_with(mock: MockShortUrlRepository) -> ShortenerService {
        let repository: Arc<dyn ShortUrlRepository> = Arc::new(mock);
        let pipeline = DeletionPipeline::start(repository.clone(), 1, 8);
        ShortenerService::new(repository, pipeline, 8, 16)
    }

    fn stored(id: &str, target: &str, owner: &str, deleted: bool) -> ShortUrl {
        ShortUrl {
            deleted,
            ..ShortUrl::new(id.to_string(), target.to_string(), Some(owner.to_string()))
        }
    }

    #[tokio::test]
    async fn test_create_success() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_add()
            .withf(|entry| {
                entry.target == "https://example.com/a"
                    && entry.owner_id.as_deref() == Some("u1")
                    && entry.id.len() == 8
                    && !entry.deleted
            })
            .times(1)
            .returning(|entry| Ok(entry.id));

        let service = service_with(mock);
        let outcome = service.create("u1", "https://example.com/a").await.unwrap();

        assert!(outcome.is_new());
        assert_eq!(outcome.entry().target, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_create_conflict_returns_existing_entry() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_add().times(1).returning(|_| {
            Err(StoreError::CreateConflict {
                existing_id: "abc1".to_string(),
            })
        });
        mock.expect_get_by_id()
            .withf(|id| id == "abc1")
            .times(1)
            .returning(|_| Ok(Some(stored("abc1", "https://example.com/a", "u1", false))));

        let service = service_with(mock);
        let outcome = service.create("u1", "https://example.com/a").await.unwrap();

        assert!(!outcome.is_new());
        assert_eq!(outcome.into_entry().id, "abc1");
    }

    #[tokio::test]
    async fn test_create_invalid_url() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_add().times(0);

        let service = service_with(mock);
        let result = service.create("u1", "not-a-url").await;

        assert!(matches!(result.unwrap_err(), AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_retries_on_id_collision() {
        let mut mock = MockShortUrlRepository::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_add()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|entry| Err(StoreError::DuplicateId { id: entry.id }));
        mock.expect_add()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|entry| Ok(entry.id));

        let service = service_with(mock);
        let outcome = service.create("u1", "https://example.com/a").await.unwrap();

        assert!(outcome.is_new());
    }

    #[tokio::test]
    async fn test_create_gives_up_after_repeated_collisions() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_add()
            .times(MAX_ID_ATTEMPTS)
            .returning(|entry| Err(StoreError::DuplicateId { id: entry.id }));

        let service = service_with(mock);
        let result = service.create("u1", "https://example.com/a").await;

        assert!(matches!(result.unwrap_err(), AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_create_surfaces_transient_errors() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_add()
            .times(1)
            .returning(|_| Err(StoreError::Timeout(Duration::from_secs(5))));

        let service = service_with(mock);
        let err = service
            .create("u1", "https://example.com/a")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(StoreError::Timeout(_))));
        assert_eq!(err.code(), "storage_unavailable");
    }

    #[tokio::test]
    async fn test_create_batch_assigns_distinct_ids() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_create_batch()
            .withf(|batch| {
                let ids: HashSet<&str> = batch.iter().map(|e| e.id.as_str()).collect();
                batch.len() == 2
                    && ids.len() == 2
                    && batch[0].correlation_id.as_deref() == Some("c1")
                    && batch[1].target == "https://y"
            })
            .times(1)
            .returning(|batch| Ok(batch));

        let service = service_with(mock);
        let stored = service
            .create_batch(
                "u1",
                vec![
                    NewShortUrl::new("https://x", Some("c1".to_string())),
                    NewShortUrl::new("https://y", Some("c2".to_string())),
                ],
            )
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_ne!(stored[0].id, stored[1].id);
        assert_eq!(stored[1].correlation_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_create_batch_rejects_invalid_item() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_create_batch().times(0);

        let service = service_with(mock);
        let err = service
            .create_batch(
                "u1",
                vec![
                    NewShortUrl::new("https://x", None),
                    NewShortUrl::new("ftp://y", Some("c2".to_string())),
                ],
            )
            .await
            .unwrap_err();

        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details["index"], 1);
                assert_eq!(details["correlation_id"], "c2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_batch_empty_is_noop() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_create_batch().times(0);

        let service = service_with(mock);
        assert!(service.create_batch("u1", Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_target_distinguishes_missing_and_deleted() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_get_by_id()
            .withf(|id| id == "live")
            .returning(|_| Ok(Some(stored("live", "https://x", "u1", false))));
        mock.expect_get_by_id()
            .withf(|id| id == "gone")
            .returning(|_| Ok(Some(stored("gone", "https://y", "u1", true))));
        mock.expect_get_by_id()
            .withf(|id| id == "doesnotexist")
            .returning(|_| Ok(None));

        let service = service_with(mock);

        assert_eq!(service.redirect_target("live").await.unwrap(), "https://x");
        assert!(matches!(
            service.redirect_target("gone").await.unwrap_err(),
            AppError::Gone { .. }
        ));
        assert!(matches!(
            service.redirect_target("doesnotexist").await.unwrap_err(),
            AppError::NotFound { .. }
        ));

        let resolved = service.resolve("gone").await.unwrap().unwrap();
        assert!(resolved.deleted);
    }

    #[tokio::test]
    async fn test_list_by_anonymous_owner_skips_store() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_all_by_owner().times(0);

        let service = service_with(mock);
        assert!(service.list_by_owner("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_delete_after_shutdown_is_unavailable() {
        let mut mock = MockShortUrlRepository::new();
        mock.expect_close().times(1).returning(|| ());

        let service = service_with(mock);
        service.shutdown().await;

        let err = service
            .request_delete("u1", vec!["abc1".to_string()])
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_new_owner_id_length() {
        let service = service_with(MockShortUrlRepository::new());

        let owner = service.new_owner_id().unwrap();
        assert_eq!(owner.len(), 16);
        assert_ne!(owner, service.new_owner_id().unwrap());
    }
}
