#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use url_store::application::services::ShortenerService;
use url_store::domain::delete_worker::DeletionPipeline;
use url_store::domain::repositories::ShortUrlRepository;
use url_store::infrastructure::persistence::{FileShortUrlRepository, MemoryShortUrlRepository};

pub const SHORT_ID_LENGTH: usize = 8;
pub const OWNER_ID_LENGTH: usize = 16;

pub fn service_over(repository: Arc<dyn ShortUrlRepository>) -> ShortenerService {
    let pipeline = DeletionPipeline::start(repository.clone(), 4, 1024);
    ShortenerService::new(repository, pipeline, SHORT_ID_LENGTH, OWNER_ID_LENGTH)
}

pub fn memory_service() -> (ShortenerService, Arc<dyn ShortUrlRepository>) {
    let repository: Arc<dyn ShortUrlRepository> = Arc::new(MemoryShortUrlRepository::new());
    (service_over(repository.clone()), repository)
}

pub async fn file_service(path: &Path) -> (ShortenerService, Arc<dyn ShortUrlRepository>) {
    let repository: Arc<dyn ShortUrlRepository> =
        Arc::new(FileShortUrlRepository::open(path).await.unwrap());
    (service_over(repository.clone()), repository)
}

/// Polls until `id` reads back as deleted, for pipelines that are still running.
pub async fn wait_until_deleted(repository: &Arc<dyn ShortUrlRepository>, id: &str) -> bool {
    for _ in 0..200 {
        if let Some(entry) = repository.get_by_id(id).await.unwrap()
            && entry.deleted
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
