//! Short URL repository implementations.
//!
//! # Repositories
//!
//! - [`MemoryShortUrlRepository`] - `HashMap` behind a read-write lock
//! - [`FileShortUrlRepository`] - append-only JSON-lines log
//! - [`PgShortUrlRepository`] - PostgreSQL table with an atomic upsert
//!
//! [`connect`] picks one at startup from [`StorageConfig`].

pub mod file_short_url_repository;
pub mod memory_short_url_repository;
pub mod pg_short_url_repository;

pub use file_short_url_repository::FileShortUrlRepository;
pub use memory_short_url_repository::MemoryShortUrlRepository;
pub use pg_short_url_repository::PgShortUrlRepository;

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::domain::repositories::ShortUrlRepository;
use crate::error::StoreError;

/// Opens the backend described by `config`.
///
/// # Errors
///
/// Returns the backend's error if the file cannot be opened or the database
/// is unreachable.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ShortUrlRepository>, StoreError> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("Init memory storage");
            Ok(Arc::new(MemoryShortUrlRepository::new()))
        }
        StorageConfig::File { path } => {
            tracing::info!(path = %path.display(), "Init file storage");
            Ok(Arc::new(FileShortUrlRepository::open(path).await?))
        }
        StorageConfig::Postgres(db) => {
            tracing::info!("Init database storage");
            let repository = PgShortUrlRepository::connect(db).await?;
            tracing::info!("Connected to database");
            Ok(Arc::new(repository))
        }
    }
}
