//! Repository trait for short URL persistence.

use crate::domain::entities::{ShortUrl, StoreStats};
use crate::error::StoreError;
use async_trait::async_trait;

/// Storage contract shared by the memory, file and PostgreSQL backends.
///
/// All access to a backend's underlying map, file or connection pool goes
/// through this trait; implementations do their own locking.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryShortUrlRepository`] - in-process map
/// - [`crate::infrastructure::persistence::FileShortUrlRepository`] - JSON-lines log file
/// - [`crate::infrastructure::persistence::PgShortUrlRepository`] - PostgreSQL table
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Inserts a new entry whose id was chosen by the caller.
    ///
    /// Returns the caller's id on success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CreateConflict`] carrying the existing id if a live
    /// entry already has the same target. Nothing is written in that case.
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is already taken.
    async fn add(&self, entry: ShortUrl) -> Result<String, StoreError>;

    /// Looks up an entry by id.
    ///
    /// Deleted entries are returned too; `Ok(None)` means the id never existed.
    async fn get_by_id(&self, id: &str) -> Result<Option<ShortUrl>, StoreError>;

    /// Returns every entry, live and deleted, recorded for `owner_id`.
    ///
    /// Order is unspecified.
    async fn all_by_owner(&self, owner_id: &str) -> Result<Vec<ShortUrl>, StoreError>;

    /// Persists a batch of entries and returns what was stored.
    ///
    /// An item whose target is already shortened by a live entry (or by an
    /// earlier item of the same batch) is not stored again; the returned item
    /// carries the existing id instead.
    ///
    /// Atomicity depends on the backend: PostgreSQL runs the batch in a single
    /// transaction, the memory backend applies it under one lock, the file
    /// backend may leave a prefix of the batch on disk if an append fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if an id is already taken, before
    /// anything is written.
    async fn create_batch(&self, entries: Vec<ShortUrl>) -> Result<Vec<ShortUrl>, StoreError>;

    /// Marks the given ids as deleted where `owner_id` is the recorded owner.
    ///
    /// Unknown ids and ids owned by someone else are skipped without error.
    /// Deleting an already deleted entry is a no-op.
    async fn soft_delete(&self, owner_id: &str, ids: &[String]) -> Result<(), StoreError>;

    /// Counts entries and distinct owners.
    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Liveness check. Must return promptly and must not mutate state.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Releases the backend's resources.
    async fn close(&self);
}
