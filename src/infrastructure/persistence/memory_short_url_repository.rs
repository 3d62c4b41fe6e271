//! In-process implementation of the short URL repository.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::domain::entities::{ShortUrl, StoreStats};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::StoreError;

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, ShortUrl>,
    /// Target of every live entry mapped to its id.
    live_targets: HashMap<String, String>,
}

impl Entries {
    fn insert(&mut self, entry: ShortUrl) {
        if !entry.deleted {
            self.live_targets
                .insert(entry.target.clone(), entry.id.clone());
        }
        self.by_id.insert(entry.id.clone(), entry);
    }
}

/// Repository backed by a `HashMap` behind a single read-write lock.
///
/// Writers exclude all readers; every operation is a map lookup or a single
/// pass, so the lock is never held for long. Batches are applied under one
/// write lock and are therefore all-or-nothing.
///
/// Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryShortUrlRepository {
    entries: RwLock<Entries>,
}

impl MemoryShortUrlRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShortUrlRepository for MemoryShortUrlRepository {
    async fn add(&self, entry: ShortUrl) -> Result<String, StoreError> {
        let mut entries = self.entries.write().await;

        if let Some(existing_id) = entries.live_targets.get(&entry.target) {
            return Err(StoreError::CreateConflict {
                existing_id: existing_id.clone(),
            });
        }

        if entries.by_id.contains_key(&entry.id) {
            return Err(StoreError::DuplicateId { id: entry.id });
        }

        let id = entry.id.clone();
        entries.insert(entry);

        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ShortUrl>, StoreError> {
        Ok(self.entries.read().await.by_id.get(id).cloned())
    }

    async fn all_by_owner(&self, owner_id: &str) -> Result<Vec<ShortUrl>, StoreError> {
        let entries = self.entries.read().await;

        Ok(entries
            .by_id
            .values()
            .filter(|entry| entry.is_owned_by(owner_id))
            .cloned()
            .collect())
    }

    async fn create_batch(&self, batch: Vec<ShortUrl>) -> Result<Vec<ShortUrl>, StoreError> {
        let mut entries = self.entries.write().await;

        let mut batch_ids = HashSet::with_capacity(batch.len());
        for entry in &batch {
            if entries.by_id.contains_key(&entry.id) || !batch_ids.insert(entry.id.as_str()) {
                return Err(StoreError::DuplicateId {
                    id: entry.id.clone(),
                });
            }
        }

        let mut stored = Vec::with_capacity(batch.len());
        for entry in batch {
            let existing = entries
                .live_targets
                .get(&entry.target)
                .and_then(|id| entries.by_id.get(id));

            if let Some(existing) = existing {
                stored.push(ShortUrl {
                    correlation_id: entry.correlation_id,
                    ..existing.clone()
                });
            } else {
                entries.insert(entry.clone());
                stored.push(entry);
            }
        }

        Ok(stored)
    }

    async fn soft_delete(&self, owner_id: &str, ids: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let Entries {
            by_id,
            live_targets,
        } = &mut *entries;

        for id in ids {
            let Some(entry) = by_id.get_mut(id) else {
                continue;
            };

            if !entry.can_be_deleted_by(owner_id) || entry.deleted {
                continue;
            }

            entry.deleted = true;
            if live_targets.get(&entry.target) == Some(&entry.id) {
                live_targets.remove(&entry.target);
            }
        }

        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let entries = self.entries.read().await;

        let users: HashSet<&str> = entries
            .by_id
            .values()
            .filter_map(|entry| entry.owner_id.as_deref())
            .collect();

        Ok(StoreStats {
            urls: entries.by_id.len() as u64,
            users: users.len() as u64,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {}
}
