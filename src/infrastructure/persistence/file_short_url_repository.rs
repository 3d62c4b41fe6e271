//! JSON-lines file implementation of the short URL repository.
//!
//! # Record format
//!
//! One [`ShortUrl`] JSON object per line, appended in write order:
//!
//! ```text
//! {"id":"abc1","target":"https://example.com/a","ownerID":"u1","deleted":false}
//! {"id":"abc1","target":"https://example.com/a","ownerID":"u1","deleted":true}
//! ```
//!
//! The log is never rewritten in place. A soft delete appends a superseding
//! record with `deleted: true`. Readers fold the log per id: the first record
//! for an id fixes its target, owner and correlation id, and any later record
//! with `deleted: true` marks it deleted. Later records can never resurrect
//! an entry.
//!
//! Malformed lines are logged and skipped by readers but never dropped from
//! disk. [`FileShortUrlRepository::compact`] rewrites the log with one record
//! per id, followed by every unparseable line verbatim, and runs whenever the
//! file is opened.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::entities::{ShortUrl, StoreStats};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::StoreError;

/// Entries reconstructed from the log, in first-seen order.
#[derive(Default)]
struct Log {
    entries: Vec<ShortUrl>,
    positions: HashMap<String, usize>,
    /// Lines that failed to parse, without their line terminator.
    unparsed: Vec<Vec<u8>>,
}

impl Log {
    fn apply(&mut self, record: ShortUrl) {
        match self.positions.get(&record.id) {
            Some(&pos) => {
                if record.deleted {
                    self.entries[pos].deleted = true;
                }
            }
            None => {
                self.positions
                    .insert(record.id.clone(), self.entries.len());
                self.entries.push(record);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&ShortUrl> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    fn live_for_target(&self, target: &str) -> Option<&ShortUrl> {
        self.entries
            .iter()
            .find(|entry| !entry.deleted && entry.target == target)
    }
}

/// Repository backed by an append-only JSON-lines file.
///
/// A single read-write lock guards the append handle. Writers hold it
/// exclusively while they scan and append; readers hold it shared while they
/// re-open and scan the file.
///
/// Batches are not atomic: if an append fails part-way, a prefix of the batch
/// may already be on disk.
pub struct FileShortUrlRepository {
    path: PathBuf,
    file: RwLock<File>,
}

impl FileShortUrlRepository {
    /// Opens (creating if needed) the log at `path` and compacts it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened or rewritten.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = open_append(&path).await?;

        let repository = Self {
            path,
            file: RwLock::new(file),
        };
        repository.compact().await?;

        Ok(repository)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the log with exactly one record per id.
    ///
    /// The new log is written to a sibling file and renamed over the old one.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let mut file = self.file.write().await;

        let log = read_log(&self.path).await?;

        let mut buffer = Vec::new();
        for entry in &log.entries {
            encode_record(&mut buffer, entry)?;
        }
        for line in &log.unparsed {
            buffer.extend_from_slice(line);
            buffer.push(b'\n');
        }

        let tmp_path = self.path.with_file_name(format!(
            "{}.compact",
            self.path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        fs::write(&tmp_path, &buffer).await?;
        fs::rename(&tmp_path, &self.path).await?;

        *file = open_append(&self.path).await?;

        info!(
            path = %self.path.display(),
            entries = log.entries.len(),
            unparsed = log.unparsed.len(),
            "Compacted short url log"
        );

        Ok(())
    }
}

async fn open_append(path: &Path) -> Result<File, StoreError> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

fn encode_record(buffer: &mut Vec<u8>, entry: &ShortUrl) -> Result<(), StoreError> {
    serde_json::to_writer(&mut *buffer, entry)?;
    buffer.push(b'\n');
    Ok(())
}

async fn append(file: &mut File, buffer: &[u8]) -> Result<(), StoreError> {
    if buffer.is_empty() {
        return Ok(());
    }
    file.write_all(buffer).await?;
    file.flush().await?;
    Ok(())
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Re-opens the file and folds every well-formed record into a [`Log`].
async fn read_log(path: &Path) -> Result<Log, StoreError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Log::default()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut log = Log::default();
    let mut line = Vec::new();
    let mut line_number = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        line_number += 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<ShortUrl>(&line) {
            Ok(record) => log.apply(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_number,
                    error = %e,
                    "Skipping malformed short url record"
                );
                log.unparsed.push(trim_line_end(&line).to_vec());
            }
        }
    }

    Ok(log)
}

#[async_trait]
impl ShortUrlRepository for FileShortUrlRepository {
    async fn add(&self, entry: ShortUrl) -> Result<String, StoreError> {
        let mut file = self.file.write().await;
        let log = read_log(&self.path).await?;

        if let Some(existing) = log.live_for_target(&entry.target) {
            return Err(StoreError::CreateConflict {
                existing_id: existing.id.clone(),
            });
        }

        if log.contains(&entry.id) {
            return Err(StoreError::DuplicateId { id: entry.id });
        }

        let mut buffer = Vec::new();
        encode_record(&mut buffer, &entry)?;
        append(&mut file, &buffer).await?;

        Ok(entry.id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ShortUrl>, StoreError> {
        let _file = self.file.read().await;
        let log = read_log(&self.path).await?;

        Ok(log.get(id).cloned())
    }

    async fn all_by_owner(&self, owner_id: &str) -> Result<Vec<ShortUrl>, StoreError> {
        let _file = self.file.read().await;
        let log = read_log(&self.path).await?;

        Ok(log
            .entries
            .into_iter()
            .filter(|entry| entry.is_owned_by(owner_id))
            .collect())
    }

    async fn create_batch(&self, batch: Vec<ShortUrl>) -> Result<Vec<ShortUrl>, StoreError> {
        let mut file = self.file.write().await;
        let mut log = read_log(&self.path).await?;

        let mut batch_ids = HashSet::with_capacity(batch.len());
        for entry in &batch {
            if log.contains(&entry.id) || !batch_ids.insert(entry.id.as_str()) {
                return Err(StoreError::DuplicateId {
                    id: entry.id.clone(),
                });
            }
        }

        let mut buffer = Vec::new();
        let mut stored = Vec::with_capacity(batch.len());
        for entry in batch {
            if let Some(existing) = log.live_for_target(&entry.target) {
                stored.push(ShortUrl {
                    correlation_id: entry.correlation_id,
                    ..existing.clone()
                });
            } else {
                encode_record(&mut buffer, &entry)?;
                log.apply(entry.clone());
                stored.push(entry);
            }
        }

        append(&mut file, &buffer).await?;

        Ok(stored)
    }

    async fn soft_delete(&self, owner_id: &str, ids: &[String]) -> Result<(), StoreError> {
        let mut file = self.file.write().await;
        let mut log = read_log(&self.path).await?;

        let mut buffer = Vec::new();
        for id in ids {
            let Some(entry) = log.get(id) else {
                continue;
            };
            if !entry.can_be_deleted_by(owner_id) || entry.deleted {
                continue;
            }

            let mut tombstone = entry.clone();
            tombstone.deleted = true;
            encode_record(&mut buffer, &tombstone)?;
            log.apply(tombstone);
        }

        debug!(owner_id, bytes = buffer.len(), "Appending soft delete records");
        append(&mut file, &buffer).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let _file = self.file.read().await;
        let log = read_log(&self.path).await?;

        let users: HashSet<&str> = log
            .entries
            .iter()
            .filter_map(|entry| entry.owner_id.as_deref())
            .collect();

        Ok(StoreStats {
            urls: log.entries.len() as u64,
            users: users.len() as u64,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        fs::metadata(&self.path).await?;
        Ok(())
    }

    async fn close(&self) {
        let mut file = self.file.write().await;
        if let Err(e) = file.sync_all().await {
            warn!(path = %self.path.display(), error = %e, "Failed to sync short url log");
        }
    }
}
