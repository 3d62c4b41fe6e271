//! PostgreSQL implementation of the short URL repository.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::domain::entities::{ShortUrl, StoreStats};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::{StoreError, map_sqlx_error};

/// Inserts a row, or on a live-target conflict returns the id and owner
/// already stored for that target. Comparing the returned id with the one we sent tells the
/// two cases apart in one atomic statement.
const UPSERT_SQL: &str = r#"
    INSERT INTO short_url (id, url, user_id, correlation_id)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (url) WHERE NOT deleted
    DO UPDATE SET url = EXCLUDED.url
    RETURNING id, user_id
"#;

#[derive(sqlx::FromRow)]
struct ShortUrlRow {
    id: String,
    url: String,
    user_id: Option<String>,
    correlation_id: Option<String>,
    deleted: bool,
}

impl From<ShortUrlRow> for ShortUrl {
    fn from(row: ShortUrlRow) -> Self {
        Self {
            id: row.id,
            target: row.url,
            owner_id: row.user_id,
            correlation_id: row.correlation_id,
            deleted: row.deleted,
        }
    }
}

/// PostgreSQL repository for short URLs.
///
/// Uniqueness of live targets is enforced by a partial unique index, so
/// deduplication holds under concurrent writers. Every statement runs under
/// `query_timeout` so a stalled database cannot hang the caller.
pub struct PgShortUrlRepository {
    pool: Arc<PgPool>,
    query_timeout: Duration,
    ping_timeout: Duration,
}

impl PgShortUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>, query_timeout: Duration, ping_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
            ping_timeout,
        }
    }

    /// Connects a pool, checks it with a ping and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection or a migration fails,
    /// and [`StoreError::Timeout`] if the initial ping does not answer in time.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await?;

        let repository = Self::new(Arc::new(pool), config.query_timeout, config.ping_timeout);
        repository.ping().await?;

        sqlx::migrate!("./migrations")
            .run(repository.pool.as_ref())
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;

        Ok(repository)
    }

    async fn bounded<T, F>(&self, limit: Duration, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }
}

#[async_trait]
impl ShortUrlRepository for PgShortUrlRepository {
    async fn add(&self, entry: ShortUrl) -> Result<String, StoreError> {
        let (stored_id, _) = self
            .bounded(self.query_timeout, async {
                sqlx::query_as::<_, (String, Option<String>)>(UPSERT_SQL)
                    .bind(&entry.id)
                    .bind(&entry.target)
                    .bind(&entry.owner_id)
                    .bind(&entry.correlation_id)
                    .fetch_one(self.pool.as_ref())
                    .await
                    .map_err(|e| map_sqlx_error(e, &entry.id))
            })
            .await?;

        if stored_id != entry.id {
            return Err(StoreError::CreateConflict {
                existing_id: stored_id,
            });
        }

        Ok(stored_id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ShortUrl>, StoreError> {
        let row = self
            .bounded(self.query_timeout, async {
                Ok::<_, StoreError>(sqlx::query_as::<_, ShortUrlRow>(
                    r#"
                    SELECT id, url, user_id, correlation_id, deleted
                    FROM short_url
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?)
            })
            .await?;

        Ok(row.map(ShortUrl::from))
    }

    async fn all_by_owner(&self, owner_id: &str) -> Result<Vec<ShortUrl>, StoreError> {
        if owner_id.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .bounded(self.query_timeout, async {
                Ok::<_, StoreError>(sqlx::query_as::<_, ShortUrlRow>(
                    r#"
                    SELECT id, url, user_id, correlation_id, deleted
                    FROM short_url
                    WHERE user_id = $1
                    "#,
                )
                .bind(owner_id)
                .fetch_all(self.pool.as_ref())
                .await?)
            })
            .await?;

        Ok(rows.into_iter().map(ShortUrl::from).collect())
    }

    async fn create_batch(&self, batch: Vec<ShortUrl>) -> Result<Vec<ShortUrl>, StoreError> {
        self.bounded(self.query_timeout, async {
            let mut tx = self.pool.begin().await?;
            let mut stored = Vec::with_capacity(batch.len());

            for mut entry in batch {
                let (stored_id, stored_owner) =
                    sqlx::query_as::<_, (String, Option<String>)>(UPSERT_SQL)
                        .bind(&entry.id)
                        .bind(&entry.target)
                        .bind(&entry.owner_id)
                        .bind(&entry.correlation_id)
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error(e, &entry.id))?;

                if stored_id != entry.id {
                    entry.id = stored_id;
                    entry.owner_id = stored_owner;
                }
                stored.push(entry);
            }

            tx.commit().await?;
            Ok::<_, StoreError>(stored)
        })
        .await
    }

    async fn soft_delete(&self, owner_id: &str, ids: &[String]) -> Result<(), StoreError> {
        if owner_id.is_empty() || ids.is_empty() {
            return Ok(());
        }

        let result = self
            .bounded(self.query_timeout, async {
                Ok::<_, StoreError>(sqlx::query(
                    r#"
                    UPDATE short_url
                    SET deleted = TRUE
                    WHERE (user_id = $1 OR user_id IS NULL) AND id = ANY($2) AND NOT deleted
                    "#,
                )
                .bind(owner_id)
                .bind(ids)
                .execute(self.pool.as_ref())
                .await?)
            })
            .await?;

        tracing::debug!(
            owner_id,
            requested = ids.len(),
            deleted = result.rows_affected(),
            "Soft delete applied"
        );

        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (urls, users) = self
            .bounded(self.query_timeout, async {
                Ok::<_, StoreError>(sqlx::query_as::<_, (i64, i64)>(
                    "SELECT COUNT(*), COUNT(DISTINCT user_id) FROM short_url",
                )
                .fetch_one(self.pool.as_ref())
                .await?)
            })
            .await?;

        Ok(StoreStats {
            urls: u64::try_from(urls).unwrap_or_default(),
            users: u64::try_from(users).unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(self.ping_timeout, async {
            sqlx::query("SELECT 1")
                .execute(self.pool.as_ref())
                .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn close(&self) {
        tracing::info!("Closing database connection pool");
        self.pool.close().await;
    }
}
