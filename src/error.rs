//! Error types shared across the store, the deletion pipeline and the service.

use serde_json::{Value, json};
use std::time::Duration;

/// Errors returned by [`crate::domain::repositories::ShortUrlRepository`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The target is already shortened by a live entry.
    #[error("url already shortened as {existing_id}")]
    CreateConflict { existing_id: String },

    /// The caller-chosen id is already taken by another entry.
    #[error("short id {id} is already taken")]
    DuplicateId { id: String },

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for I/O and connectivity failures the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Database(_) | Self::Timeout(_))
    }
}

/// Maps a sqlx error, turning unique violations on the id index into
/// [`StoreError::DuplicateId`].
pub fn map_sqlx_error(e: sqlx::Error, id: &str) -> StoreError {
    if let Some(db) = e.as_database_error()
        && db.is_unique_violation()
        && db.constraint() == Some("short_url_id_uindex")
    {
        return StoreError::DuplicateId { id: id.to_string() };
    }

    StoreError::Database(e)
}

/// Service-level error returned by [`crate::application::services::ShortenerService`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("short url {id} not found")]
    NotFound { id: String },

    #[error("short url {id} has been deleted")]
    Gone { id: String },

    #[error("{message}")]
    Unavailable { message: String },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
    pub fn gone(id: impl Into<String>) -> Self {
        Self::Gone { id: id.into() }
    }
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound { .. } => "not_found",
            AppError::Gone { .. } => "gone",
            AppError::Unavailable { .. } => "unavailable",
            AppError::Storage(e) if e.is_transient() => "storage_unavailable",
            AppError::Storage(_) | AppError::Internal { .. } => "internal_error",
        }
    }

    /// Structured details for the transport layer's error body.
    pub fn details(&self) -> Value {
        match self {
            AppError::Validation { details, .. } | AppError::Internal { details, .. } => {
                details.clone()
            }
            AppError::NotFound { id } | AppError::Gone { id } => json!({ "id": id }),
            AppError::Unavailable { .. } | AppError::Storage(_) => json!({}),
        }
    }
}
