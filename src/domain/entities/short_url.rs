//! Short URL entity representing one id-to-target mapping.

use serde::{Deserialize, Serialize};

/// A stored short URL mapping.
///
/// `id` and `target` never change after creation. The only mutation an entry
/// ever sees is the one-way `deleted` flip performed by a soft delete.
///
/// The serde layout is the on-disk record format of the file backend
/// (one JSON object per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrl {
    pub id: String,
    pub target: String,
    #[serde(rename = "ownerID", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(
        rename = "correlationID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl ShortUrl {
    /// Creates a live entry.
    ///
    /// An empty `owner_id` is stored as anonymous.
    pub fn new(id: String, target: String, owner_id: Option<String>) -> Self {
        Self {
            id,
            target,
            owner_id: owner_id.filter(|owner| !owner.is_empty()),
            correlation_id: None,
            deleted: false,
        }
    }

    /// Attaches a client-supplied batch correlation token.
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Returns true if the entry has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns true if `owner_id` is the recorded owner.
    ///
    /// Anonymous entries are owned by nobody, so they never match.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        !owner_id.is_empty() && self.owner_id.as_deref() == Some(owner_id)
    }

    /// Returns true if `owner_id` may soft-delete this entry.
    ///
    /// Owned entries are deletable only by their owner. Anonymous entries
    /// carry no restriction and are deletable by any identified requester.
    pub fn can_be_deleted_by(&self, owner_id: &str) -> bool {
        !owner_id.is_empty()
            && self
                .owner_id
                .as_deref()
                .is_none_or(|owner| owner == owner_id)
    }
}

/// One item of a batch create request, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortUrl {
    pub target: String,
    pub correlation_id: Option<String>,
}

impl NewShortUrl {
    pub fn new(target: impl Into<String>, correlation_id: Option<String>) -> Self {
        Self {
            target: target.into(),
            correlation_id,
        }
    }
}

/// Read-only aggregate over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of entries, live and deleted.
    pub urls: u64,
    /// Number of distinct non-anonymous owners.
    pub users: u64,
}
