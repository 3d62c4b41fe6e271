//! Deletion job model for asynchronous soft deletes.

/// A request to soft-delete `ids` on behalf of `owner_id`.
///
/// Created on the request path and handed to
/// [`crate::domain::delete_worker::DeletionPipeline`], which applies it in the
/// background. The request returns as soon as the job is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteJob {
    pub owner_id: String,
    pub ids: Vec<String>,
}

impl DeleteJob {
    pub fn new(owner_id: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ids,
        }
    }

    /// Returns true if there is nothing to delete.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
