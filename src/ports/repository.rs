use crate::domain::video::{TransitionError, VideoRecord, VideoStatus};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("video not found: {0}")]
    NotFound(String),

    #[error("video already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Durable store of video records keyed by id.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Persist a new record
    async fn save(&self, record: &VideoRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<VideoRecord>, RepositoryError>;

    /// All records of an owner, in insertion order
    async fn find_by_owner_id(&self, owner_id: &str) -> Result<Vec<VideoRecord>, RepositoryError>;

    async fn find_by_status(&self, status: VideoStatus)
        -> Result<Vec<VideoRecord>, RepositoryError>;

    /// Move a record to `status`, rejecting transitions out of a terminal state.
    /// Returns the updated record.
    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
    ) -> Result<VideoRecord, RepositoryError>;
}
