use crate::domain::video::{VideoRecord, VideoStatus};
use crate::ports::repository::{RepositoryError, VideoRepository};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process `VideoRepository`. Records are kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<RwLock<Vec<VideoRecord>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VideoRepository for InMemoryRepository {
    async fn save(&self, record: &VideoRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(RepositoryError::AlreadyExists(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<VideoRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_owner_id(&self, owner_id: &str) -> Result<Vec<VideoRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_by_status(
        &self,
        status: VideoStatus,
    ) -> Result<Vec<VideoRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
    ) -> Result<VideoRecord, RepositoryError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        record.transition(status)?;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
