//! Redis VideoRepository implementation.

use super::error::RedisStoreError;
use super::pool::RedisPool;
use super::{OWNER_PREFIX, STATUS_PREFIX, VIDEO_PREFIX};
use crate::domain::video::{VideoRecord, VideoStatus};
use crate::ports::repository::{RepositoryError, VideoRepository};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands, Script};
use deadpool_redis::Connection;
use std::sync::OnceLock;

fn video_key(id: &str) -> String {
    format!("{}{}", VIDEO_PREFIX, id)
}

fn owner_key(owner_id: &str) -> String {
    format!("{}{}", OWNER_PREFIX, owner_id)
}

fn status_key(status: VideoStatus) -> String {
    format!("{}{}", STATUS_PREFIX, status.as_str())
}

// Document, owner list and status set are written together or not at all.
const SAVE_SCRIPT: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    redis.call('RPUSH', KEYS[2], ARGV[2])
    redis.call('SADD', KEYS[3], ARGV[2])
    return 1
end
return 0
";

fn save_script() -> &'static Script {
    static SCRIPT: OnceLock<Script> = OnceLock::new();
    SCRIPT.get_or_init(|| Script::new(SAVE_SCRIPT))
}

async fn load_many(
    conn: &mut Connection,
    ids: &[String],
) -> Result<Vec<VideoRecord>, RepositoryError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let keys: Vec<String> = ids.iter().map(|id| video_key(id)).collect();
    let docs: Vec<Option<String>> = conn.mget(keys).await.map_err(RedisStoreError::from)?;

    let mut records = Vec::with_capacity(docs.len());
    for doc in docs.into_iter().flatten() {
        records.push(serde_json::from_str(&doc)?);
    }
    Ok(records)
}

#[async_trait]
impl VideoRepository for RedisPool {
    async fn save(&self, record: &VideoRecord) -> Result<(), RepositoryError> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(record)?;

        let created: i64 = save_script()
            .key(video_key(&record.id))
            .key(owner_key(&record.owner_id))
            .key(status_key(record.status))
            .arg(json)
            .arg(&record.id)
            .invoke_async(&mut conn)
            .await
            .map_err(RedisStoreError::from)?;
        if created == 0 {
            return Err(RepositoryError::AlreadyExists(record.id.clone()));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<VideoRecord>, RepositoryError> {
        let mut conn = self.conn().await?;
        let json: Option<String> = conn
            .get(video_key(id))
            .await
            .map_err(RedisStoreError::from)?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn find_by_owner_id(&self, owner_id: &str) -> Result<Vec<VideoRecord>, RepositoryError> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn
            .lrange(owner_key(owner_id), 0, -1)
            .await
            .map_err(RedisStoreError::from)?;
        load_many(&mut conn, &ids).await
    }

    async fn find_by_status(
        &self,
        status: VideoStatus,
    ) -> Result<Vec<VideoRecord>, RepositoryError> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn
            .smembers(status_key(status))
            .await
            .map_err(RedisStoreError::from)?;
        let mut records = load_many(&mut conn, &ids).await?;
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    // Read-modify-write without WATCH: each record has a single writer
    // (its pipeline run, or the reconciler once the run is presumed dead).
    async fn update_status(
        &self,
        id: &str,
        status: VideoStatus,
    ) -> Result<VideoRecord, RepositoryError> {
        let mut conn = self.conn().await?;
        let key = video_key(id);
        let json: Option<String> = conn.get(&key).await.map_err(RedisStoreError::from)?;
        let mut record: VideoRecord = match json {
            Some(data) => serde_json::from_str(&data)?,
            None => return Err(RepositoryError::NotFound(id.to_string())),
        };

        let previous = record.status;
        record.transition(status)?;
        let json = serde_json::to_string(&record)?;

        let _: () = redis::pipe()
            .atomic()
            .set(&key, json)
            .ignore()
            .srem(status_key(previous), id)
            .ignore()
            .sadd(status_key(status), id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(record)
    }
}
