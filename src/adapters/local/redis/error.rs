//! Redis error types for the local adapter.

use crate::ports::repository::RepositoryError;
use deadpool_redis::CreatePoolError;

pub type RedisError = deadpool_redis::redis::RedisError;
pub type PoolError = deadpool_redis::PoolError;

#[derive(Debug, thiserror::Error)]
pub enum RedisStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Create pool error: {0}")]
    CreatePool(String),
}

impl From<CreatePoolError> for RedisStoreError {
    fn from(err: CreatePoolError) -> Self {
        RedisStoreError::CreatePool(format!("{}", err))
    }
}

impl From<RedisStoreError> for RepositoryError {
    fn from(err: RedisStoreError) -> Self {
        RepositoryError::Backend(err.to_string())
    }
}
