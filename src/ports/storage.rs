use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::path::Path;
use std::pin::Pin;

/// Streamed object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload a file from a local path to storage under `key`
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StorageError>;

    /// Stream the object stored under `key`
    async fn download(&self, key: &str) -> Result<ByteStream, StorageError>;
}
