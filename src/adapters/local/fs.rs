use crate::ports::storage::{ByteStream, RemoteStore, StorageError};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

/// `RemoteStore` backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let key_path = Path::new(key);
        let valid = !key.is_empty()
            && key_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.root.join(key_path))
    }
}

#[async_trait]
impl RemoteStore for FsStore {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let key_path = self
            .object_path(key)
            .map_err(|_| StorageError::UploadFailed(format!("invalid key: {}", key)))?;
        if let Some(parent) = key_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // copy next to the target, then rename, so readers never see a partial object
        let partial = key_path.with_extension("partial");
        tokio::fs::copy(local_path, &partial)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", key, e)))?;
        tokio::fs::rename(&partial, &key_path).await?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<ByteStream, StorageError> {
        let key_path = self.object_path(key)?;
        let file = match tokio::fs::File::open(&key_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::DownloadFailed(format!("{}: {}", key, e))),
        };
        Ok(ReaderStream::new(file).boxed())
    }
}
