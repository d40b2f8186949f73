use crate::ports::storage::{ByteStream, RemoteStore, StorageError};
use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use futures::StreamExt;
use std::path::Path;
use tokio_util::io::ReaderStream;

/// S3Store implements RemoteStore for AWS S3.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let body = aws_sdk_s3::primitives::ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", key, e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/zip")
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", key, e)))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<ByteStream, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => StorageError::NotFound(key.to_string()),
                other => StorageError::DownloadFailed(format!("{}: {}", key, other)),
            })?;

        Ok(ReaderStream::new(resp.body.into_async_read()).boxed())
    }
}
