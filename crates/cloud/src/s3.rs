//! S3-backed storage. Objects must be publicly readable through
//! `public_base_url` (bucket policy or CDN in front of the bucket).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::StorageError;
use crate::storage::{download, download_client, object_key, ObjectStorage, StoredObject};

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
    http: reqwest::Client,
}

impl S3Storage {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        public_base_url: &str,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            http: download_client()?,
        })
    }

    /// Build a client from the default AWS credential chain.
    pub async fn from_env(bucket: impl Into<String>, public_base_url: &str) -> Result<Self, StorageError> {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config), bucket, public_base_url)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = object_key(folder, name_hint, &bytes)?;
        let extension = key.rsplit('.').next().unwrap_or_default();
        let content_type = modelgen_core::media::content_type_for_extension(extension);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(format!("{}: {e}", self.bucket)))?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Stored object in S3");

        Ok(StoredObject {
            url: format!("{}/{key}", self.public_base_url),
            id: key,
        })
    }

    async fn upload_from_url(
        &self,
        url: &str,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError> {
        let bytes = download(&self.http, url).await?;
        self.upload_bytes(bytes, folder, name_hint).await
    }

    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.public_base_url)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}
