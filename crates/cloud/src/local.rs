//! Filesystem-backed storage served over HTTP by the API at `/media`.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage::{download, download_client, object_key, ObjectStorage, StoredObject};

pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
    client: reqwest::Client,
}

impl LocalStorage {
    /// Objects are written under `root` and addressed as
    /// `<public_base_url>/<folder>/<name>.<ext>`.
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, StorageError> {
        Ok(Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            client: download_client()?,
        })
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = object_key(folder, name_hint, &bytes)?;
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(key = %key, size = bytes.len(), "Stored object locally");

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
        let bytes = download(&self.client, url).await?;
        self.upload_bytes(bytes, folder, name_hint).await
    }

    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.public_base_url)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}
