use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageError;

/// Timeout for fetching a remote object before re-uploading it.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// A durable, publicly retrievable object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub url: String,
    /// Backend identifier (object key).
    pub id: String,
}

/// Durable storage seam.
///
/// Uploads are idempotent per `(folder, name_hint)`: repeating an upload with
/// the same hint replaces the same object, a fresh hint never touches an
/// existing one. Callers pass hints from [`unique_name_hint`].
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError>;

    async fn upload_file(
        &self,
        path: &Path,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError> {
        let bytes = tokio::fs::read(path).await?;
        self.upload_bytes(bytes, folder, name_hint).await
    }

    async fn upload_from_url(
        &self,
        url: &str,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError>;

    /// `true` when `url` already points at an object in this store.
    fn owns(&self, _url: &str) -> bool {
        false
    }
}

/// `prefix_<unix millis>_<8 hex chars>`. The random suffix keeps hints
/// distinct for calls landing in the same millisecond.
pub fn unique_name_hint(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{millis}_{}", &suffix[..8])
}

/// Object key `folder/name_hint.ext` with the extension sniffed from `bytes`.
pub fn object_key(folder: &str, name_hint: &str, bytes: &[u8]) -> Result<String, StorageError> {
    check_segment(folder)?;
    check_segment(name_hint)?;
    let extension = modelgen_core::media::sniff_extension(bytes);
    Ok(format!("{folder}/{name_hint}.{extension}"))
}

fn check_segment(segment: &str) -> Result<(), StorageError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(segment.to_string()))
    }
}

/// Fetch a remote object in full.
pub(crate) async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, StorageError> {
    let failed = |reason: String| StorageError::Download {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status().as_u16())));
    }
    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    Ok(bytes.to_vec())
}

pub(crate) fn download_client() -> Result<reqwest::Client, StorageError> {
    reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| StorageError::NotConfigured(e.to_string()))
}
