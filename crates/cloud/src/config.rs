use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StorageError;
use crate::local::LocalStorage;
use crate::s3::S3Storage;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local { dir: PathBuf },
    S3 { bucket: String },
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Base URL stored objects are publicly served from.
    pub public_base_url: String,
}

impl StorageConfig {
    /// Load from the environment.
    ///
    /// | Env Var               | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `STORAGE_BACKEND`     | `local` (`local` or `s3`)        |
    /// | `LOCAL_STORAGE_DIR`   | `./media`                        |
    /// | `PUBLIC_BASE_URL`     | `http://localhost:3000/media`    |
    /// | `S3_BUCKET`           | required for `s3`                |
    /// | `S3_PUBLIC_BASE_URL`  | required for `s3`                |
    pub fn from_env() -> Result<Self, StorageError> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into());
        match backend.as_str() {
            "local" => Ok(Self {
                backend: StorageBackend::Local {
                    dir: std::env::var("LOCAL_STORAGE_DIR")
                        .unwrap_or_else(|_| "./media".into())
                        .into(),
                },
                public_base_url: std::env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/media".into()),
            }),
            "s3" => {
                let bucket = required("S3_BUCKET")?;
                let public_base_url = required("S3_PUBLIC_BASE_URL")?;
                Ok(Self {
                    backend: StorageBackend::S3 { bucket },
                    public_base_url,
                })
            }
            other => Err(StorageError::NotConfigured(format!(
                "unknown STORAGE_BACKEND '{other}' (expected 'local' or 's3')"
            ))),
        }
    }

    /// Directory to serve at `/media`, when the backend is local.
    pub fn local_dir(&self) -> Option<&PathBuf> {
        match &self.backend {
            StorageBackend::Local { dir } => Some(dir),
            StorageBackend::S3 { .. } => None,
        }
    }
}

fn required(var: &str) -> Result<String, StorageError> {
    std::env::var(var).map_err(|_| StorageError::NotConfigured(format!("{var} is not set")))
}

/// Construct the configured backend.
pub async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, StorageError> {
    match &config.backend {
        StorageBackend::Local { dir } => {
            tokio::fs::create_dir_all(dir).await?;
            tracing::info!(dir = %dir.display(), "Using local object storage");
            Ok(Arc::new(LocalStorage::new(dir.clone(), &config.public_base_url)?))
        }
        StorageBackend::S3 { bucket } => {
            tracing::info!(bucket = %bucket, "Using S3 object storage");
            Ok(Arc::new(S3Storage::from_env(bucket.clone(), &config.public_base_url).await?))
        }
    }
}
