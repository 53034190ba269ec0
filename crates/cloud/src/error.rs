#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Storage not configured: {0}")]
    NotConfigured(String),
}
