//! Downloads remote input images so they can be composed or edited.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest remote image accepted (25 MiB).
pub const MAX_REMOTE_IMAGE_BYTES: usize = 25 * 1024 * 1024;

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self {
            client,
            max_bytes: MAX_REMOTE_IMAGE_BYTES,
        })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len as usize > self.max_bytes)
        {
            return Err(FetchError::TooLarge { limit: self.max_bytes });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if bytes.len() > self.max_bytes {
            return Err(FetchError::TooLarge { limit: self.max_bytes });
        }

        tracing::debug!(url, size = bytes.len(), "Fetched remote image");
        Ok(bytes.to_vec())
    }
}
