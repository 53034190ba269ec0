/// Errors from provider adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider reported that the job itself failed.
    #[error("Prediction {status}: {detail}")]
    PredictionFailed { status: String, detail: String },

    /// The response did not contain an image in any known shape.
    #[error("Unexpected provider output: {0}")]
    UnexpectedOutput(String),

    #[error("Failed to decode provider payload: {0}")]
    Decode(String),

    #[error("Provider timed out after {0}s")]
    Timeout(u64),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}
