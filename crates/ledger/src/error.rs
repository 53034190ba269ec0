#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("User API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed user API response: {0}")]
    Decode(String),

    #[error("User API not configured: {0}")]
    NotConfigured(String),
}
