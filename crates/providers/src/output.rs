//! One tagged shape for every provider result.
//!
//! Providers hand back a remote URL, a `data:` URI, an array of either, or an
//! object with a `url` field. All of these collapse into [`ProviderOutput`]
//! so the pipeline handles results uniformly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ProviderOutput {
    /// A remote (possibly short-lived) URL.
    Url(String),
    /// Encoded image bytes.
    Bytes(Vec<u8>),
}

impl ProviderOutput {
    /// Normalize a prediction `output` value. Arrays yield their first image.
    pub fn from_json(output: &Value) -> Result<Self, ProviderError> {
        match output {
            Value::String(s) => Self::from_str_value(s),
            Value::Array(items) => items
                .iter()
                .find(|item| !item.is_null())
                .ok_or_else(|| ProviderError::UnexpectedOutput("empty output array".into()))
                .and_then(Self::from_json),
            Value::Object(obj) => match obj.get("url") {
                Some(url) => Self::from_json(url),
                None => Err(ProviderError::UnexpectedOutput(format!(
                    "object without url: {}",
                    truncate(&output.to_string())
                ))),
            },
            other => Err(ProviderError::UnexpectedOutput(format!(
                "unsupported output: {}",
                truncate(&other.to_string())
            ))),
        }
    }

    fn from_str_value(s: &str) -> Result<Self, ProviderError> {
        let trimmed = s.trim();
        if let Some(rest) = trimmed.strip_prefix("data:") {
            let (_, encoded) = rest
                .split_once(";base64,")
                .ok_or_else(|| ProviderError::Decode("data URI is not base64".into()))?;
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| ProviderError::Decode(e.to_string()))?;
            return Ok(Self::Bytes(bytes));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Self::Url(trimmed.to_string()));
        }
        Err(ProviderError::UnexpectedOutput(format!(
            "string is neither a URL nor a data URI: {}",
            truncate(trimmed)
        )))
    }

    /// Decode an OpenAI-style `b64_json` field.
    pub fn from_base64(encoded: &str) -> Result<Self, ProviderError> {
        BASE64
            .decode(encoded.trim().as_bytes())
            .map(Self::Bytes)
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
