//! Provider seams used by the pipeline.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::output::ProviderOutput;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Text-and-image generation from one durable source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub instruction: String,
    /// Publicly reachable URL of the source image (usually the composition).
    pub source_image_url: String,
    pub quality: String,
    pub background: String,
    pub aspect_ratio: String,
}

/// An encoded image passed inline to an edit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub instruction: String,
    pub images: Vec<InputImage>,
    pub input_fidelity: String,
    /// `WIDTHxHEIGHT`, e.g. `1024x1536`.
    pub size: String,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ProviderOutput, ProviderError>;
}

/// Edits return encoded image bytes directly.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn edit(&self, request: &EditRequest) -> Result<Vec<u8>, ProviderError>;
}

/// Transfers the face in `identity_source_url` onto `target_image_url`.
#[async_trait]
pub trait FaceSwapper: Send + Sync {
    async fn swap(
        &self,
        identity_source_url: &str,
        target_image_url: &str,
    ) -> Result<ProviderOutput, ProviderError>;
}
