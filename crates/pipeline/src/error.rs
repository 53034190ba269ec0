use modelgen_cloud::StorageError;
use modelgen_core::composition::CompositionError;
use modelgen_core::error::CoreError;
use modelgen_core::generation::{FailureKind, GenerationFailure, GenerationKind};
use modelgen_providers::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Anything that ends a generation in `FAILED`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error("Input image {index} could not be fetched: {source}")]
    Fetch {
        index: usize,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Unexpected panic: {0}")]
    Panic(String),
}

impl PipelineError {
    /// Structured failure recorded on a generation of the given route.
    ///
    /// Routes without a composition step report input loading failures as
    /// [`FailureKind::Input`].
    pub fn to_failure_for(&self, route: GenerationKind) -> GenerationFailure {
        let mut failure = self.to_failure();
        if matches!(self, Self::Fetch { .. }) && !route.composes() {
            failure.kind = FailureKind::Input;
        }
        failure
    }

    /// Structured failure recorded on the generation.
    pub fn to_failure(&self) -> GenerationFailure {
        let (kind, message, input_index) = match self {
            Self::Composition(e) => (
                FailureKind::Composition,
                "Image composition failed",
                e.input_index(),
            ),
            Self::Fetch { index, .. } => (
                FailureKind::Composition,
                "Failed to load input image",
                Some(*index),
            ),
            Self::Provider(_) => (FailureKind::Provider, "AI provider request failed", None),
            // Unexpected failures are handled like provider failures.
            Self::Panic(_) => (FailureKind::Provider, "Unexpected error during generation", None),
            Self::Storage(_) => (FailureKind::Storage, "Failed to store image", None),
            Self::Io(_) | Self::Core(_) => (FailureKind::Internal, "Internal pipeline error", None),
        };
        GenerationFailure {
            kind,
            message: message.to_string(),
            details: self.to_string(),
            input_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_failure_keeps_input_index() {
        let err = PipelineError::from(CompositionError::Undecodable {
            index: 1,
            reason: "bad header".into(),
        });
        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::Composition);
        assert_eq!(failure.input_index, Some(1));
        assert!(failure.details.contains("bad header"));
    }

    #[test]
    fn fetch_failure_kind_follows_route() {
        let err = PipelineError::Fetch {
            index: 0,
            source: FetchError::Status(404),
        };
        let composed = err.to_failure_for(GenerationKind::ComposeGenerate);
        assert_eq!(composed.kind, FailureKind::Composition);
        assert_eq!(composed.input_index, Some(0));

        let edited = err.to_failure_for(GenerationKind::DirectEdit);
        assert_eq!(edited.kind, FailureKind::Input);
        assert_eq!(edited.message, "Failed to load input image");
        assert_eq!(edited.input_index, Some(0));
    }

    #[test]
    fn panic_is_provider_equivalent() {
        let failure = PipelineError::Panic("boom".into()).to_failure();
        assert_eq!(failure.kind, FailureKind::Provider);
        assert_eq!(failure.details, "Unexpected panic: boom");
    }
}
