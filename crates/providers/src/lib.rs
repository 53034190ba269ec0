//! AI provider adapters.
//!
//! The pipeline talks to providers only through the [`ImageGenerator`],
//! [`ImageEditor`] and [`FaceSwapper`] traits. Whatever shape a provider
//! returns is normalized here into a [`ProviderOutput`].

pub mod adapters;
pub mod error;
pub mod openai;
pub mod output;
pub mod replicate;

pub use adapters::{EditRequest, FaceSwapper, GenerationRequest, ImageEditor, ImageGenerator, InputImage};
pub use error::ProviderError;
pub use openai::{OpenAiConfig, OpenAiImageEditor};
pub use output::ProviderOutput;
pub use replicate::{ReplicateClient, ReplicateConfig};
