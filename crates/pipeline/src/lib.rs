//! Generation pipeline orchestrator.
//!
//! [`Orchestrator::run`] takes one validated request through composition,
//! AI generation or editing, optional identity transfer, durable upload and
//! credit accounting. Every collaborator is injected through
//! [`Collaborators`]; nothing is looked up globally.

pub mod ephemeral;
pub mod error;
pub mod fetch;
pub mod orchestrator;

pub use ephemeral::{EphemeralFile, Scratch, StagedUpload};
pub use error::{FetchError, PipelineError};
pub use fetch::{HttpFetcher, RemoteFetcher};
pub use orchestrator::{
    Collaborators, GenerationOptions, Orchestrator, PipelineOutcome, PipelineRequest,
    PipelineSettings,
};
