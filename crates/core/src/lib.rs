pub mod composition;
pub mod error;
pub mod generation;
pub mod media;
pub mod progress_events;
pub mod types;
pub mod validation;
