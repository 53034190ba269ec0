//! Durable object storage for generation artifacts.
//!
//! [`ObjectStorage`] is the seam the pipeline uploads through. Two backends
//! are provided: [`S3Storage`] for production and [`LocalStorage`] which
//! writes under a directory the API server exposes at `/media`.

pub mod config;
pub mod error;
pub mod local;
pub mod s3;
pub mod storage;

pub use config::{build_storage, StorageBackend, StorageConfig};
pub use error::StorageError;
pub use local::LocalStorage;
pub use s3::S3Storage;
pub use storage::{object_key, unique_name_hint, ObjectStorage, StoredObject};
