//! Progress routing from the event bus to sockets.
//!
//! The [`ProgressRouter`] subscribes to the bus and delivers each event to
//! the owner's connections and any connection subscribed to the generation.

pub mod router;

pub use router::ProgressRouter;
