//! Progress event plumbing for generations.
//!
//! - [`ProgressEvent`] is the envelope every stage update and heartbeat uses.
//! - [`ProgressSink`] is the seam the orchestrator publishes through; it is
//!   handed in at construction time (an [`EventBus`] in the server,
//!   [`NoopSink`] or a recorder in tests).
//! - [`Heartbeat`] is a scoped periodic "still working" emitter.

pub mod bus;
pub mod heartbeat;

pub use bus::{EventBus, NoopSink, ProgressEvent, ProgressSink};
pub use heartbeat::{with_heartbeat, Heartbeat};
