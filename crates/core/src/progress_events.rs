//! Event names and interim statuses delivered to clients over WebSocket.
//!
//! Event names form a closed vocabulary. Interim updates are all sent under
//! [`EVENT_CONTINUE`] and distinguished by their `status` field.

/// A generation record was created and work is starting.
pub const EVENT_GENERATION_STARTED: &str = "generation_started";

/// Interim stage update or heartbeat.
pub const EVENT_CONTINUE: &str = "continue";

/// Terminal success.
pub const EVENT_GENERATION_COMPLETED: &str = "generation_completed";

/// Terminal failure.
pub const EVENT_GENERATION_FAILED: &str = "generation_failed";

pub const ALL_EVENTS: &[&str] = &[
    EVENT_GENERATION_STARTED,
    EVENT_CONTINUE,
    EVENT_GENERATION_COMPLETED,
    EVENT_GENERATION_FAILED,
];

// ---------------------------------------------------------------------------
// Statuses carried in the `status` field
// ---------------------------------------------------------------------------

pub const STATUS_STARTED: &str = "started";
pub const STATUS_COMPOSITION: &str = "composition";
pub const STATUS_COMPOSITION_COMPLETED: &str = "composition_completed";
pub const STATUS_AI_GENERATION: &str = "ai_generation";
pub const STATUS_AI_GENERATION_COMPLETED: &str = "ai_generation_completed";
pub const STATUS_FACE_SWAP: &str = "face_swap";
pub const STATUS_FACE_SWAP_COMPLETED: &str = "face_swap_completed";
pub const STATUS_FACE_SWAP_FAILED: &str = "face_swap_failed";
/// Liveness tick during a long provider call. Never changes progress.
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

// ---------------------------------------------------------------------------
// Progress checkpoints
// ---------------------------------------------------------------------------

pub const PROGRESS_COMPOSITION: u8 = 20;
pub const PROGRESS_COMPOSITION_COMPLETED: u8 = 40;
pub const PROGRESS_AI_GENERATION: u8 = 60;
pub const PROGRESS_AI_GENERATION_COMPLETED: u8 = 80;
pub const PROGRESS_FACE_SWAP: u8 = 85;
pub const PROGRESS_FACE_SWAP_FAILED: u8 = 90;
pub const PROGRESS_FACE_SWAP_COMPLETED: u8 = 95;
pub const PROGRESS_COMPLETED: u8 = 100;
