// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod telemetry;
pub mod prices;

// Acquisition pipeline (feeds, article extraction, news APIs, tiered fallback)
pub mod ingest;

// Completion client + summarization
pub mod analyze;

// Publishing & the post loop
pub mod compose;
pub mod notify;
pub mod scheduler;

// Wiring used by both binaries
pub mod bootstrap;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::compose::{Newsroom, PostCandidate, PostComposer, PostKind};
pub use crate::notify::publisher::{Publisher, XPublisher};
pub use crate::scheduler::{CycleState, Scheduler, SchedulerCfg, StopReason};

/// Hard character cap of the publishing platform.
pub const POST_CHAR_LIMIT: usize = 280;
