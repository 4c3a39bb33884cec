//! Domain layer - Market-data types and feed liveness.
//!
//! Pure logic with no transport or I/O dependencies (hexagonal
//! architecture inner ring). Everything here is testable in isolation.

pub mod liveness;
pub mod tick;

// Re-export core types for convenience
pub use liveness::{FeedState, FeedStatus, LivenessCheck, LivenessTracker, Transition};
pub use tick::{Symbol, SymbolError, Tick, TickSource, now_ms};
