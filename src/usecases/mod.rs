//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `FeedSupervisor`: Push-feed liveness supervision with REST fallback

pub mod feed_supervisor;

pub use feed_supervisor::{
    CycleOutcome, FallbackOutcome, FeedSupervisor, SupervisorError, SupervisorSettings,
};
