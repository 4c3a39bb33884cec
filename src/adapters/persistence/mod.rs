//! Persistence Adapters - JSONL Tick Journal and Event Log
//!
//! Implements the `Sink` port. Ticks go to append-only daily JSONL
//! files; supervisor events go to the tracing pipeline at the
//! matching level. No database dependency.

pub mod log_sink;
pub mod tick_journal;

pub use log_sink::LogSink;
pub use tick_journal::TickJournal;
