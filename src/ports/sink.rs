//! Sink Port - Append-only Tick and Event Recording
//!
//! Where the supervisor reports what it observed. Calls never fail from
//! the caller's point of view; an implementation logs its own write
//! errors instead of propagating them.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::Tick;

/// Severity attached to a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Debug,
  Info,
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Debug => "debug",
      Self::Info => "info",
      Self::Warning => "warning",
      Self::Error => "error",
    };
    f.write_str(s)
  }
}

/// Trait for tick/event recorders.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
  /// Record one tick.
  async fn record(&self, tick: &Tick);

  /// Record a supervisor event (state change, fetch failure, ...).
  async fn record_event(&self, message: &str, severity: Severity);
}
