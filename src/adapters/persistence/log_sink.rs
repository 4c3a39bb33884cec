//! Log Sink - `Sink` Port Implementation
//!
//! Events are emitted through `tracing` at the level matching their
//! severity, so they land in both the console and the rolling JSON
//! log. Ticks are appended to the `TickJournal` when enabled. Write
//! failures are logged and counted, never returned.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::tick_journal::TickJournal;
use crate::domain::Tick;
use crate::ports::{Severity, Sink};

/// Records ticks to the journal and events to the log pipeline.
pub struct LogSink {
    /// Daily JSONL journal; `None` when tick recording is off.
    journal: Option<TickJournal>,
    /// Journal writes that failed.
    write_failures: AtomicU64,
}

impl LogSink {
    /// Sink that journals ticks under `data_dir`.
    pub async fn new(data_dir: &str, record_ticks: bool) -> anyhow::Result<Self> {
        let journal = if record_ticks {
            Some(TickJournal::new(data_dir).await?)
        } else {
            None
        };
        Ok(Self::with_journal(journal))
    }

    /// Sink around an existing (or absent) journal.
    pub const fn with_journal(journal: Option<TickJournal>) -> Self {
        Self {
            journal,
            write_failures: AtomicU64::new(0),
        }
    }

    /// Journal write failures so far.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Whether ticks can still be journaled. Always true when recording is off.
    pub async fn is_healthy(&self) -> bool {
        match &self.journal {
            Some(journal) => journal.is_healthy().await,
            None => true,
        }
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn record(&self, tick: &Tick) {
        debug!(
            symbol = %tick.symbol,
            price = tick.last_price,
            source = tick.source.as_str(),
            ts = tick.timestamp_ms,
            "Tick"
        );

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(tick).await {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, symbol = %tick.symbol, "Failed to journal tick");
            }
        }
    }

    async fn record_event(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Debug => debug!(target: "feed_events", "{message}"),
            Severity::Info => info!(target: "feed_events", "{message}"),
            Severity::Warning => warn!(target: "feed_events", "{message}"),
            Severity::Error => error!(target: "feed_events", "{message}"),
        }
    }
}
