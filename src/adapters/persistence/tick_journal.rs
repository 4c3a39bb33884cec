//! Tick Journal - Append-only JSONL Tick Records
//!
//! Persists ticks to daily JSONL files named `ticks/YYYY-MM-DD.jsonl`
//! (UTC date of the tick's observation time). Each line is a complete
//! `Tick` so a day can be replayed or streamed line by line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::DateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::Tick;

/// Append-only JSONL tick journal with daily file rotation.
pub struct TickJournal {
    /// Directory holding the daily files.
    ticks_dir: PathBuf,
}

impl TickJournal {
    /// Create the journal under `data_dir/ticks`.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let ticks_dir = Path::new(data_dir).join("ticks");

        fs::create_dir_all(&ticks_dir)
            .await
            .context("Failed to create ticks directory")?;

        info!(dir = %ticks_dir.display(), "Tick journal ready");
        Ok(Self { ticks_dir })
    }

    /// Journal file for the UTC day containing `timestamp_ms`.
    pub fn path_for(&self, timestamp_ms: u64) -> PathBuf {
        let date = i64::try_from(timestamp_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map_or_else(|| "1970-01-01".to_string(), |d| d.format("%Y-%m-%d").to_string());
        self.ticks_dir.join(format!("{date}.jsonl"))
    }

    /// Append one tick to its day's file.
    #[instrument(skip(self, tick), fields(symbol = %tick.symbol))]
    pub async fn append(&self, tick: &Tick) -> Result<()> {
        let path = self.path_for(tick.timestamp_ms);

        let mut json = serde_json::to_string(tick).context("Failed to serialize tick")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open tick journal file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write tick")?;
        file.flush().await.context("Failed to flush tick journal")?;

        Ok(())
    }

    /// Whether the journal directory still accepts writes.
    pub async fn is_healthy(&self) -> bool {
        let test_path = self.ticks_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        if let Err(e) = &result {
            warn!(dir = %self.ticks_dir.display(), error = %e, "Tick journal not writable");
        }
        result.is_ok()
    }
}
