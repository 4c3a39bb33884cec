//! Quote Fetcher Port - Request/Response Quote Interface
//!
//! Synchronous (one logical round trip) quote retrieval used by the
//! supervisor when the push feed is judged stale.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Symbol, Tick};

/// Errors returned by a quote fetch.
///
/// All variants are recoverable from the supervisor's point of view:
/// it logs them and retries on the next check cycle.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Connection, DNS, TLS or timeout failure.
  #[error("network error: {0}")]
  Network(String),
  /// Token rejected (401/403) or vendor auth error code.
  #[error("authentication failed: {0}")]
  Auth(String),
  /// Vendor rate limit hit and retries exhausted.
  #[error("rate limited by quote endpoint")]
  RateLimited,
  /// Vendor answered with a non-ok status.
  #[error("vendor error {code}: {message}")]
  Vendor {
    /// Vendor or HTTP status code.
    code: i64,
    /// Vendor message.
    message: String,
  },
  /// Response body did not match the expected shape.
  #[error("malformed quote response: {0}")]
  Decode(String),
}

/// Quotes gathered by one fetch, possibly across several requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quotes {
  /// One `Fallback` tick per symbol the vendor answered for.
  pub ticks: Vec<Tick>,
  /// Requests that failed while others succeeded.
  pub failed_batches: usize,
}

impl Quotes {
  /// Quotes from a fetch where every request succeeded.
  pub const fn complete(ticks: Vec<Tick>) -> Self {
    Self {
      ticks,
      failed_batches: 0,
    }
  }

  /// Whether some requests failed.
  pub const fn is_partial(&self) -> bool {
    self.failed_batches > 0
  }
}

/// Trait for pull-based quote providers.
#[async_trait]
pub trait QuoteFetcher: Send + Sync + 'static {
  /// Fetch the latest quote for every symbol in `symbols`.
  ///
  /// Symbols the vendor skipped are simply absent. An error means no
  /// request succeeded; partial failures are counted in `Quotes`.
  async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<Quotes, FetchError>;
}
