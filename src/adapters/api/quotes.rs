//! REST Quote Fetcher - Fallback Quote Retrieval
//!
//! Implements the `QuoteFetcher` port on top of the vendor quotes
//! endpoint. The symbol set is split into requests of at most
//! `batch_size` symbols; every returned quote becomes a `Fallback` tick
//! stamped with the local fetch completion time.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::client::VendorClient;
use super::types::QuotesResponse;
use crate::domain::{Symbol, Tick, now_ms};
use crate::ports::{FetchError, QuoteFetcher, Quotes};

/// Quotes endpoint path under the REST base URL.
const QUOTES_PATH: &str = "/data/quotes";

/// Vendor error codes that mean the token is unusable.
const AUTH_ERROR_CODES: [i64; 4] = [-8, -15, -16, -17];

/// Fallback quote source backed by the vendor REST API.
pub struct RestQuoteFetcher {
  /// Shared HTTP client.
  client: Arc<VendorClient>,
  /// Symbols per request.
  batch_size: usize,
}

impl RestQuoteFetcher {
  /// Create a fetcher that requests `batch_size` symbols per call.
  pub fn new(client: Arc<VendorClient>, batch_size: usize) -> Self {
    Self {
      client,
      batch_size: batch_size.max(1),
    }
  }

  /// Probe the API with one symbol to confirm the token works.
  ///
  /// # Errors
  /// Any fetch error, or a successful response with no usable quote.
  pub async fn validate(&self, probe: &Symbol) -> Result<(), FetchError> {
    let ticks = self.fetch_batch(std::slice::from_ref(probe)).await?;
    if ticks.is_empty() {
      return Err(FetchError::Decode(format!(
        "validation quote for {probe} returned no data"
      )));
    }
    Ok(())
  }

  async fn fetch_batch(&self, batch: &[Symbol]) -> Result<Vec<Tick>, FetchError> {
    let joined = batch
      .iter()
      .map(Symbol::as_str)
      .collect::<Vec<_>>()
      .join(",");

    let response: QuotesResponse = self
      .client
      .get_json(QUOTES_PATH, &[("symbols", joined)])
      .await?;

    quotes_to_ticks(response, now_ms())
  }
}

/// Convert a quotes response into fallback ticks stamped `observed_ms`.
///
/// Per-symbol errors and entries without a price are skipped.
pub fn quotes_to_ticks(response: QuotesResponse, observed_ms: u64) -> Result<Vec<Tick>, FetchError> {
  if !response.is_ok() {
    let code = response.code.unwrap_or_default();
    let message = response.message.unwrap_or_default();
    if AUTH_ERROR_CODES.contains(&code) {
      return Err(FetchError::Auth(message));
    }
    return Err(FetchError::Vendor { code, message });
  }

  let mut ticks = Vec::with_capacity(response.d.len());
  for entry in response.d {
    if entry.s != "ok" {
      warn!(symbol = %entry.n, "Quote entry returned error status");
      continue;
    }
    let Ok(symbol) = Symbol::parse(&entry.n) else {
      warn!(symbol = %entry.n, "Quote entry has malformed symbol");
      continue;
    };
    let Some(values) = entry.v else {
      continue;
    };
    let Some(last_price) = values.lp else {
      debug!(symbol = %symbol, "Quote entry has no last price");
      continue;
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let volume = values.volume.filter(|v| *v >= 0.0).map(|v| v as u64);
    let exchange_ts_ms = values
      .tt
      .and_then(|s| u64::try_from(s).ok())
      .and_then(|s| s.checked_mul(1000));

    ticks.push(
      Tick::fallback(symbol, last_price, volume, observed_ms).with_exchange_time(exchange_ts_ms),
    );
  }

  Ok(ticks)
}

#[async_trait]
impl QuoteFetcher for RestQuoteFetcher {
  #[instrument(skip(self, symbols), fields(symbols = symbols.len(), batch = self.batch_size))]
  async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<Quotes, FetchError> {
    let mut quotes = Quotes::default();
    let mut last_error = None;

    for batch in symbols.chunks(self.batch_size) {
      match self.fetch_batch(batch).await {
        Ok(mut batch_ticks) => quotes.ticks.append(&mut batch_ticks),
        Err(e) => {
          warn!(error = %e, first = %batch[0], size = batch.len(), "Quote batch failed");
          quotes.failed_batches += 1;
          last_error = Some(e);
        }
      }
    }

    match last_error {
      Some(e) if quotes.ticks.is_empty() => Err(e),
      _ => Ok(quotes),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(json: &str) -> QuotesResponse {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn test_quotes_to_ticks_skips_bad_entries() {
    let resp = parse(
      r#"{"s":"ok","d":[
        {"n":"NSE:SBIN-EQ","s":"ok","v":{"lp":812.5,"volume":1200,"tt":1700000000}},
        {"n":"NSE:BAD-EQ","s":"error","v":{}},
        {"n":"NSE:NOLP-EQ","s":"ok","v":{"volume":5}},
        {"n":"GARBAGE","s":"ok","v":{"lp":1.0}}
      ]}"#,
    );
    let ticks = quotes_to_ticks(resp, 42_000).unwrap();
    assert_eq!(ticks.len(), 1);
    let tick = &ticks[0];
    assert_eq!(tick.symbol.as_str(), "NSE:SBIN-EQ");
    assert_eq!(tick.volume, Some(1200));
    assert_eq!(tick.timestamp_ms, 42_000);
    assert_eq!(tick.exchange_ts_ms, Some(1_700_000_000_000));
    assert_eq!(tick.source, crate::domain::TickSource::Fallback);
  }

  #[test]
  fn test_out_of_range_trade_time_is_dropped() {
    let resp = parse(&format!(
      r#"{{"s":"ok","d":[{{"n":"NSE:SBIN-EQ","s":"ok","v":{{"lp":1.0,"tt":{}}}}}]}}"#,
      i64::MAX
    ));
    let ticks = quotes_to_ticks(resp, 7).unwrap();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].exchange_ts_ms, None);
    assert_eq!(ticks[0].timestamp_ms, 7);
  }

  #[test]
  fn test_auth_error_code_maps_to_auth() {
    let resp = parse(r#"{"s":"error","code":-16,"message":"token invalid"}"#);
    assert!(matches!(quotes_to_ticks(resp, 0), Err(FetchError::Auth(_))));
  }

  #[test]
  fn test_other_error_code_maps_to_vendor() {
    let resp = parse(r#"{"s":"error","code":-300,"message":"bad symbol"}"#);
    match quotes_to_ticks(resp, 0) {
      Err(FetchError::Vendor { code, .. }) => assert_eq!(code, -300),
      other => panic!("unexpected {other:?}"),
    }
  }
}
