//! Core market-data types.
//!
//! Defines the symbol identifier and the tick observation shared by the
//! push feed, the REST fallback and the sink. These types sit in the
//! inner ring: no transport or I/O dependencies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────
// Symbol
// ────────────────────────────────────────────

/// Errors raised while parsing a symbol identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// The identifier is missing the `EXCHANGE:` prefix.
    #[error("symbol `{0}` is not of the form EXCHANGE:TICKER")]
    MissingExchange(String),
    /// Exchange or ticker part is empty.
    #[error("symbol `{0}` has an empty exchange or ticker")]
    EmptyPart(String),
}

/// Opaque `EXCHANGE:TICKER` identifier (e.g. `NSE:RELIANCE-EQ`).
///
/// Immutable once parsed. The supervisor treats the loaded set as fixed
/// for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and validate a symbol identifier.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let raw = raw.trim();
        let (exchange, ticker) = raw
            .split_once(':')
            .ok_or_else(|| SymbolError::MissingExchange(raw.to_string()))?;

        if exchange.is_empty() || ticker.is_empty() || ticker.contains(':') {
            return Err(SymbolError::EmptyPart(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    /// Full identifier as sent to the vendor.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exchange prefix (`NSE` in `NSE:RELIANCE-EQ`).
    pub fn exchange(&self) -> &str {
        self.0.split_once(':').map_or("", |(e, _)| e)
    }

    /// Ticker part (`RELIANCE-EQ` in `NSE:RELIANCE-EQ`).
    pub fn ticker(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, t)| t)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

// ────────────────────────────────────────────
// Tick
// ────────────────────────────────────────────

/// Where a tick came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickSource {
    /// Delivered by the WebSocket push feed.
    Push,
    /// Synthesized from a REST quote during staleness.
    Fallback,
}

impl TickSource {
    /// Label used in metrics and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for TickSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped quote observation for one symbol.
///
/// `timestamp_ms` is the local observation time (arrival for push ticks,
/// fetch completion for fallback ticks) and drives the liveness clock.
/// The vendor's own exchange time, when present, is carried separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument identifier.
    pub symbol: Symbol,
    /// Last traded price.
    pub last_price: f64,
    /// Cumulative traded volume, if the source reports it.
    pub volume: Option<u64>,
    /// Local observation time (Unix ms).
    pub timestamp_ms: u64,
    /// Exchange feed time reported by the vendor (Unix ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_ts_ms: Option<u64>,
    /// Push or fallback.
    pub source: TickSource,
}

impl Tick {
    /// Build a push-feed tick observed at `timestamp_ms`.
    pub fn push(symbol: Symbol, last_price: f64, volume: Option<u64>, timestamp_ms: u64) -> Self {
        Self {
            symbol,
            last_price,
            volume,
            timestamp_ms,
            exchange_ts_ms: None,
            source: TickSource::Push,
        }
    }

    /// Build a fallback tick synthesized from a REST quote.
    pub fn fallback(
        symbol: Symbol,
        last_price: f64,
        volume: Option<u64>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            symbol,
            last_price,
            volume,
            timestamp_ms,
            exchange_ts_ms: None,
            source: TickSource::Fallback,
        }
    }

    /// Attach the vendor-reported exchange time.
    #[must_use]
    pub const fn with_exchange_time(mut self, exchange_ts_ms: Option<u64>) -> Self {
        self.exchange_ts_ms = exchange_ts_ms;
        self
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
