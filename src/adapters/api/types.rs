//! Quotes API Response Types
//!
//! Serialization types for the vendor's REST quotes endpoint:
//!
//! ```text
//! {"s":"ok","code":200,"d":[{"n":"NSE:SBIN-EQ","s":"ok","v":{"lp":812.5,"volume":120034,"tt":1700000000}}]}
//! ```

use serde::{Deserialize, Deserializer};

/// Top-level quotes response.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotesResponse {
  /// "ok" or "error".
  pub s: String,
  /// Vendor status code.
  #[serde(default)]
  pub code: Option<i64>,
  /// Error message when `s != "ok"`.
  #[serde(default)]
  pub message: Option<String>,
  /// One entry per requested symbol.
  #[serde(default)]
  pub d: Vec<QuoteEntry>,
}

impl QuotesResponse {
  /// Whether the vendor reported success.
  pub fn is_ok(&self) -> bool {
    self.s == "ok"
  }
}

/// Per-symbol entry.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteEntry {
  /// Symbol identifier.
  pub n: String,
  /// "ok" or "error" for this symbol.
  pub s: String,
  /// Quote values.
  #[serde(default)]
  pub v: Option<QuoteValues>,
}

/// Quote fields used to build a tick.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteValues {
  /// Last traded price.
  #[serde(default)]
  pub lp: Option<f64>,
  /// Cumulative volume.
  #[serde(default)]
  pub volume: Option<f64>,
  /// Last trade time (Unix seconds), sent as number or string.
  #[serde(default, deserialize_with = "de_opt_epoch")]
  pub tt: Option<i64>,
}

/// Accept an epoch timestamp encoded either as a JSON number or string.
fn de_opt_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Epoch {
    Int(i64),
    Float(f64),
    Text(String),
  }

  #[allow(clippy::cast_possible_truncation)]
  Ok(match Option::<Epoch>::deserialize(deserializer)? {
    Some(Epoch::Int(v)) => Some(v),
    Some(Epoch::Float(v)) => Some(v as i64),
    Some(Epoch::Text(s)) => s.trim().parse().ok(),
    None => None,
  })
}
