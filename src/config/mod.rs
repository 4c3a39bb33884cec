//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml` at startup.
//! Endpoints, timeouts and vendor limits are externalized here -
//! nothing is hardcoded in the supervisor. There is no runtime
//! reconfiguration: the file is read once.

pub mod loader;
pub mod symbols;

use std::time::Duration;

use serde::Deserialize;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and log level.
  pub service: ServiceConfig,
  /// Liveness and symbol-universe settings.
  #[serde(default)]
  pub feed: FeedConfig,
  /// Vendor endpoints and limits.
  pub api: ApiConfig,
  /// Vendor credentials.
  pub credentials: CredentialsConfig,
  /// Data and log directories.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Liveness supervision configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Silence after which the push feed is considered stale.
  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,
  /// Cadence of the liveness check (and of fallback polling while stale).
  #[serde(default = "default_check_interval")]
  pub check_interval_seconds: u64,
  /// CSV file with a `symbol` column.
  #[serde(default = "default_symbols_file")]
  pub symbols_file: String,
  /// Symbols excluded from the loaded list.
  #[serde(default)]
  pub blacklist: Vec<String>,
  /// Re-send the push subscription on every stale cycle.
  #[serde(default = "default_true")]
  pub resubscribe_while_stale: bool,
}

impl FeedConfig {
  /// Staleness threshold.
  pub const fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }

  /// Liveness check cadence.
  pub const fn check_interval(&self) -> Duration {
    Duration::from_secs(self.check_interval_seconds)
  }
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: default_timeout_seconds(),
      check_interval_seconds: default_check_interval(),
      symbols_file: default_symbols_file(),
      blacklist: Vec::new(),
      resubscribe_while_stale: true,
    }
  }
}

/// Vendor API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// REST base URL (quotes endpoint lives under it).
  pub rest_url: String,
  /// WebSocket feed URL.
  pub ws_url: String,
  /// REST request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Symbols per quotes request (vendor max: 50).
  #[serde(default = "default_quote_batch_size")]
  pub quote_batch_size: usize,
  /// Client-side REST rate limit.
  #[serde(default = "default_max_rps")]
  pub max_requests_per_second: u32,
  /// Retries on transient REST failures.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Largest symbol set a single push subscription may carry.
  #[serde(default = "default_max_symbols")]
  pub max_symbols_per_subscription: usize,
  /// Base delay between WebSocket reconnect attempts (seconds).
  #[serde(default = "default_reconnect_delay")]
  pub reconnect_delay_seconds: u64,
  /// Consecutive failed connects before the push feed task gives up.
  #[serde(default = "default_max_connect_attempts")]
  pub max_connect_attempts: u32,
}

/// Vendor credential locations.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
  /// Vendor application/client id.
  pub client_id: String,
  /// JSON token file written by the external login flow.
  #[serde(default = "default_token_file")]
  pub token_file: String,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for tick JSONL files.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// Directory for rolling application logs.
  #[serde(default = "default_log_dir")]
  pub log_dir: String,
  /// Append every tick to the daily journal.
  #[serde(default = "default_true")]
  pub record_ticks: bool,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      log_dir: default_log_dir(),
      record_ticks: true,
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_true() -> bool {
  true
}

const fn default_timeout_seconds() -> u64 {
  120
}

const fn default_check_interval() -> u64 {
  60
}

fn default_symbols_file() -> String {
  "config/symbols.csv".to_string()
}

const fn default_timeout_ms() -> u64 {
  10_000
}

const fn default_quote_batch_size() -> usize {
  50
}

const fn default_max_rps() -> u32 {
  10
}

const fn default_max_retries() -> u32 {
  2
}

const fn default_max_symbols() -> usize {
  100
}

const fn default_reconnect_delay() -> u64 {
  5
}

const fn default_max_connect_attempts() -> u32 {
  5
}

fn default_token_file() -> String {
  "data/tokens.json".to_string()
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_log_dir() -> String {
  "data/logs".to_string()
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

const fn default_health_port() -> u16 {
  8080
}
