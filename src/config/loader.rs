//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Vendor cap on symbols per quotes request.
const MAX_QUOTE_BATCH: usize = 50;

/// Upper bound on REST retries; backoff doubles per retry.
const MAX_RETRIES: u32 = 10;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    timeout_s = config.feed.timeout_seconds,
    check_interval_s = config.feed.check_interval_seconds,
    symbols_file = %config.feed.symbols_file,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Liveness validation
  anyhow::ensure!(
    config.feed.timeout_seconds > 0,
    "feed.timeout_seconds must be positive"
  );
  anyhow::ensure!(
    config.feed.check_interval_seconds > 0,
    "feed.check_interval_seconds must be positive"
  );
  anyhow::ensure!(
    config.feed.check_interval_seconds <= config.feed.timeout_seconds,
    "feed.check_interval_seconds ({}) must not exceed feed.timeout_seconds ({})",
    config.feed.check_interval_seconds,
    config.feed.timeout_seconds
  );
  anyhow::ensure!(
    !config.feed.symbols_file.is_empty(),
    "feed.symbols_file must not be empty"
  );

  // API validation
  anyhow::ensure!(
    !config.api.rest_url.is_empty(),
    "REST API URL must not be empty"
  );
  anyhow::ensure!(
    !config.api.ws_url.is_empty(),
    "WebSocket URL must not be empty"
  );
  anyhow::ensure!(
    (1..=MAX_QUOTE_BATCH).contains(&config.api.quote_batch_size),
    "api.quote_batch_size must be in [1, {MAX_QUOTE_BATCH}], got {}",
    config.api.quote_batch_size
  );
  anyhow::ensure!(
    config.api.max_requests_per_second > 0,
    "api.max_requests_per_second must be positive"
  );
  anyhow::ensure!(
    config.api.max_retries <= MAX_RETRIES,
    "api.max_retries must be at most {MAX_RETRIES}, got {}",
    config.api.max_retries
  );
  anyhow::ensure!(
    config.api.max_symbols_per_subscription > 0,
    "api.max_symbols_per_subscription must be positive"
  );
  anyhow::ensure!(
    config.api.max_connect_attempts > 0,
    "api.max_connect_attempts must be positive"
  );

  // Credentials validation
  anyhow::ensure!(
    !config.credentials.client_id.is_empty(),
    "credentials.client_id must not be empty"
  );

  Ok(())
}
