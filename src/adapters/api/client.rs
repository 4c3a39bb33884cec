//! Vendor HTTP Client - Rate-limited REST API Client
//!
//! Wraps reqwest with client-side rate limiting, retries and the
//! vendor `Authorization` header for all REST interactions. Errors are
//! mapped onto the `FetchError` port type so callers never see reqwest.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::auth::Credentials;
use crate::config::ApiConfig;
use crate::ports::FetchError;

/// Configuration for the vendor HTTP client.
#[derive(Debug, Clone)]
pub struct VendorClientConfig {
  /// Base URL for the REST API.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// Client-side request rate.
  pub max_requests_per_second: u32,
}

impl Default for VendorClientConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api-t1.fyers.in".to_string(),
      timeout: Duration::from_secs(10),
      max_retries: 2,
      retry_base_delay: Duration::from_millis(200),
      max_requests_per_second: 10,
    }
  }
}

impl From<&ApiConfig> for VendorClientConfig {
  fn from(api: &ApiConfig) -> Self {
    Self {
      base_url: api.rest_url.trim_end_matches('/').to_string(),
      timeout: Duration::from_millis(api.timeout_ms),
      max_retries: api.max_retries,
      retry_base_delay: Duration::from_millis(200),
      max_requests_per_second: api.max_requests_per_second,
    }
  }
}

/// Rate-limited HTTP client for the vendor REST API.
pub struct VendorClient {
  /// Underlying HTTP client.
  http: Client,
  /// Credentials for the Authorization header.
  credentials: Arc<Credentials>,
  /// Client configuration.
  config: VendorClientConfig,
  /// Request-rate limiter.
  limiter: DefaultDirectRateLimiter,
}

impl VendorClient {
  /// Create a new vendor client.
  pub fn new(credentials: Arc<Credentials>, config: VendorClientConfig) -> anyhow::Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

    let rps = NonZeroU32::new(config.max_requests_per_second).unwrap_or(NonZeroU32::MIN);
    let limiter = RateLimiter::direct(Quota::per_second(rps));

    Ok(Self {
      http,
      credentials,
      config,
      limiter,
    })
  }

  /// GET `path` with query parameters and decode the JSON body.
  pub async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, FetchError> {
    let url = format!("{}{}", self.config.base_url, path);
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = retry_delay(self.config.retry_base_delay, attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "Retrying request");
        sleep(delay).await;
      }

      self.limiter.until_ready().await;

      let request = self
        .http
        .get(&url)
        .query(query)
        .header(AUTHORIZATION, self.credentials.authorization());

      match request.send().await {
        Ok(response) => match response.status() {
          StatusCode::OK => {
            return response
              .json::<T>()
              .await
              .map_err(|e| FetchError::Decode(e.to_string()));
          }
          StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Auth(body));
          }
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(attempt, "Rate limited by quotes endpoint, backing off");
            sleep(Duration::from_secs(1)).await;
            last_error = Some(FetchError::RateLimited);
          }
          status if status.is_server_error() => {
            warn!(status = %status, attempt, "Server error, retrying");
            last_error = Some(FetchError::Vendor {
              code: i64::from(status.as_u16()),
              message: status.to_string(),
            });
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Vendor {
              code: i64::from(status.as_u16()),
              message: body,
            });
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, "Request failed");
          last_error = Some(FetchError::Network(e.to_string()));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| FetchError::Network("max retries exceeded".into())))
  }
}

/// Exponential backoff before retry `attempt` (1-based), saturating on overflow.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
  base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}
