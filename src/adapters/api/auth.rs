//! Vendor Credentials - Token File Loading and Expiry Check
//!
//! The access token is produced by an external login flow and stored as
//! `{"access_token": .., "issued_at": <unix s>, "expires_in": <s>}`.
//! This module only reads and validates it; an expired token is a fatal
//! startup error. `FEED_ACCESS_TOKEN` overrides the file when set.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable that overrides the token file.
pub const ACCESS_TOKEN_ENV: &str = "FEED_ACCESS_TOKEN";

/// Default token lifetime when the file omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 86_400;

/// Credential loading errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("client id is empty")]
    EmptyClientId,
    #[error("failed to read token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("token file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("token file has no access_token")]
    MissingToken,
    #[error("access token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("token lifetime of {0}s is out of range")]
    InvalidExpiry(i64),
}

/// On-disk token layout.
#[derive(Debug, Deserialize)]
struct TokenFile {
    #[serde(default)]
    access_token: Option<String>,
    /// Unix seconds. Absent means "issued now".
    #[serde(default)]
    issued_at: Option<f64>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// Vendor API credentials.
///
/// The token is never logged; `Debug` redacts it.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    access_token: String,
}

impl Credentials {
    /// Build credentials from explicit values.
    pub fn new(client_id: &str, access_token: &str) -> Result<Self, CredentialError> {
        if client_id.trim().is_empty() {
            return Err(CredentialError::EmptyClientId);
        }
        if access_token.trim().is_empty() {
            return Err(CredentialError::MissingToken);
        }
        Ok(Self {
            client_id: client_id.trim().to_string(),
            access_token: access_token.trim().to_string(),
        })
    }

    /// Load credentials: env override first, then the token file.
    pub fn load(client_id: &str, token_file: &Path) -> Result<Self, CredentialError> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                info!(env = ACCESS_TOKEN_ENV, "Access token loaded from environment");
                return Self::new(client_id, &token);
            }
        }
        Self::from_token_file(client_id, token_file, Utc::now())
    }

    /// Load and expiry-check the token file as of `now`.
    pub fn from_token_file(
        client_id: &str,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials = Self::from_token_json(client_id, &content, now)?;
        info!(path = %path.display(), "Valid access token loaded");
        Ok(credentials)
    }

    /// Parse token JSON and reject it if expired as of `now`.
    pub fn from_token_json(
        client_id: &str,
        json: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, CredentialError> {
        let file: TokenFile = serde_json::from_str(json)?;
        let token = file.access_token.ok_or(CredentialError::MissingToken)?;

        if let Some(issued_at) = file.issued_at {
            #[allow(clippy::cast_possible_truncation)]
            let issued = DateTime::<Utc>::from_timestamp(issued_at as i64, 0).unwrap_or(now);
            let expiry = TimeDelta::try_seconds(file.expires_in)
                .and_then(|lifetime| issued.checked_add_signed(lifetime))
                .ok_or(CredentialError::InvalidExpiry(file.expires_in))?;
            if now >= expiry {
                warn!(expired_at = %expiry, "Access token expired");
                return Err(CredentialError::Expired(expiry));
            }
        }

        Self::new(client_id, &token)
    }

    /// Value for the `Authorization` header: `<client_id>:<access_token>`.
    pub fn authorization(&self) -> String {
        format!("{}:{}", self.client_id, self.access_token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_valid_token_within_lifetime() {
        let json = r#"{"access_token":"abc","issued_at":1000,"expires_in":3600}"#;
        let creds = Credentials::from_token_json("APP-100", json, at(2000)).unwrap();
        assert_eq!(creds.authorization(), "APP-100:abc");
    }

    #[test]
    fn test_expired_token_rejected() {
        let json = r#"{"access_token":"abc","issued_at":1000,"expires_in":3600}"#;
        let err = Credentials::from_token_json("APP-100", json, at(4600)).unwrap_err();
        assert!(matches!(err, CredentialError::Expired(_)));
    }

    #[test]
    fn test_default_lifetime_is_one_day() {
        let json = r#"{"access_token":"abc","issued_at":0}"#;
        assert!(Credentials::from_token_json("APP", json, at(86_399)).is_ok());
        assert!(Credentials::from_token_json("APP", json, at(86_400)).is_err());
    }

    #[test]
    fn test_missing_issued_at_is_treated_as_fresh() {
        let json = r#"{"access_token":"abc"}"#;
        assert!(Credentials::from_token_json("APP", json, at(10_000_000)).is_ok());
    }

    #[test]
    fn test_out_of_range_expiry_rejected() {
        let json = r#"{"access_token":"x","issued_at":0,"expires_in":9223372036854775807}"#;
        let err = Credentials::from_token_json("APP-100", json, at(0)).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidExpiry(i64::MAX)));
    }

    #[test]
    fn test_missing_token_rejected() {
        let err = Credentials::from_token_json("APP", r#"{"issued_at":0}"#, at(1)).unwrap_err();
        assert!(matches!(err, CredentialError::MissingToken));
    }

    #[test]
    fn test_empty_client_id_rejected() {
        assert!(matches!(
            Credentials::new(" ", "abc"),
            Err(CredentialError::EmptyClientId)
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials::new("APP", "secret-token").unwrap();
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Credentials::from_token_file("APP", Path::new("no/such/tokens.json"), at(0))
            .unwrap_err();
        assert!(matches!(err, CredentialError::Io { .. }));
    }
}
