//! Vendor REST API Adapter
//!
//! Implements the HTTP side of the vendor integration: credential
//! loading, a rate-limited client, and the `QuoteFetcher` port used as
//! the fallback while the push feed is stale.
//!
//! Sub-modules:
//! - `auth`: Token file loading and expiry check
//! - `client`: HTTP client with rate limiting and retries
//! - `quotes`: Batched quote retrieval (`QuoteFetcher` impl)
//! - `types`: API response type definitions

pub mod auth;
pub mod client;
pub mod quotes;
pub mod types;

pub use auth::{CredentialError, Credentials};
pub use client::{VendorClient, VendorClientConfig};
pub use quotes::RestQuoteFetcher;
