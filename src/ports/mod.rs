//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the supervisor requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PushFeed`: Streaming tick delivery (vendor WebSocket)
//! - `QuoteFetcher`: Request/response quotes (vendor REST)
//! - `Sink`: Append-only tick and event recording

pub mod push_feed;
pub mod quote_fetcher;
pub mod sink;

pub use push_feed::{FeedError, PushFeed};
pub use quote_fetcher::{FetchError, QuoteFetcher, Quotes};
pub use sink::{Severity, Sink};
