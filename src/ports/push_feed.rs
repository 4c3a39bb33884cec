//! Push Feed Port - Real-time Tick Delivery Interface
//!
//! Defines the trait for the vendor's long-lived streaming connection.
//! Ticks are not returned from any method: the adapter pushes them onto
//! the single-consumer channel it was constructed with, and the
//! supervisor drains that channel. The feed may go silent at any time
//! without signalling a disconnect.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Symbol;

/// Errors surfaced by push feed subscription calls.
#[derive(Debug, Error)]
pub enum FeedError {
  /// The requested set exceeds what one subscription may carry.
  #[error("subscription of {requested} symbols exceeds the limit of {limit}")]
  SubscriptionLimit {
    /// Number of symbols requested.
    requested: usize,
    /// Vendor limit per subscription.
    limit: usize,
  },
  /// Nothing to subscribe to.
  #[error("subscription requires at least one symbol")]
  EmptySubscription,
  /// The feed task is gone and cannot accept commands.
  #[error("push feed is closed")]
  Closed,
}

/// Trait for streaming market data providers.
///
/// `subscribe` accepts an already-batched symbol set; splitting a larger
/// universe across several subscriptions is the caller's concern.
#[async_trait]
pub trait PushFeed: Send + Sync + 'static {
  /// Subscribe to tick updates for `symbols`.
  ///
  /// The subscription is (re)sent on every successful connect, so this
  /// may be called before the socket is up.
  async fn subscribe(&self, symbols: &[Symbol]) -> Result<(), FeedError>;

  /// Stop receiving updates for `symbols`.
  async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<(), FeedError>;

  /// Whether the underlying connection is currently open.
  ///
  /// An open connection can still be silent; liveness is judged by
  /// the supervisor, not by this flag.
  fn is_connected(&self) -> bool;
}
