//! Push Feed Adapters - Real-time Tick Streams
//!
//! The vendor WebSocket implements the `PushFeed` port. Ticks are
//! forwarded over an mpsc channel to the feed supervisor, which is
//! the only consumer.

pub mod vendor_ws;

pub use vendor_ws::{VendorWsFeed, WsFeedConfig};
