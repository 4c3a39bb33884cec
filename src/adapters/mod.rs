//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP client, WebSocket, file I/O). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: Vendor REST client, credentials and fallback quotes
//! - `feeds`: Vendor WebSocket push feed
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSONL tick journal and event logging sink

pub mod api;
pub mod feeds;
pub mod metrics;
pub mod persistence;
