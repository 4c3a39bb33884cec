//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! The registry never talks to the supervisor directly: `track`
//! mirrors `FeedStatus` snapshots from the watch channel into
//! counters and gauges. Journal write failures are sampled from the
//! sink on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument};

use crate::adapters::persistence::LogSink;
use crate::domain::{FeedState, FeedStatus};

/// Centralized Prometheus metrics for the feed supervisor.
///
/// All metrics follow the naming convention `tick_feed_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Ticks forwarded, labelled by `source` (push / fallback).
    pub ticks_total: IntCounterVec,
    /// Fallback fetches, labelled by `outcome` (ok / partial / failed).
    pub fallback_fetches_total: IntCounterVec,
    /// State transitions, labelled by target state `to`.
    pub state_transitions_total: IntCounterVec,
    /// 1 while stale, 0 while live.
    pub feed_stale: IntGauge,
    /// Unix ms of the last observed tick.
    pub last_tick_ms: IntGauge,
    /// Tick journal writes that failed.
    pub journal_write_failures_total: IntCounter,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_total = IntCounterVec::new(
            Opts::new("tick_feed_ticks_total", "Ticks forwarded to the sink"),
            &["source"],
        )?;

        let fallback_fetches_total = IntCounterVec::new(
            Opts::new(
                "tick_feed_fallback_fetches_total",
                "REST fallback quote fetches",
            ),
            &["outcome"],
        )?;

        let state_transitions_total = IntCounterVec::new(
            Opts::new(
                "tick_feed_state_transitions_total",
                "Liveness state transitions",
            ),
            &["to"],
        )?;

        let feed_stale = IntGauge::new(
            "tick_feed_stale",
            "Whether the push feed is stale (1=stale, 0=live)",
        )?;

        let last_tick_ms = IntGauge::new(
            "tick_feed_last_tick_timestamp_ms",
            "Unix ms of the most recent tick from any source",
        )?;

        let journal_write_failures_total = IntCounter::new(
            "tick_feed_journal_write_failures_total",
            "Tick journal writes that failed",
        )?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(fallback_fetches_total.clone()))?;
        registry.register(Box::new(state_transitions_total.clone()))?;
        registry.register(Box::new(feed_stale.clone()))?;
        registry.register(Box::new(last_tick_ms.clone()))?;
        registry.register(Box::new(journal_write_failures_total.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            fallback_fetches_total,
            state_transitions_total,
            feed_stale,
            last_tick_ms,
            journal_write_failures_total,
        })
    }

    /// Apply the difference between two status snapshots.
    pub fn apply(&self, previous: &FeedStatus, current: &FeedStatus) {
        let delta = |now: u64, before: u64| now.saturating_sub(before);

        self.ticks_total
            .with_label_values(&["push"])
            .inc_by(delta(current.push_ticks, previous.push_ticks));
        self.ticks_total
            .with_label_values(&["fallback"])
            .inc_by(delta(current.fallback_ticks, previous.fallback_ticks));

        let failed = delta(current.fallback_failures, previous.fallback_failures);
        let partial = delta(current.partial_fetches, previous.partial_fetches);
        let fetched = delta(current.fallback_fetches, previous.fallback_fetches);
        self.fallback_fetches_total
            .with_label_values(&["failed"])
            .inc_by(failed);
        self.fallback_fetches_total
            .with_label_values(&["partial"])
            .inc_by(partial);
        self.fallback_fetches_total
            .with_label_values(&["ok"])
            .inc_by(fetched.saturating_sub(failed).saturating_sub(partial));

        self.state_transitions_total
            .with_label_values(&[FeedState::Stale.as_str()])
            .inc_by(delta(current.stale_transitions, previous.stale_transitions));
        if previous.state == FeedState::Stale && current.state == FeedState::Live {
            self.state_transitions_total
                .with_label_values(&[FeedState::Live.as_str()])
                .inc();
        }

        self.feed_stale
            .set(i64::from(current.state == FeedState::Stale));
        self.last_tick_ms
            .set(i64::try_from(current.last_tick_ms).unwrap_or(i64::MAX));
    }

    /// Mirror status snapshots into the registry until shutdown.
    #[instrument(skip_all)]
    pub async fn track(
        self: Arc<Self>,
        mut status_rx: watch::Receiver<FeedStatus>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut previous = *status_rx.borrow_and_update();
        self.apply(&previous, &previous);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        debug!("Status channel closed, metrics tracking stopped");
                        break;
                    }
                    let current = *status_rx.borrow_and_update();
                    self.apply(&previous, &current);
                    previous = current;
                }
            }
        }
    }

    /// Raise the journal failure counter to the sink's running total.
    pub fn sync_journal_failures(&self, total: u64) {
        let seen = self.journal_write_failures_total.get();
        self.journal_write_failures_total
            .inc_by(total.saturating_sub(seen));
    }

    /// Sample the sink's journal failures every `period` until shutdown.
    #[instrument(skip_all)]
    pub async fn track_journal(
        self: Arc<Self>,
        sink: Arc<LogSink>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => self.sync_journal_failures(sink.write_failures()),
            }
        }
        self.sync_journal_failures(sink.write_failures());
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
