//! Feed Supervisor - Push/Pull Liveness Fallback
//!
//! Owns the only state machine in the service:
//! 1. Keeps the last-tick clock fresh from whichever source delivers
//! 2. Marks the push feed stale after `timeout` of silence
//! 3. While stale, polls the REST fallback once per check cycle
//! 4. Marks the feed live again on the first tick from either source
//!
//! Single execution context: push ticks, timer checks and fallback
//! fetches are all handled sequentially by one `tokio::select!` loop,
//! so the tracker needs no locking.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::domain::{
    FeedState, FeedStatus, LivenessCheck, LivenessTracker, Symbol, Tick, Transition, now_ms,
};
use crate::ports::{FeedError, PushFeed, QuoteFetcher, Severity, Sink};

/// Fatal supervisor errors. Only raised at startup.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Nothing to supervise.
    #[error("symbol set is empty")]
    NoSymbols,
    /// Initial push subscription was refused.
    #[error("push feed subscription failed: {0}")]
    Subscription(#[from] FeedError),
}

/// Timing knobs for the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    /// Silence threshold.
    pub timeout: Duration,
    /// Check cadence.
    pub check_interval: Duration,
    /// Re-send the push subscription on every stale cycle.
    pub resubscribe_while_stale: bool,
}

impl From<&FeedConfig> for SupervisorSettings {
    fn from(config: &FeedConfig) -> Self {
        Self {
            timeout: config.timeout(),
            check_interval: config.check_interval(),
            resubscribe_while_stale: config.resubscribe_while_stale,
        }
    }
}

/// What a fallback fetch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Quotes arrived and were forwarded.
    Delivered(usize),
    /// The fetch succeeded but returned nothing.
    Empty,
    /// The fetch failed; retried next cycle.
    Failed,
}

/// Result of one timer-driven cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// The liveness evaluation that started the cycle.
    pub check: LivenessCheck,
    /// Fallback result, when a fetch was due.
    pub fallback: Option<FallbackOutcome>,
    /// State once the cycle finished.
    pub state: FeedState,
}

/// Supervises one push feed with a pull-based fallback.
pub struct FeedSupervisor<F: PushFeed, Q: QuoteFetcher, S: Sink> {
    /// Streaming source.
    feed: Arc<F>,
    /// Polling source used while stale.
    fetcher: Arc<Q>,
    /// Where ticks and events go.
    sink: Arc<S>,
    /// Fixed symbol universe.
    symbols: Arc<[Symbol]>,
    /// Liveness state machine.
    tracker: LivenessTracker,
    /// Timing configuration.
    settings: SupervisorSettings,
    /// Counters mirrored into `status_tx`.
    status: FeedStatus,
    /// Publishes a snapshot after every state-affecting event.
    status_tx: watch::Sender<FeedStatus>,
}

impl<F: PushFeed, Q: QuoteFetcher, S: Sink> FeedSupervisor<F, Q, S> {
    /// Create a supervisor whose clock starts at `started_at_ms`.
    pub fn new(
        feed: Arc<F>,
        fetcher: Arc<Q>,
        sink: Arc<S>,
        symbols: Vec<Symbol>,
        settings: SupervisorSettings,
        started_at_ms: u64,
    ) -> Result<Self, SupervisorError> {
        if symbols.is_empty() {
            return Err(SupervisorError::NoSymbols);
        }

        let status = FeedStatus::new(started_at_ms);
        let (status_tx, _) = watch::channel(status);

        Ok(Self {
            feed,
            fetcher,
            sink,
            symbols: symbols.into(),
            tracker: LivenessTracker::new(settings.timeout, started_at_ms),
            settings,
            status,
            status_tx,
        })
    }

    /// Receiver for status snapshots (health probes, metrics).
    pub fn subscribe_status(&self) -> watch::Receiver<FeedStatus> {
        self.status_tx.subscribe()
    }

    /// Current feed state.
    pub const fn state(&self) -> FeedState {
        self.tracker.state()
    }

    /// Last-tick clock (Unix ms).
    pub const fn last_tick_ms(&self) -> u64 {
        self.tracker.last_tick_ms()
    }

    /// Current counters.
    pub const fn status(&self) -> FeedStatus {
        self.status
    }

    /// Subscribe the push feed to the full symbol set.
    ///
    /// # Errors
    /// A refused subscription is fatal; no partial recovery is attempted.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        self.feed.subscribe(&self.symbols).await?;

        self.sink
            .record_event(
                &format!("Subscribed push feed to {} symbols", self.symbols.len()),
                Severity::Info,
            )
            .await;
        Ok(())
    }

    /// Handle one tick from the push feed.
    pub async fn on_push_tick(&mut self, tick: Tick) {
        self.tracker.observe(tick.timestamp_ms);
        self.status.push_ticks += 1;
        self.sink.record(&tick).await;

        if let Some(transition) = self.tracker.mark_live() {
            self.on_transition(transition, 0).await;
        }
        self.publish();
    }

    /// Handle quotes returned by the fallback fetcher.
    ///
    /// Every tick is forwarded; the feed is marked live only if at least
    /// one tick moved the clock forward.
    pub async fn on_fallback_quotes(&mut self, ticks: Vec<Tick>) {
        let mut fresher = false;
        for tick in &ticks {
            fresher |= self.tracker.observe(tick.timestamp_ms);
            self.sink.record(tick).await;
        }
        self.status.fallback_ticks += ticks.len() as u64;

        if fresher {
            if let Some(transition) = self.tracker.mark_live() {
                self.on_transition(transition, 0).await;
            }
        }
        self.publish();
    }

    /// Evaluate liveness at `now_ms` and report any transition.
    ///
    /// Does not fetch: `LivenessCheck::fetch` tells the caller whether a
    /// fallback fetch is due this cycle.
    pub async fn check_liveness(&mut self, now_ms: u64) -> LivenessCheck {
        let check = self.tracker.check(now_ms);

        if let Some(transition) = check.transition {
            self.on_transition(transition, check.silence_ms).await;
        }
        self.publish();
        check
    }

    /// One timer cycle: check, then poll the fallback if due.
    pub async fn run_cycle(&mut self, now_ms: u64) -> CycleOutcome {
        let check = self.check_liveness(now_ms).await;

        let fallback = if check.fetch {
            if self.settings.resubscribe_while_stale {
                self.resubscribe().await;
            }
            Some(self.fetch_fallback().await)
        } else {
            None
        };

        CycleOutcome {
            check,
            fallback,
            state: self.tracker.state(),
        }
    }

    /// Run the supervisor loop until shutdown.
    ///
    /// Drains push ticks and runs a check every `check_interval`. If the
    /// tick channel closes the loop keeps polling on the timer, so the
    /// REST fallback carries the service until shutdown.
    #[instrument(skip_all, name = "feed_supervisor", fields(symbols = self.symbols.len()))]
    pub async fn run(
        &mut self,
        mut tick_rx: mpsc::Receiver<Tick>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let period = self.settings.check_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut feed_open = true;

        info!(
            timeout_s = self.settings.timeout.as_secs(),
            check_interval_s = period.as_secs(),
            "Feed supervisor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received in feed supervisor");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = self.run_cycle(now_ms()).await;
                    debug!(
                        state = %outcome.state,
                        silence_ms = outcome.check.silence_ms,
                        fallback = ?outcome.fallback,
                        "Liveness cycle complete"
                    );
                }
                tick = tick_rx.recv(), if feed_open => {
                    match tick {
                        Some(tick) => self.on_push_tick(tick).await,
                        None => {
                            warn!("Push tick channel closed, continuing on fallback polling");
                            feed_open = false;
                        }
                    }
                }
            }
        }

        self.stop().await;
    }

    /// Unsubscribe the push feed. Errors are logged, not returned.
    pub async fn stop(&self) {
        if let Err(e) = self.feed.unsubscribe(&self.symbols).await {
            warn!(error = %e, "Failed to unsubscribe push feed");
        }
        self.sink
            .record_event("Feed supervisor stopped", Severity::Info)
            .await;
    }

    /// Fetch quotes for the full set and feed them through the clock.
    async fn fetch_fallback(&mut self) -> FallbackOutcome {
        self.status.fallback_fetches += 1;

        let outcome = match self.fetcher.fetch_quotes(&self.symbols).await {
            Ok(quotes) => {
                if quotes.is_partial() {
                    self.status.partial_fetches += 1;
                    self.sink
                        .record_event(
                            &format!(
                                "Fallback quote fetch partial: {} batches failed",
                                quotes.failed_batches
                            ),
                            Severity::Warning,
                        )
                        .await;
                }
                self.deliver_fallback(quotes.ticks).await
            }
            Err(e) => {
                self.status.fallback_failures += 1;
                self.sink
                    .record_event(&format!("Fallback quote fetch failed: {e}"), Severity::Error)
                    .await;
                FallbackOutcome::Failed
            }
        };

        self.publish();
        outcome
    }

    /// Forward fallback ticks through the clock and report the count.
    async fn deliver_fallback(&mut self, ticks: Vec<Tick>) -> FallbackOutcome {
        if ticks.is_empty() {
            self.sink
                .record_event("Fallback quote fetch returned no quotes", Severity::Warning)
                .await;
            return FallbackOutcome::Empty;
        }

        let count = ticks.len();
        self.on_fallback_quotes(ticks).await;
        self.sink
            .record_event(
                &format!("Fallback quotes received for {count} symbols"),
                Severity::Info,
            )
            .await;
        FallbackOutcome::Delivered(count)
    }

    /// Re-send the push subscription; failure is not fatal here.
    async fn resubscribe(&self) {
        match self.feed.subscribe(&self.symbols).await {
            Ok(()) => debug!("Refreshed push subscription"),
            Err(e) => {
                self.sink
                    .record_event(
                        &format!("Push subscription refresh failed: {e}"),
                        Severity::Warning,
                    )
                    .await;
            }
        }
    }

    async fn on_transition(&mut self, transition: Transition, silence_ms: u64) {
        match transition {
            Transition::WentStale => {
                self.status.stale_transitions += 1;
                warn!(
                    silence_s = silence_ms / 1000,
                    socket_open = self.feed.is_connected(),
                    "Push feed stale"
                );
                self.sink
                    .record_event(
                        &format!(
                            "No ticks for {}s, falling back to REST polling",
                            silence_ms / 1000
                        ),
                        Severity::Warning,
                    )
                    .await;
            }
            Transition::Recovered => {
                self.sink
                    .record_event("Tick flow resumed, feed marked live", Severity::Info)
                    .await;
            }
        }
    }

    fn publish(&mut self) {
        self.status.state = self.tracker.state();
        self.status.last_tick_ms = self.tracker.last_tick_ms();
        self.status_tx.send_replace(self.status);
    }
}
