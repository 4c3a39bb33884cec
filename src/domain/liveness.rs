//! Feed liveness tracking.
//!
//! Pure state machine behind the supervisor: a cached `Live`/`Stale`
//! view of `now - last_tick >= timeout`, re-evaluated on a fixed cadence
//! and flipped back to `Live` by any observed tick. No clocks are read
//! here; every call takes the timestamp it should evaluate against.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Whether the push feed is currently trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    /// Ticks are arriving within the timeout. No polling.
    Live,
    /// Silence exceeded the timeout. Poll the REST fallback each cycle.
    Stale,
}

impl FeedState {
    /// Label used in metrics and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change produced by a check or an observed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `Live → Stale`.
    WentStale,
    /// `Stale → Live`.
    Recovered,
}

impl Transition {
    /// State entered by this transition.
    pub const fn target(self) -> FeedState {
        match self {
            Self::WentStale => FeedState::Stale,
            Self::Recovered => FeedState::Live,
        }
    }
}

/// Result of one periodic liveness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessCheck {
    /// State after the evaluation.
    pub state: FeedState,
    /// Transition fired by this evaluation, if any.
    pub transition: Option<Transition>,
    /// Whether a fallback fetch is due this cycle.
    pub fetch: bool,
    /// Milliseconds since the last observed tick.
    pub silence_ms: u64,
}

/// Snapshot of supervisor state and counters, published after every
/// event for health probes and metrics export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    /// Current feed state.
    pub state: FeedState,
    /// Last-tick clock (Unix ms).
    pub last_tick_ms: u64,
    /// Push ticks forwarded to the sink.
    pub push_ticks: u64,
    /// Fallback ticks forwarded to the sink.
    pub fallback_ticks: u64,
    /// Fallback fetches issued.
    pub fallback_fetches: u64,
    /// Fallback fetches that failed.
    pub fallback_failures: u64,
    /// Fallback fetches where some requests failed.
    pub partial_fetches: u64,
    /// `Live → Stale` transitions.
    pub stale_transitions: u64,
}

impl FeedStatus {
    /// Initial status for a supervisor started at `started_at_ms`.
    pub const fn new(started_at_ms: u64) -> Self {
        Self {
            state: FeedState::Live,
            last_tick_ms: started_at_ms,
            push_ticks: 0,
            fallback_ticks: 0,
            fallback_fetches: 0,
            fallback_failures: 0,
            partial_fetches: 0,
            stale_transitions: 0,
        }
    }
}

/// Tracks `FeedState` and the last-tick clock.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    /// Silence threshold in milliseconds.
    timeout_ms: u64,
    /// Unix ms of the most recent tick from any source. Never regresses.
    last_tick_ms: u64,
    /// Cached state from the most recent evaluation or tick.
    state: FeedState,
    /// `now` of the last check that requested a fetch.
    last_fetch_check_ms: Option<u64>,
}

impl LivenessTracker {
    /// Start optimistic: `Live`, clock set to `started_at_ms`.
    pub fn new(timeout: Duration, started_at_ms: u64) -> Self {
        Self {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            last_tick_ms: started_at_ms,
            state: FeedState::Live,
            last_fetch_check_ms: None,
        }
    }

    /// Current cached state.
    pub const fn state(&self) -> FeedState {
        self.state
    }

    /// Most recent tick time observed (or the start time).
    pub const fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }

    /// Configured timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Advance the clock to `tick_ms` if it is newer.
    ///
    /// Returns `true` when the clock moved forward.
    pub fn observe(&mut self, tick_ms: u64) -> bool {
        if tick_ms > self.last_tick_ms {
            self.last_tick_ms = tick_ms;
            true
        } else {
            false
        }
    }

    /// Mark the feed live, returning `Recovered` if it was stale.
    pub fn mark_live(&mut self) -> Option<Transition> {
        match self.state {
            FeedState::Live => None,
            FeedState::Stale => {
                self.state = FeedState::Live;
                Some(Transition::Recovered)
            }
        }
    }

    /// Evaluate staleness at `now_ms`.
    ///
    /// A second call with the same `now_ms` and no intervening tick
    /// returns the same state and does not request another fetch.
    pub fn check(&mut self, now_ms: u64) -> LivenessCheck {
        let silence_ms = now_ms.saturating_sub(self.last_tick_ms);

        if silence_ms >= self.timeout_ms {
            let transition = match self.state {
                FeedState::Live => Some(Transition::WentStale),
                FeedState::Stale => None,
            };
            self.state = FeedState::Stale;

            let fetch = self.last_fetch_check_ms != Some(now_ms);
            if fetch {
                self.last_fetch_check_ms = Some(now_ms);
            }

            LivenessCheck {
                state: self.state,
                transition,
                fetch,
                silence_ms,
            }
        } else {
            LivenessCheck {
                state: self.state,
                transition: self.mark_live(),
                fetch: false,
                silence_ms,
            }
        }
    }
}
