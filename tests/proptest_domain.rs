//! Property-Based Tests - Liveness Tracker Invariants
//!
//! Uses `proptest` to verify that the liveness state machine keeps
//! its invariants across random tick and check sequences.

use std::time::Duration;

use proptest::prelude::*;

use tick_feed_supervisor::domain::{FeedState, LivenessTracker, Symbol, Transition};

/// One input to the tracker.
#[derive(Debug, Clone)]
enum Event {
    Tick(u64),
    Check(u64),
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0u64..1_000_000).prop_map(Event::Tick),
        (0u64..1_000_000).prop_map(Event::Check),
    ]
}

// ── Clock Properties ────────────────────────────────────────

proptest! {
    /// The last-tick clock never moves backwards.
    #[test]
    fn clock_is_monotonic(events in prop::collection::vec(event(), 1..200)) {
        let mut tracker = LivenessTracker::new(Duration::from_secs(120), 0);
        let mut previous = tracker.last_tick_ms();
        for e in events {
            match e {
                Event::Tick(ms) => { tracker.observe(ms); }
                Event::Check(now) => { tracker.check(now); }
            }
            prop_assert!(tracker.last_tick_ms() >= previous);
            previous = tracker.last_tick_ms();
        }
    }

    /// The clock equals the maximum tick observed (or the start time).
    #[test]
    fn clock_is_max_of_ticks(start in 0u64..1000, ticks in prop::collection::vec(0u64..1_000_000, 0..100)) {
        let mut tracker = LivenessTracker::new(Duration::from_secs(1), start);
        for t in &ticks {
            tracker.observe(*t);
        }
        let expected = ticks.iter().copied().max().unwrap_or(start).max(start);
        prop_assert_eq!(tracker.last_tick_ms(), expected);
    }
}

// ── State Properties ────────────────────────────────────────

proptest! {
    /// After a check, the state is exactly `now - last_tick >= timeout`.
    #[test]
    fn check_state_matches_silence(
        timeout_s in 1u64..600,
        events in prop::collection::vec(event(), 0..100),
        now in 0u64..2_000_000,
    ) {
        let timeout_ms = timeout_s * 1000;
        let mut tracker = LivenessTracker::new(Duration::from_secs(timeout_s), 0);
        for e in events {
            match e {
                Event::Tick(ms) => { tracker.observe(ms); }
                Event::Check(n) => { tracker.check(n); }
            }
        }
        let check = tracker.check(now);
        let stale = now.saturating_sub(tracker.last_tick_ms()) >= timeout_ms;
        prop_assert_eq!(check.state == FeedState::Stale, stale);
        prop_assert_eq!(tracker.state(), check.state);
    }

    /// Repeating a check at the same instant never fetches twice.
    #[test]
    fn same_instant_check_fetches_at_most_once(
        last_tick in 0u64..100_000,
        now in 0u64..1_000_000,
        repeats in 2usize..6,
    ) {
        let mut tracker = LivenessTracker::new(Duration::from_secs(120), 0);
        tracker.observe(last_tick);
        let first = tracker.check(now);
        for _ in 1..repeats {
            let again = tracker.check(now);
            prop_assert_eq!(again.state, first.state);
            prop_assert!(!again.fetch);
            prop_assert!(again.transition.is_none());
        }
    }

    /// Fetches are only ever requested while stale.
    #[test]
    fn fetch_implies_stale(events in prop::collection::vec(event(), 1..200)) {
        let mut tracker = LivenessTracker::new(Duration::from_secs(60), 0);
        for e in events {
            if let Event::Check(now) = e {
                let check = tracker.check(now);
                if check.fetch {
                    prop_assert_eq!(check.state, FeedState::Stale);
                }
                if let Some(t) = check.transition {
                    prop_assert_eq!(t.target(), check.state);
                }
            } else if let Event::Tick(ms) = e {
                tracker.observe(ms);
            }
        }
    }

    /// Marking live from stale always reports exactly one recovery.
    #[test]
    fn mark_live_reports_recovery_once(silence in 120_000u64..10_000_000) {
        let mut tracker = LivenessTracker::new(Duration::from_secs(120), 0);
        tracker.check(silence);
        prop_assert_eq!(tracker.state(), FeedState::Stale);
        prop_assert_eq!(tracker.mark_live(), Some(Transition::Recovered));
        prop_assert_eq!(tracker.mark_live(), None);
    }
}

// ── Symbol Properties ───────────────────────────────────────

proptest! {
    /// Any `EXCHANGE:TICKER` pair parses and splits back into its parts.
    #[test]
    fn symbol_parts_round_trip(exchange in "[A-Z]{2,5}", ticker in "[A-Z0-9&-]{1,20}") {
        let raw = format!("{exchange}:{ticker}");
        let symbol = Symbol::parse(&raw).unwrap();
        prop_assert_eq!(symbol.exchange(), exchange.as_str());
        prop_assert_eq!(symbol.ticker(), ticker.as_str());
        prop_assert_eq!(symbol.as_str(), raw.as_str());
    }
}
