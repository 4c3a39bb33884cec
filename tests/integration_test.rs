//! Integration Tests - Supervisor Against Mocked Ports
//!
//! Drives `FeedSupervisor` through its liveness cycles with mockall
//! doubles for the push feed, the quote fetcher and the sink. Time is
//! passed explicitly, so every scenario is deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use tokio::sync::{broadcast, mpsc};

use tick_feed_supervisor::domain::{FeedState, Symbol, Tick, TickSource, now_ms};
use tick_feed_supervisor::ports::{
    FeedError, FetchError, PushFeed, QuoteFetcher, Quotes, Severity, Sink,
};
use tick_feed_supervisor::usecases::{
    FallbackOutcome, FeedSupervisor, SupervisorError, SupervisorSettings,
};

// ---- Mock Definitions ----

mock! {
    pub Feed {}

    #[async_trait::async_trait]
    impl PushFeed for Feed {
        async fn subscribe(&self, symbols: &[Symbol]) -> Result<(), FeedError>;
        async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<(), FeedError>;
        fn is_connected(&self) -> bool;
    }
}

mock! {
    pub Fetcher {}

    #[async_trait::async_trait]
    impl QuoteFetcher for Fetcher {
        async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<Quotes, FetchError>;
    }
}

mock! {
    pub TickSink {}

    #[async_trait::async_trait]
    impl Sink for TickSink {
        async fn record(&self, tick: &Tick);
        async fn record_event(&self, message: &str, severity: Severity);
    }
}

/// Sink that keeps everything it is given, for assertions on order.
#[derive(Default)]
struct RecordingSink {
    ticks: Mutex<Vec<Tick>>,
    events: Mutex<Vec<(String, Severity)>>,
}

impl RecordingSink {
    fn ticks(&self) -> Vec<Tick> {
        self.ticks.lock().unwrap().clone()
    }

    fn events_at(&self, severity: Severity) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == severity)
            .map(|(m, _)| m.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Sink for RecordingSink {
    async fn record(&self, tick: &Tick) {
        self.ticks.lock().unwrap().push(tick.clone());
    }

    async fn record_event(&self, message: &str, severity: Severity) {
        self.events.lock().unwrap().push((message.to_string(), severity));
    }
}

// ---- Helpers ----

const SECOND: u64 = 1_000;

fn symbols() -> Vec<Symbol> {
    ["NSE:SBIN-EQ", "NSE:INFY-EQ", "NSE:TCS-EQ"]
        .iter()
        .map(|s| Symbol::parse(s).unwrap())
        .collect()
}

fn settings(resubscribe: bool) -> SupervisorSettings {
    SupervisorSettings {
        timeout: Duration::from_secs(120),
        check_interval: Duration::from_secs(60),
        resubscribe_while_stale: resubscribe,
    }
}

fn quotes_at(ms: u64) -> Quotes {
    Quotes::complete(
        symbols()
            .into_iter()
            .map(|s| Tick::fallback(s, 100.0, Some(1), ms))
            .collect(),
    )
}

fn quiet_feed() -> MockFeed {
    let mut feed = MockFeed::new();
    feed.expect_subscribe().returning(|_| Ok(()));
    feed.expect_unsubscribe().returning(|_| Ok(()));
    feed.expect_is_connected().return_const(true);
    feed
}

fn supervisor<Q: QuoteFetcher>(
    fetcher: Q,
    sink: Arc<RecordingSink>,
) -> FeedSupervisor<MockFeed, Q, RecordingSink> {
    FeedSupervisor::new(
        Arc::new(quiet_feed()),
        Arc::new(fetcher),
        sink,
        symbols(),
        settings(false),
        0,
    )
    .unwrap()
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_silent_feed_goes_stale_and_fallback_resets_clock() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_quotes()
        .times(1)
        .returning(|_| Ok(quotes_at(121 * SECOND)));
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    assert_eq!(sup.state(), FeedState::Live);

    let outcome = sup.run_cycle(121 * SECOND).await;
    assert!(outcome.check.fetch);
    assert_eq!(outcome.check.state, FeedState::Stale);
    assert_eq!(outcome.fallback, Some(FallbackOutcome::Delivered(3)));
    assert_eq!(outcome.state, FeedState::Live);
    assert_eq!(sup.last_tick_ms(), 121 * SECOND);

    // 9s after the fallback ticks: still inside the timeout.
    let later = sup.run_cycle(130 * SECOND).await;
    assert_eq!(later.state, FeedState::Live);
    assert_eq!(later.fallback, None);

    let ticks = sink.ticks();
    assert_eq!(ticks.len(), 3);
    assert!(ticks.iter().all(|t| t.source == TickSource::Fallback));
    assert_eq!(sink.events_at(Severity::Warning).len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_keeps_stale_and_retries_next_cycle() {
    let mut fetcher = MockFetcher::new();
    let mut seq = mockall::Sequence::new();
    fetcher
        .expect_fetch_quotes()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(FetchError::Network("connection reset".into())));
    fetcher
        .expect_fetch_quotes()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(quotes_at(122 * SECOND)));
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    let first = sup.run_cycle(121 * SECOND).await;
    assert_eq!(first.fallback, Some(FallbackOutcome::Failed));
    assert_eq!(first.state, FeedState::Stale);

    let errors = sink.events_at(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("connection reset"));

    let second = sup.run_cycle(122 * SECOND).await;
    assert_eq!(second.fallback, Some(FallbackOutcome::Delivered(3)));
    assert_eq!(second.state, FeedState::Live);
    assert_eq!(sup.status().fallback_failures, 1);
    assert_eq!(sup.status().fallback_fetches, 2);
}

#[tokio::test]
async fn test_partial_fetch_delivers_ticks_and_warns() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_quotes().times(1).returning(|_| {
        let mut quotes = quotes_at(130 * SECOND);
        quotes.ticks.truncate(2);
        quotes.failed_batches = 1;
        Ok(quotes)
    });
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    let outcome = sup.run_cycle(130 * SECOND).await;

    assert_eq!(outcome.fallback, Some(FallbackOutcome::Delivered(2)));
    assert_eq!(outcome.state, FeedState::Live);
    assert_eq!(sink.ticks().len(), 2);
    assert!(
        sink.events_at(Severity::Warning)
            .iter()
            .any(|m| m.contains("1 batches failed"))
    );
    let status = sup.status();
    assert_eq!(status.partial_fetches, 1);
    assert_eq!(status.fallback_failures, 0);
}

#[tokio::test]
async fn test_no_fetch_while_live() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_quotes().never();
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    for t in [60, 119] {
        let outcome = sup.run_cycle(t * SECOND).await;
        assert!(!outcome.check.fetch);
        assert_eq!(outcome.state, FeedState::Live);
    }
}

#[tokio::test]
async fn test_same_instant_check_is_idempotent() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_quotes()
        .times(1)
        .returning(|_| Ok(Quotes::default()));
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    let first = sup.run_cycle(200 * SECOND).await;
    let again = sup.run_cycle(200 * SECOND).await;

    assert_eq!(first.fallback, Some(FallbackOutcome::Empty));
    assert_eq!(again.fallback, None);
    assert_eq!(again.state, FeedState::Stale);
    assert_eq!(sup.status().stale_transitions, 1);
}

#[tokio::test]
async fn test_push_tick_recovers_stale_feed() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_quotes()
        .returning(|_| Err(FetchError::RateLimited));
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    sup.run_cycle(150 * SECOND).await;
    assert_eq!(sup.state(), FeedState::Stale);

    let sbin = Symbol::parse("NSE:SBIN-EQ").unwrap();
    sup.on_push_tick(Tick::push(sbin, 812.5, None, 151 * SECOND)).await;

    assert_eq!(sup.state(), FeedState::Live);
    assert_eq!(sup.last_tick_ms(), 151 * SECOND);
    assert!(
        sink.events_at(Severity::Info)
            .iter()
            .any(|m| m.contains("resumed"))
    );
}

#[tokio::test]
async fn test_older_fallback_ticks_do_not_rewind_clock_or_recover() {
    let mut fetcher = MockFetcher::new();
    // Vendor echoes quotes stamped before the last push tick.
    fetcher
        .expect_fetch_quotes()
        .returning(|_| Ok(quotes_at(5 * SECOND)));
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, Arc::clone(&sink));

    let sbin = Symbol::parse("NSE:SBIN-EQ").unwrap();
    sup.on_push_tick(Tick::push(sbin, 1.0, None, 10 * SECOND)).await;

    let outcome = sup.run_cycle(200 * SECOND).await;
    assert_eq!(outcome.fallback, Some(FallbackOutcome::Delivered(3)));
    assert_eq!(outcome.state, FeedState::Stale);
    assert_eq!(sup.last_tick_ms(), 10 * SECOND);

    // Every tick still reaches the sink.
    assert_eq!(sink.ticks().len(), 4);
}

#[tokio::test]
async fn test_resubscribe_while_stale() {
    let mut feed = MockFeed::new();
    feed.expect_subscribe()
        .withf(|symbols| symbols.len() == 3)
        .times(2)
        .returning(|_| Ok(()));
    feed.expect_unsubscribe().returning(|_| Ok(()));
    feed.expect_is_connected().return_const(false);

    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_quotes().returning(|_| Ok(Quotes::default()));

    let mut sink = MockTickSink::new();
    sink.expect_record().never();
    sink.expect_record_event().returning(|_, _| ());

    let mut sup = FeedSupervisor::new(
        Arc::new(feed),
        Arc::new(fetcher),
        Arc::new(sink),
        symbols(),
        settings(true),
        0,
    )
    .unwrap();

    sup.start().await.unwrap();
    sup.run_cycle(121 * SECOND).await;
}

#[tokio::test]
async fn test_refused_initial_subscription_is_fatal() {
    let mut feed = MockFeed::new();
    feed.expect_subscribe()
        .times(1)
        .returning(|_| Err(FeedError::SubscriptionLimit { requested: 3, limit: 2 }));

    let mut sink = MockTickSink::new();
    sink.expect_record_event().never();

    let sup = FeedSupervisor::new(
        Arc::new(feed),
        Arc::new(MockFetcher::new()),
        Arc::new(sink),
        symbols(),
        settings(false),
        0,
    )
    .unwrap();

    let err = sup.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Subscription(FeedError::SubscriptionLimit { .. })));
}

#[tokio::test]
async fn test_empty_symbol_set_rejected() {
    let result = FeedSupervisor::new(
        Arc::new(MockFeed::new()),
        Arc::new(MockFetcher::new()),
        Arc::new(MockTickSink::new()),
        Vec::new(),
        settings(false),
        0,
    );
    assert!(matches!(result, Err(SupervisorError::NoSymbols)));
}

#[tokio::test]
async fn test_stop_unsubscribes_and_records_event() {
    let mut feed = MockFeed::new();
    feed.expect_unsubscribe()
        .times(1)
        .returning(|_| Err(FeedError::Closed));

    let mut sink = MockTickSink::new();
    sink.expect_record_event()
        .withf(|message, severity| message == "Feed supervisor stopped" && *severity == Severity::Info)
        .times(1)
        .returning(|_, _| ());

    let sup = FeedSupervisor::new(
        Arc::new(feed),
        Arc::new(MockFetcher::new()),
        Arc::new(sink),
        symbols(),
        settings(false),
        0,
    )
    .unwrap();

    sup.stop().await;
}

#[tokio::test]
async fn test_status_channel_publishes_state() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_quotes()
        .returning(|_| Err(FetchError::Auth("token expired".into())));
    let sink = Arc::new(RecordingSink::default());
    let mut sup = supervisor(fetcher, sink);
    let status_rx = sup.subscribe_status();

    sup.run_cycle(125 * SECOND).await;

    let status = *status_rx.borrow();
    assert_eq!(status.state, FeedState::Stale);
    assert_eq!(status.fallback_failures, 1);
    assert_eq!(status.stale_transitions, 1);
}

#[tokio::test]
async fn test_run_loop_drains_push_ticks_until_shutdown() {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_quotes().never();
    let sink = Arc::new(RecordingSink::default());
    let mut sup = FeedSupervisor::new(
        Arc::new(quiet_feed()),
        Arc::new(fetcher),
        Arc::clone(&sink),
        symbols(),
        settings(false),
        now_ms(),
    )
    .unwrap();

    let (tick_tx, tick_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(async move {
        sup.run(tick_rx, shutdown_rx).await;
        sup
    });

    let sbin = Symbol::parse("NSE:SBIN-EQ").unwrap();
    for i in 0..3 {
        let tick = Tick::push(sbin.clone(), 800.0 + f64::from(i), None, now_ms());
        tick_tx.send(tick).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown_tx.send(()).unwrap();

    let sup = handle.await.unwrap();
    assert_eq!(sup.status().push_ticks, 3);
    assert_eq!(sink.ticks().len(), 3);
    assert_eq!(sup.state(), FeedState::Live);
}
