//! Tick Feed Supervisor - Entry Point
//!
//! Wires the vendor push feed, the REST fallback and the tick sink
//! around the feed supervisor. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (first CLI argument, default `config.toml`) + validate
//! 2. Init tracing (console + daily-rolling JSON file)
//! 3. Load the symbol universe and vendor credentials
//! 4. Create VendorClient + RestQuoteFetcher, validate the token with one quote
//! 5. Create VendorWsFeed (implements PushFeed) and spawn its connection task
//! 6. Create LogSink (implements Sink)
//! 7. Subscribe the full symbol set (fatal on refusal)
//! 8. Spawn metrics (/metrics) and health (/live + /ready) servers,
//!    readiness also checking the tick journal
//! 9. Spawn the supervisor loop
//! 10. Wait for SIGINT → graceful shutdown (unsubscribe→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use tick_feed_supervisor::adapters::api::{
    Credentials, RestQuoteFetcher, VendorClient, VendorClientConfig,
};
use tick_feed_supervisor::adapters::feeds::{VendorWsFeed, WsFeedConfig};
use tick_feed_supervisor::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use tick_feed_supervisor::adapters::persistence::LogSink;
use tick_feed_supervisor::config::{self, AppConfig};
use tick_feed_supervisor::domain::now_ms;
use tick_feed_supervisor::usecases::{FeedSupervisor, SupervisorSettings};

/// Capacity of the push tick channel.
const TICK_CHANNEL_CAPACITY: usize = 10_000;

/// How often journal write failures are copied into the metrics registry.
const JOURNAL_SAMPLE_PERIOD: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize logging (guard flushes the file on drop) ──
    let _log_guard = init_logging(&config)?;

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        timeout_s = config.feed.timeout_seconds,
        check_interval_s = config.feed.check_interval_seconds,
        "Starting tick feed supervisor"
    );

    // ── 3. Symbols and credentials ──────────────────────────
    let symbols = config::symbols::load_symbols(
        Path::new(&config.feed.symbols_file),
        &config.feed.blacklist,
    )
    .context("Failed to load symbol list")?;

    let credentials = Arc::new(
        Credentials::load(
            &config.credentials.client_id,
            Path::new(&config.credentials.token_file),
        )
        .context("Failed to load vendor credentials")?,
    );

    // ── 4. REST client + fallback fetcher ───────────────────
    let client = Arc::new(
        VendorClient::new(
            Arc::clone(&credentials),
            VendorClientConfig::from(&config.api),
        )
        .context("Failed to create vendor client")?,
    );
    let fetcher = Arc::new(RestQuoteFetcher::new(
        Arc::clone(&client),
        config.api.quote_batch_size,
    ));
    let probe = symbols.first().context("Symbol list is empty")?;
    fetcher
        .validate(probe)
        .await
        .context("Access token validation failed")?;
    info!(probe = %probe, "Access token validated");

    // ── 5. Push feed ────────────────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);

    let feed = Arc::new(VendorWsFeed::new(
        WsFeedConfig::from(&config.api),
        Arc::clone(&credentials),
        tick_tx,
    ));
    let feed_shutdown = shutdown_tx.subscribe();
    let feed_ref = Arc::clone(&feed);
    let feed_handle = tokio::spawn(async move {
        if let Err(e) = feed_ref.run(feed_shutdown).await {
            error!(error = %e, "Push feed task failed, fallback polling continues");
        }
    });

    // ── 6. Sink ─────────────────────────────────────────────
    let sink = Arc::new(
        LogSink::new(
            &config.persistence.data_dir,
            config.persistence.record_ticks,
        )
        .await
        .context("Failed to create tick sink")?,
    );

    // ── 7. Supervisor + initial subscription ────────────────
    let mut supervisor = FeedSupervisor::new(
        Arc::clone(&feed),
        fetcher,
        Arc::clone(&sink),
        symbols,
        SupervisorSettings::from(&config.feed),
        now_ms(),
    )?;
    supervisor
        .start()
        .await
        .context("Initial push subscription failed")?;

    // ── 8. Metrics and health servers ───────────────────────
    let mut server_handles = Vec::new();
    if config.metrics.enabled {
        let metrics = Arc::new(MetricsRegistry::new()?);
        server_handles.push(tokio::spawn(
            Arc::clone(&metrics).track(supervisor.subscribe_status(), shutdown_tx.subscribe()),
        ));
        server_handles.push(tokio::spawn(Arc::clone(&metrics).track_journal(
            Arc::clone(&sink),
            JOURNAL_SAMPLE_PERIOD,
            shutdown_tx.subscribe(),
        )));

        let bind_address = config.metrics.bind_address.clone();
        let metrics_shutdown = shutdown_tx.subscribe();
        server_handles.push(tokio::spawn(async move {
            if let Err(e) = metrics.serve(bind_address, metrics_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        }));
    }

    let health = HealthServer::new(
        Arc::new(HealthState::new(supervisor.subscribe_status()).with_sink(sink)),
        config.metrics.health_port,
    );
    let health_shutdown = shutdown_tx.subscribe();
    server_handles.push(tokio::spawn(async move {
        if let Err(e) = health.run(health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    }));

    // ── 9. Supervisor loop ──────────────────────────────────
    let supervisor_shutdown = shutdown_tx.subscribe();
    let supervisor_handle = tokio::spawn(async move {
        supervisor.run(tick_rx, supervisor_shutdown).await;
    });

    info!("All tasks spawned, supervisor is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for SIGINT, shutting down");
    } else {
        info!("SIGINT received, initiating graceful shutdown");
    }

    let _ = shutdown_tx.send(());

    // Supervisor unsubscribes on its way out, so give it the longest window.
    if tokio::time::timeout(Duration::from_secs(10), supervisor_handle)
        .await
        .is_err()
    {
        warn!("Supervisor did not stop within 10s");
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), feed_handle).await;
    for handle in server_handles {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Console layer plus a daily-rolling JSON file under `log_dir`.
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.persistence.log_dir)
        .with_context(|| format!("Failed to create log dir {}", config.persistence.log_dir))?;

    let file_appender = tracing_appender::rolling::daily(&config.persistence.log_dir, "app.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.service.log_level))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer).json())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(guard)
}
