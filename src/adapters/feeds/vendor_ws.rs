//! Vendor WebSocket Feed - Streaming Tick Source
//!
//! Connects to the vendor's market-data WebSocket, subscribes to the
//! configured symbols and pushes `Tick` values onto the supervisor's
//! channel. Implements the `PushFeed` port so the supervisor never
//! depends on transport details.
//!
//! Features:
//! - Subscription re-sent on every connect and after vendor errors
//! - Linear reconnect backoff; gives up after N consecutive failed connects
//! - Ticks for symbols outside the subscribed set are dropped
//! - Event-driven via tokio::select!

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::api::Credentials;
use crate::config::ApiConfig;
use crate::domain::{Symbol, Tick, now_ms};
use crate::ports::{FeedError, PushFeed};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push feed connection settings.
#[derive(Debug, Clone)]
pub struct WsFeedConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Largest symbol set one subscription may carry.
    pub max_symbols: usize,
    /// Base reconnect delay, multiplied by the attempt number.
    pub reconnect_delay: Duration,
    /// Consecutive failed connects before `run` returns an error.
    pub max_connect_attempts: u32,
}

impl From<&ApiConfig> for WsFeedConfig {
    fn from(api: &ApiConfig) -> Self {
        Self {
            url: api.ws_url.clone(),
            max_symbols: api.max_symbols_per_subscription,
            reconnect_delay: Duration::from_secs(api.reconnect_delay_seconds),
            max_connect_attempts: api.max_connect_attempts,
        }
    }
}

/// Outbound subscription request.
#[derive(Debug, Serialize)]
struct SubscriptionRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    symbols: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_type: Option<&'static str>,
}

impl<'a> SubscriptionRequest<'a> {
    fn subscribe(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        Self {
            kind: "subscribe",
            symbols: symbols.into_iter().map(Symbol::as_str).collect(),
            data_type: Some("SymbolData"),
        }
    }

    fn unsubscribe(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        Self {
            kind: "unsubscribe",
            symbols: symbols.into_iter().map(Symbol::as_str).collect(),
            data_type: None,
        }
    }
}

/// Raw inbound message. Tick updates carry `symbol` + `ltp`; errors
/// carry `type: "error"` or `s: "error"`; anything else is an ack.
#[derive(Debug, Deserialize)]
struct WsMessage {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    s: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    ltp: Option<f64>,
    #[serde(default)]
    vol_traded: Option<f64>,
    /// Exchange feed time (Unix seconds).
    #[serde(default)]
    exch_feed_time: Option<i64>,
}

/// Classified inbound message.
#[derive(Debug, PartialEq)]
enum Inbound {
    Tick(Tick),
    VendorError(String),
    Ignored,
}

/// Classify one text frame against the subscribed set.
fn parse_message(text: &str, subscribed: &BTreeSet<Symbol>, observed_ms: u64) -> Result<Inbound> {
    let msg: WsMessage = serde_json::from_str(text).context("Invalid feed JSON")?;

    if msg.kind.as_deref() == Some("error") || msg.s.as_deref() == Some("error") {
        return Ok(Inbound::VendorError(msg.message.unwrap_or_default()));
    }

    let (Some(raw), Some(ltp)) = (msg.symbol, msg.ltp) else {
        return Ok(Inbound::Ignored);
    };
    let Ok(symbol) = Symbol::parse(&raw) else {
        return Ok(Inbound::Ignored);
    };
    if !subscribed.contains(&symbol) {
        return Ok(Inbound::Ignored);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let volume = msg.vol_traded.filter(|v| *v >= 0.0).map(|v| v as u64);
    let exchange_ts_ms = msg
        .exch_feed_time
        .and_then(|s| u64::try_from(s).ok())
        .and_then(|s| s.checked_mul(1000));

    Ok(Inbound::Tick(
        Tick::push(symbol, ltp, volume, observed_ms).with_exchange_time(exchange_ts_ms),
    ))
}

/// Commands from the `PushFeed` methods to the connection task.
#[derive(Debug)]
enum WsCommand {
    Subscribe(Vec<Symbol>),
    Unsubscribe(Vec<Symbol>),
}

/// Vendor WebSocket feed adapter.
pub struct VendorWsFeed {
    /// Connection settings.
    config: WsFeedConfig,
    /// Credentials for the Authorization header.
    credentials: Arc<Credentials>,
    /// Where parsed ticks go.
    tick_tx: mpsc::Sender<Tick>,
    /// Symbols currently subscribed (re-sent on every connect).
    subscribed: RwLock<BTreeSet<Symbol>>,
    /// Command channel to the connection task.
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    /// Receiver half, taken by `run`.
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<WsCommand>>>,
    /// Whether a socket is currently open.
    connected: AtomicBool,
}

impl VendorWsFeed {
    /// Create a feed that delivers ticks onto `tick_tx`.
    pub fn new(config: WsFeedConfig, credentials: Arc<Credentials>, tick_tx: mpsc::Sender<Tick>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        Self {
            config,
            credentials,
            tick_tx,
            subscribed: RwLock::new(BTreeSet::new()),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            connected: AtomicBool::new(false),
        }
    }

    /// Run the WebSocket connection loop with reconnect.
    ///
    /// Returns `Ok` on shutdown, or an error after `max_connect_attempts`
    /// consecutive failed connects.
    #[instrument(skip(self, shutdown_rx), fields(url = %self.config.url))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut cmd_rx = self
            .cmd_rx
            .lock()
            .await
            .take()
            .context("Push feed is already running")?;

        info!("Connecting to vendor WebSocket");
        let mut failures = 0u32;

        loop {
            let attempt = match self.connect().await {
                Ok(ws) => {
                    failures = 0;
                    match self.stream(ws, &mut cmd_rx, &mut shutdown_rx).await {
                        Ok(()) => {
                            info!("Vendor feed shut down gracefully");
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(error = %e, "Vendor WS disconnected");
                            1
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    error!(
                        error = %e,
                        attempt = failures,
                        max = self.config.max_connect_attempts,
                        "Vendor WS connect failed"
                    );
                    if failures >= self.config.max_connect_attempts {
                        return Err(e.context(format!(
                            "Failed to connect vendor WebSocket after {failures} attempts"
                        )));
                    }
                    failures
                }
            };

            let delay = self.config.reconnect_delay * attempt;
            info!(delay_s = delay.as_secs(), "Reconnecting vendor WS");
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                () = tokio::time::sleep(delay) => {},
            }
        }
    }

    async fn connect(&self) -> Result<WsStream> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .context("Invalid WebSocket URL")?;
        let auth = HeaderValue::from_str(&self.credentials.authorization())
            .context("Credentials are not a valid header value")?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws, _) = connect_async(request)
            .await
            .context("Vendor WebSocket connection failed")?;
        Ok(ws)
    }

    /// Single session: subscribe, stream until error or shutdown.
    async fn stream(
        &self,
        ws: WsStream,
        cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let (mut write, mut read) = ws.split();
        self.connected.store(true, Ordering::Relaxed);
        info!("Vendor WebSocket connected");

        // The full set is sent below; anything queued while down is redundant.
        while cmd_rx.try_recv().is_ok() {}

        let result: Result<()> = async {
            self.send_full_subscription(&mut write).await?;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("Shutdown signal in vendor feed");
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                    Some(cmd) = cmd_rx.recv() => {
                        let payload = match &cmd {
                            WsCommand::Subscribe(s) => serde_json::to_string(&SubscriptionRequest::subscribe(s))?,
                            WsCommand::Unsubscribe(s) => serde_json::to_string(&SubscriptionRequest::unsubscribe(s))?,
                        };
                        write.send(Message::Text(payload)).await.context("Failed to send command")?;
                        debug!(?cmd, "Feed command sent");
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match self.handle_message(&text).await {
                                    Ok(true) => self.send_full_subscription(&mut write).await?,
                                    Ok(false) => {}
                                    Err(e) => debug!(error = %e, "Failed to parse feed message"),
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {
                                // Pong is handled automatically by tungstenite
                                debug!("Vendor ping received");
                            }
                            Some(Ok(Message::Close(frame))) => {
                                return Err(anyhow::anyhow!("Vendor WS closed: {frame:?}"));
                            }
                            Some(Err(e)) => {
                                return Err(anyhow::anyhow!("Vendor WS error: {e}"));
                            }
                            None => {
                                return Err(anyhow::anyhow!("Vendor WS stream ended"));
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        .await;

        self.connected.store(false, Ordering::Relaxed);
        result
    }

    async fn send_full_subscription<W>(&self, write: &mut W) -> Result<()>
    where
        W: futures_util::Sink<Message> + Unpin,
        W::Error: std::error::Error + Send + Sync + 'static,
    {
        let subscribed = self.subscribed.read().await;
        if subscribed.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_string(&SubscriptionRequest::subscribe(subscribed.iter()))?;
        write
            .send(Message::Text(payload))
            .await
            .context("Failed to send subscription")?;
        info!(symbols = subscribed.len(), "Subscription request sent");
        Ok(())
    }

    /// Parse one frame and forward ticks. Returns `true` when the vendor
    /// reported an error and the subscription should be re-sent.
    async fn handle_message(&self, text: &str) -> Result<bool> {
        let inbound = {
            let subscribed = self.subscribed.read().await;
            parse_message(text, &subscribed, now_ms())?
        };

        match inbound {
            Inbound::Tick(tick) => {
                debug!(symbol = %tick.symbol, ltp = tick.last_price, "Tick received");
                if self.tick_tx.send(tick).await.is_err() {
                    debug!("Tick receiver dropped");
                }
                Ok(false)
            }
            Inbound::VendorError(message) => {
                error!(message = %message, "Vendor WS error, resubscribing");
                Ok(true)
            }
            Inbound::Ignored => Ok(false),
        }
    }
}

#[async_trait]
impl PushFeed for VendorWsFeed {
    async fn subscribe(&self, symbols: &[Symbol]) -> Result<(), FeedError> {
        if symbols.is_empty() {
            return Err(FeedError::EmptySubscription);
        }

        let incoming: BTreeSet<Symbol> = symbols.iter().cloned().collect();
        let mut subscribed = self.subscribed.write().await;
        let requested = subscribed.union(&incoming).count();
        if requested > self.config.max_symbols {
            return Err(FeedError::SubscriptionLimit {
                requested,
                limit: self.config.max_symbols,
            });
        }
        subscribed.extend(incoming);
        drop(subscribed);

        self.cmd_tx
            .send(WsCommand::Subscribe(symbols.to_vec()))
            .map_err(|_| FeedError::Closed)
    }

    async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<(), FeedError> {
        {
            let mut subscribed = self.subscribed.write().await;
            for symbol in symbols {
                subscribed.remove(symbol);
            }
        }
        // A closed task has nothing left to unsubscribe from.
        let _ = self.cmd_tx.send(WsCommand::Unsubscribe(symbols.to_vec()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
