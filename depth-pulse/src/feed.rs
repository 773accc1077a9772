/// WebSocket depth feed client
///
/// Connects to the exchange's partial depth stream, forwards every text frame unparsed, keeps
/// the connection alive with pings and reconnects with bounded exponential backoff.
///
/// The feed never touches a [`DepthEngine`](crate::DepthEngine) directly: [`pump`] drains its
/// events into a [`SharedEngine`].

use crate::{engine::SharedEngine, types::ConnectionStatus};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Binance BTCUSDT 20-level partial depth at 100ms.
pub const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/ws/btcusdt@depth20@100ms";

/// Shortest accepted ping interval; `tokio::time::interval` rejects a zero period.
pub const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded exponential backoff between reconnection attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
    /// Consecutive failures tolerated before giving up, `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based): `initial × multiplier^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// True if retry number `attempt` (0-based) is permitted.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Depth feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket stream URL
    pub url: String,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Backoff between reconnection attempts
    pub reconnect: ReconnectPolicy,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            ping_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            channel_buffer_size: 1000,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Default configuration with the URL overridden by `DEPTH_WS_URL`
    pub fn from_env() -> Self {
        std::env::var("DEPTH_WS_URL")
            .map(Self::new)
            .unwrap_or_default()
    }

    /// Set ping interval (minimum [`MIN_PING_INTERVAL`])
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(MIN_PING_INTERVAL);
        self
    }

    /// Set reconnect policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size.max(1);
        self
    }
}

/// Events emitted by [`DepthFeed`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Raw text frame, expected to hold one depth update
    Message(String),
    /// Connection status transition
    Status(ConnectionStatus),
}

/// WebSocket client for the depth stream
pub struct DepthFeed {
    config: FeedConfig,
    tx: mpsc::Sender<FeedEvent>,
    rx: mpsc::Receiver<FeedEvent>,
}

impl DepthFeed {
    /// Create a new feed with default configuration
    pub fn new() -> Self {
        Self::with_config(FeedConfig::default())
    }

    /// Create a new feed with custom configuration
    pub fn with_config(config: FeedConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer_size.max(1));
        Self { config, tx, rx }
    }

    /// Spawn the connection task and return the event receiver.
    ///
    /// Dropping the receiver stops the task.
    pub fn start(self) -> mpsc::Receiver<FeedEvent> {
        let Self { config, tx, rx } = self;

        tokio::spawn(async move {
            run_feed_loop(config, tx).await;
        });

        rx
    }
}

impl Default for DepthFeed {
    fn default() -> Self {
        Self::new()
    }
}

enum SessionEnd {
    Reconnect,
    Stop,
}

/// Main connection loop with auto-reconnect
async fn run_feed_loop(config: FeedConfig, tx: mpsc::Sender<FeedEvent>) {
    info!(url = %config.url, "starting depth feed");

    let mut attempt: u32 = 0;

    loop {
        if tx
            .send(FeedEvent::Status(ConnectionStatus::Connecting))
            .await
            .is_err()
        {
            return;
        }

        match connect_async(&config.url).await {
            Ok((ws_stream, _)) => {
                info!(url = %config.url, "connected to depth feed");
                attempt = 0;

                if tx
                    .send(FeedEvent::Status(ConnectionStatus::Live))
                    .await
                    .is_err()
                {
                    return;
                }

                let (mut write, mut read) = ws_stream.split();
                let mut ping = tokio::time::interval(config.ping_interval.max(MIN_PING_INTERVAL));
                // First tick completes immediately
                ping.tick().await;

                let end = loop {
                    tokio::select! {
                        _ = ping.tick() => {
                            if write.send(Message::Ping(vec![].into())).await.is_err() {
                                debug!("failed to send ping, connection likely dead");
                                break SessionEnd::Reconnect;
                            }
                        }
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                let payload: &str = &text;
                                if tx.send(FeedEvent::Message(payload.to_owned())).await.is_err() {
                                    warn!("event receiver dropped, stopping depth feed");
                                    break SessionEnd::Stop;
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(?frame, "server closed connection");
                                break SessionEnd::Reconnect;
                            }
                            Some(Ok(_)) => {
                                // Ping/Pong/Binary: tungstenite answers pings itself
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                break SessionEnd::Reconnect;
                            }
                            None => {
                                info!("depth stream ended");
                                break SessionEnd::Reconnect;
                            }
                        }
                    }
                };

                if let SessionEnd::Stop = end {
                    return;
                }
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", config.url, e);
            }
        }

        if tx
            .send(FeedEvent::Status(ConnectionStatus::Disconnected))
            .await
            .is_err()
        {
            return;
        }

        if !config.reconnect.allows(attempt) {
            warn!(attempts = attempt, "reconnect attempts exhausted, stopping depth feed");
            return;
        }

        let delay = config.reconnect.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        debug!(?delay, attempt, "waiting before reconnecting");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tx.closed() => return,
        }
    }
}

/// Drain feed events into the engine until the feed closes.
///
/// The engine lock is taken once per event, so each update runs the full pipeline under a
/// single lock and readers never observe a half-applied update.
pub async fn pump(mut events: mpsc::Receiver<FeedEvent>, engine: SharedEngine) {
    while let Some(event) = events.recv().await {
        let mut engine = engine.lock().await;
        match event {
            FeedEvent::Message(text) => {
                if let Err(error) = engine.process_text(&text) {
                    if !error.is_recoverable() {
                        warn!(%error, "depth update failed");
                    }
                }
            }
            FeedEvent::Status(status) => engine.set_status(status),
        }
    }

    debug!("depth feed closed, pump exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DepthEngine, EngineConfig, DEPTH};

    #[test]
    fn test_config_builder() {
        let policy = ReconnectPolicy {
            max_attempts: Some(3),
            ..Default::default()
        };
        let config = FeedConfig::new("ws://localhost:8080")
            .with_ping_interval(Duration::from_secs(15))
            .with_reconnect(policy.clone())
            .with_channel_buffer_size(500);

        assert_eq!(config.url, "ws://localhost:8080");
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.reconnect, policy);
        assert_eq!(config.channel_buffer_size, 500);
    }

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.url, DEFAULT_FEED_URL);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.channel_buffer_size, 1000);
    }

    #[test]
    fn test_ping_interval_clamped() {
        struct TestCase {
            input: Duration,
            expected: Duration,
        }

        let tests = vec![
            TestCase {
                // TC0: zero would panic tokio::time::interval
                input: Duration::ZERO,
                expected: MIN_PING_INTERVAL,
            },
            TestCase {
                // TC1: below the minimum
                input: Duration::from_millis(1),
                expected: MIN_PING_INTERVAL,
            },
            TestCase {
                // TC2: regular interval kept
                input: Duration::from_secs(15),
                expected: Duration::from_secs(15),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = FeedConfig::default().with_ping_interval(test.input).ping_interval;
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[tokio::test]
    async fn test_zero_ping_interval_field_does_not_stop_feed() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text("{}".into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        // Public field bypasses the builder clamp
        let mut config = FeedConfig::new(format!("ws://{}", addr)).with_reconnect(ReconnectPolicy {
            max_attempts: Some(0),
            ..Default::default()
        });
        config.ping_interval = Duration::ZERO;
        let mut events = DepthFeed::with_config(config).start();

        let mut received = Vec::new();
        let collect = async {
            while let Some(event) = events.recv().await {
                received.push(event);
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect)
            .await
            .unwrap();

        assert!(received.contains(&FeedEvent::Message("{}".to_string())));
    }

    #[test]
    fn test_reconnect_delay() {
        struct TestCase {
            input: u32,
            expected: Duration,
        }

        let policy = ReconnectPolicy::default();

        let tests = vec![
            TestCase {
                // TC0: first retry uses the initial delay
                input: 0,
                expected: Duration::from_millis(500),
            },
            TestCase {
                // TC1: doubles per consecutive failure
                input: 3,
                expected: Duration::from_secs(4),
            },
            TestCase {
                // TC2: capped at max_delay
                input: 10,
                expected: Duration::from_secs(30),
            },
            TestCase {
                // TC3: huge attempt counts stay capped
                input: u32::MAX,
                expected: Duration::from_secs(30),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(policy.delay_for(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_reconnect_allows() {
        let unbounded = ReconnectPolicy::default();
        assert!(unbounded.allows(u32::MAX));

        let bounded = ReconnectPolicy {
            max_attempts: Some(2),
            ..Default::default()
        };
        assert!(bounded.allows(0));
        assert!(bounded.allows(1));
        assert!(!bounded.allows(2));
    }

    #[tokio::test]
    async fn test_pump_applies_events_in_order() {
        let engine = DepthEngine::shared(EngineConfig::default());
        let (tx, rx) = mpsc::channel(16);

        let update = r#"{"bids":[["100","1"]],"asks":[["101","2"]]}"#;
        tx.send(FeedEvent::Status(ConnectionStatus::Live)).await.unwrap();
        tx.send(FeedEvent::Message(update.to_string())).await.unwrap();
        tx.send(FeedEvent::Message("garbage".to_string())).await.unwrap();
        tx.send(FeedEvent::Status(ConnectionStatus::Disconnected))
            .await
            .unwrap();
        tx.send(FeedEvent::Status(ConnectionStatus::Live)).await.unwrap();
        drop(tx);

        pump(rx, engine.clone()).await;

        let engine = engine.lock().await;
        assert_eq!(engine.status(), ConnectionStatus::Live);
        assert_eq!(engine.snapshot().best_bid().unwrap().price, 100.0);
        assert_eq!(engine.snapshot().best_ask().unwrap().quantity, 2.0);
        assert_eq!(engine.stats().updates_applied, 1);
        assert_eq!(engine.stats().updates_rejected, 1);
        // Reconnect cleared the trail, the last snapshot stays readable
        assert!(engine.history().is_empty());
        assert_eq!(engine.level_at(DEPTH).map(|level| level.price), Some(101.0));
    }

    #[tokio::test]
    async fn test_feed_forwards_frames() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frame = r#"{"bids":[["100","1"]],"asks":[["101","1"]]}"#;

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(frame.into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let config = FeedConfig::new(format!("ws://{}", addr)).with_reconnect(ReconnectPolicy {
            max_attempts: Some(0),
            ..Default::default()
        });
        let mut events = DepthFeed::with_config(config).start();

        let mut received = Vec::new();
        let collect = async {
            while let Some(event) = events.recv().await {
                received.push(event);
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect)
            .await
            .unwrap();

        assert_eq!(
            received,
            vec![
                FeedEvent::Status(ConnectionStatus::Connecting),
                FeedEvent::Status(ConnectionStatus::Live),
                FeedEvent::Message(frame.to_string()),
                FeedEvent::Status(ConnectionStatus::Disconnected),
            ]
        );
    }
}
