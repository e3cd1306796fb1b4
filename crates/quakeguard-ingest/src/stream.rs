//! Persistent-connection ingestion strategy.
//!
//! The listener keeps one connection open, forwards events pushed over it,
//! and reconnects with a linear delay (`base × attempt`). After
//! `max_reconnect_attempts` consecutive failures it stops for the lifetime
//! of the process and the gateway falls back to polling only.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use quakeguard_core::config::StreamConfig;
use quakeguard_core::events::DomainEvent;
use quakeguard_core::types::{ConnectionState, IngestMode};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::IngestError;
use crate::feed::extract_reports;
use crate::normalizer::{EventNormalizer, NormalizeOutcome, RawEventReport};
use crate::sink::EventSink;

/// Message types that carry no event.
const CONTROL_TYPES: &[&str] = &["ping", "pong", "heartbeat", "welcome", "subscribed", "ack"];

pub const HEARTBEAT_MESSAGE: &str = r#"{"type":"ping"}"#;

/// One inbound frame, transport-independent.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

/// An open connection.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next inbound frame; `None` once the peer has gone away.
    async fn next_frame(&mut self) -> Option<Result<Frame, IngestError>>;
    async fn send_text(&mut self, text: &str) -> Result<(), IngestError>;
    async fn close(&mut self);
}

/// Opens connections to the event stream.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StreamConnection>, IngestError>;
}

/// tokio-tungstenite [`StreamConnector`].
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn StreamConnection>, IngestError> {
        info!(url = %self.url, "Connecting to event stream");
        let (ws, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| IngestError::Timeout(self.connect_timeout.as_secs()))?
        .map_err(|e| IngestError::Transport(e.to_string()))?;
        Ok(Box::new(WebSocketConnection { ws }))
    }
}

struct WebSocketConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, IngestError>> {
        let msg = self.ws.next().await?;
        Some(match msg {
            Ok(Message::Text(text)) => Ok(Frame::Text(text)),
            Ok(Message::Binary(data)) => Ok(Frame::Binary(data)),
            Ok(Message::Ping(_)) => Ok(Frame::Ping),
            Ok(Message::Pong(_)) => Ok(Frame::Pong),
            Ok(Message::Close(_)) => Ok(Frame::Close),
            Ok(Message::Frame(_)) => Ok(Frame::Binary(Vec::new())),
            Err(e) => Err(IngestError::Transport(e.to_string())),
        })
    }

    async fn send_text(&mut self, text: &str) -> Result<(), IngestError> {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| IngestError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Event reports carried by one text message.
///
/// Accepts a single event object, an array, a `result`/`data` envelope, or
/// an object wrapping one event under `data`. Control messages and anything
/// that is not JSON yield nothing.
pub fn parse_stream_message(text: &str) -> Vec<RawEventReport> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        debug!("Ignoring non-JSON stream frame");
        return Vec::new();
    };

    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        if CONTROL_TYPES.contains(&kind) {
            return Vec::new();
        }
    }
    if let Some(inner) = value.get("data").filter(|d| d.is_object()) {
        return vec![RawEventReport(inner.clone())];
    }
    if value.is_object() {
        return extract_reports(value.clone()).unwrap_or_else(|| vec![RawEventReport(value)]);
    }
    extract_reports(value).unwrap_or_default()
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed(IngestError),
}

/// Connection state machine over a [`StreamConnector`].
pub struct StreamListener {
    connector: Arc<dyn StreamConnector>,
    normalizer: EventNormalizer,
    sink: Arc<EventSink>,
    base_delay: Duration,
    max_attempts: u32,
    heartbeat: Duration,
    state: Mutex<ConnectionState>,
    /// Consecutive failures since the last successful open.
    attempts: AtomicU32,
    exhausted: AtomicBool,
    stopping: AtomicBool,
    shutdown: Notify,
}

impl StreamListener {
    pub fn new(config: &StreamConfig, connector: Arc<dyn StreamConnector>, sink: Arc<EventSink>) -> Self {
        Self {
            connector,
            normalizer: EventNormalizer::new(Arc::clone(sink.clock()), config.source_name.clone()),
            sink,
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            max_attempts: config.max_reconnect_attempts.max(1),
            heartbeat: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            state: Mutex::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            exhausted: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.state.lock() {
            Ok(s) => *s,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether the reconnect budget is spent. Permanent for this instance.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> IngestMode {
        if self.is_exhausted() {
            IngestMode::PollerOnly
        } else {
            IngestMode::Redundant
        }
    }

    fn set_state(&self, to: ConnectionState) {
        let from = {
            let mut guard = match self.state.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::replace(&mut *guard, to)
        };
        if from != to {
            debug!(%from, %to, "Stream state changed");
            self.sink.publish(DomainEvent::ConnectionStateChanged {
                from,
                to,
                timestamp: self.sink.clock().now(),
            });
        }
    }

    /// Connect and keep reconnecting until shutdown or exhaustion.
    ///
    /// A no-op once the listener is exhausted.
    pub async fn run(&self) {
        if self.is_exhausted() {
            debug!("Stream listener exhausted, connect ignored");
            return;
        }

        while !self.stopping.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = self.connector.connect() => result,
                _ = self.shutdown.notified() => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            };

            match connected {
                Ok(conn) => {
                    info!("Event stream connected");
                    self.attempts.store(0, Ordering::SeqCst);
                    self.set_state(ConnectionState::Connected);
                    match self.session(conn).await {
                        SessionEnd::Shutdown => {
                            self.set_state(ConnectionState::Disconnected);
                            return;
                        }
                        SessionEnd::Closed => {
                            warn!("Event stream closed by peer");
                            self.set_state(ConnectionState::Disconnected);
                        }
                        SessionEnd::Failed(e) => {
                            warn!(error = %e, "Event stream failed");
                            self.set_state(ConnectionState::Error);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Event stream connect failed");
                    self.set_state(ConnectionState::Error);
                }
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.max_attempts {
                self.exhaust(attempt);
                return;
            }

            let delay = self.base_delay * attempt;
            self.sink.record_reconnect_attempt();
            info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling stream reconnect");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.notified() => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn exhaust(&self, attempts: u32) {
        self.exhausted.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
        error!(attempts, "Stream reconnect budget exhausted, continuing with poller only");
        self.sink.publish(DomainEvent::StreamExhausted {
            attempts,
            mode: IngestMode::PollerOnly,
            timestamp: self.sink.clock().now(),
        });
    }

    async fn session(&self, mut conn: Box<dyn StreamConnection>) -> SessionEnd {
        let start = tokio::time::Instant::now() + self.heartbeat;
        let mut heartbeat = tokio::time::interval_at(start, self.heartbeat);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    conn.close().await;
                    return SessionEnd::Shutdown;
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = conn.send_text(HEARTBEAT_MESSAGE).await {
                        return SessionEnd::Failed(e);
                    }
                }
                frame = conn.next_frame() => match frame {
                    Some(Ok(Frame::Text(text))) => self.handle_text(&text),
                    Some(Ok(Frame::Close)) | None => return SessionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Failed(e),
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let mut skipped = 0;
        for raw in parse_stream_message(text) {
            match self.normalizer.normalize(&raw) {
                NormalizeOutcome::Normalized(event) => {
                    self.sink.deliver(event);
                }
                NormalizeOutcome::Skip(reason) => {
                    debug!(reason = %reason, "Stream item skipped");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            self.sink.record_skipped(skipped);
        }
    }

    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quakeguard_core::clock::FixedClock;
    use quakeguard_core::types::Timestamp;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    /// Connection fed from a channel; records what the listener sends.
    struct ChannelConnection {
        inbound: mpsc::UnboundedReceiver<Frame>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl StreamConnection for ChannelConnection {
        async fn next_frame(&mut self) -> Option<Result<Frame, IngestError>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn send_text(&mut self, text: &str) -> Result<(), IngestError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&mut self) {}
    }

    /// Hands out queued connections; fails once the queue is empty.
    struct ScriptedConnector {
        connections: Mutex<VecDeque<ChannelConnection>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StreamConnector for ScriptedConnector {
        async fn connect(&self) -> Result<Box<dyn StreamConnection>, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.connections.lock().unwrap().pop_front() {
                Some(conn) => Ok(Box::new(conn)),
                None => Err(IngestError::Transport("refused".into())),
            }
        }
    }

    fn sink() -> Arc<EventSink> {
        Arc::new(EventSink::new(
            100,
            Arc::new(FixedClock::new(Timestamp(1_705_312_800_000))),
        ))
    }

    fn connection() -> (ChannelConnection, mpsc::UnboundedSender<Frame>, Arc<Mutex<Vec<String>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            ChannelConnection {
                inbound: rx,
                sent: Arc::clone(&sent),
            },
            tx,
            sent,
        )
    }

    fn listener(connections: Vec<ChannelConnection>, sink: Arc<EventSink>) -> (Arc<StreamListener>, Arc<ScriptedConnector>) {
        let connector = Arc::new(ScriptedConnector {
            connections: Mutex::new(connections.into_iter().collect()),
            calls: AtomicUsize::new(0),
        });
        let listener = StreamListener::new(&StreamConfig::default(), connector.clone(), sink);
        (Arc::new(listener), connector)
    }

    #[test]
    fn test_parse_stream_message_shapes() {
        assert_eq!(parse_stream_message(r#"{"id":"a","mag":4}"#).len(), 1);
        assert_eq!(parse_stream_message(r#"[{"id":"a"},{"id":"b"}]"#).len(), 2);
        assert_eq!(parse_stream_message(r#"{"result":[{"id":"a"}]}"#).len(), 1);
        let wrapped = parse_stream_message(r#"{"type":"earthquake","data":{"id":"w"}}"#);
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].0["id"], "w");
    }

    #[test]
    fn test_parse_stream_message_ignores_control_and_garbage() {
        assert!(parse_stream_message(r#"{"type":"pong"}"#).is_empty());
        assert!(parse_stream_message(r#"{"type":"welcome","server":"x"}"#).is_empty());
        assert!(parse_stream_message("hello").is_empty());
        assert!(parse_stream_message("42").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_events_and_sends_heartbeat() {
        let sink = sink();
        let (conn, tx, sent) = connection();
        let (listener, _) = listener(vec![conn], Arc::clone(&sink));

        let runner = Arc::clone(&listener);
        let handle = tokio::spawn(async move { runner.run().await });

        tx.send(Frame::Text(r#"{"id":"s1","lat":40.8,"lon":29.0,"mag":4.5}"#.into())).unwrap();
        tx.send(Frame::Text("not json".into())).unwrap();
        tx.send(Frame::Binary(vec![1, 2, 3])).unwrap();
        tx.send(Frame::Text(r#"{"type":"pong"}"#.into())).unwrap();
        tokio::time::sleep(Duration::from_secs(26)).await;

        assert_eq!(listener.state(), ConnectionState::Connected);
        assert_eq!(sink.counters().events_delivered, 1);
        assert_eq!(sink.counters().items_skipped, 0);
        assert_eq!(*sent.lock().unwrap(), vec![HEARTBEAT_MESSAGE.to_string()]);

        listener.shutdown();
        handle.await.unwrap();
        assert_eq!(listener.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resets_attempt_counter() {
        let sink = sink();
        let (first, tx1, _) = connection();
        let (second, _tx2, _) = connection();
        let (listener, connector) = listener(vec![first, second], Arc::clone(&sink));

        let runner = Arc::clone(&listener);
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx1.send(Frame::Close).unwrap();
        // Closed: one attempt recorded, reconnect after 2 s.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(listener.attempts(), 1);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
        assert_eq!(listener.attempts(), 0);
        assert_eq!(listener.state(), ConnectionState::Connected);

        listener.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_then_permanent_stop() {
        let sink = sink();
        let mut events = sink.domain_events();
        let (listener, connector) = listener(Vec::new(), Arc::clone(&sink));

        let started = tokio::time::Instant::now();
        listener.run().await;
        // Delays 2 + 4 + 6 + 8 s between five failed connects.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
        assert_eq!(connector.calls.load(Ordering::SeqCst), 5);
        assert!(listener.is_exhausted());
        assert_eq!(listener.mode(), IngestMode::PollerOnly);
        assert_eq!(sink.counters().reconnect_attempts, 4);

        // Further connects are no-ops.
        listener.run().await;
        assert_eq!(connector.calls.load(Ordering::SeqCst), 5);

        let mut exhausted = false;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::StreamExhausted { attempts, mode, .. } = event {
                assert_eq!(attempts, 5);
                assert_eq!(mode, IngestMode::PollerOnly);
                exhausted = true;
            }
        }
        assert!(exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff() {
        let (listener, connector) = listener(Vec::new(), sink());
        let runner = Arc::clone(&listener);
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        listener.shutdown();
        handle.await.unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert!(!listener.is_exhausted());
        assert_eq!(listener.state(), ConnectionState::Disconnected);
    }
}
