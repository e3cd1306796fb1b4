//! Event Source Gateway: redundant ingestion behind one subscription surface.
//!
//! The poller and, when configured, the stream listener run as independent
//! tasks feeding the same [`EventSink`]. Its dedup cache makes delivery
//! idempotent no matter which strategy sees an event first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use quakeguard_core::clock::Clock;
use quakeguard_core::config::QuakeConfig;
use quakeguard_core::events::DomainEvent;
use quakeguard_core::types::{ConnectionState, IngestMode, NormalizedEvent, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::feed::{AlwaysOnline, Connectivity, FeedClient, HttpFeedClient};
use crate::poller::Poller;
use crate::sink::{EventCallback, EventSink, IngestCounters, Subscription};
use crate::stream::{StreamConnector, StreamListener, WebSocketConnector};

/// Point-in-time view of ingestion health.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub connection_state: ConnectionState,
    pub mode: IngestMode,
    pub last_poll_at: Option<Timestamp>,
    pub counters: IngestCounters,
}

pub struct EventSourceGateway {
    sink: Arc<EventSink>,
    poller: Arc<Poller>,
    listener: Option<Arc<StreamListener>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventSourceGateway {
    pub fn new(
        sink: Arc<EventSink>,
        poller: Arc<Poller>,
        listener: Option<Arc<StreamListener>>,
    ) -> Self {
        Self {
            sink,
            poller,
            listener,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build the production gateway: reqwest poller plus, when
    /// `stream.enabled` and `stream.url` are both set, a WebSocket listener.
    pub fn from_config(config: &QuakeConfig, clock: Arc<dyn Clock>) -> Result<Self, IngestError> {
        let client: Arc<dyn FeedClient> = Arc::new(HttpFeedClient::new(
            config.feed.poll_url.clone(),
            config.feed.request_timeout_secs,
        )?);
        let connector = match (&config.stream.url, config.stream.enabled) {
            (Some(url), true) => Some(Arc::new(WebSocketConnector::new(
                url.clone(),
                Duration::from_secs(config.stream.connect_timeout_secs),
            )) as Arc<dyn StreamConnector>),
            _ => None,
        };
        Ok(Self::with_parts(config, clock, client, Arc::new(AlwaysOnline), connector))
    }

    /// Build a gateway over arbitrary transports.
    pub fn with_parts(
        config: &QuakeConfig,
        clock: Arc<dyn Clock>,
        client: Arc<dyn FeedClient>,
        connectivity: Arc<dyn Connectivity>,
        connector: Option<Arc<dyn StreamConnector>>,
    ) -> Self {
        let sink = Arc::new(EventSink::new(config.dedup.capacity, clock));
        let poller = Arc::new(Poller::new(
            &config.feed,
            client,
            connectivity,
            Arc::clone(&sink),
        ));
        let listener = connector.map(|c| {
            Arc::new(StreamListener::new(&config.stream, c, Arc::clone(&sink)))
        });
        Self::new(sink, poller, listener)
    }

    pub fn sink(&self) -> &Arc<EventSink> {
        &self.sink
    }

    /// Register a callback for every newly seen event.
    pub fn subscribe(&self, callback: EventCallback) -> Subscription {
        self.sink.subscribe(callback)
    }

    /// Subscribe through a bounded channel. Events are dropped with a
    /// warning when the consumer falls `capacity` events behind.
    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> (Subscription, mpsc::Receiver<NormalizedEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscription = self.sink.subscribe(Arc::new(move |event: &NormalizedEvent| {
            if let Err(e) = tx.try_send(event.clone()) {
                warn!(event_id = %event.id, error = %e, "Event channel full or closed, event dropped");
            }
        }));
        (subscription, rx)
    }

    pub fn force_immediate_poll(&self) {
        self.poller.force_immediate_poll();
    }

    pub fn status(&self) -> GatewayStatus {
        let (connection_state, mode) = match &self.listener {
            Some(listener) => (listener.state(), listener.mode()),
            None => (ConnectionState::Disconnected, IngestMode::PollerOnly),
        };
        GatewayStatus {
            connection_state,
            mode,
            last_poll_at: self.sink.last_poll_at(),
            counters: self.sink.counters(),
        }
    }

    pub fn domain_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.sink.domain_events()
    }

    /// Spawn the poller and listener tasks. Calling twice is a no-op.
    pub fn start(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !tasks.is_empty() {
            return;
        }

        let poller = Arc::clone(&self.poller);
        tasks.push(tokio::spawn(async move { poller.run().await }));

        match &self.listener {
            Some(listener) => {
                let listener = Arc::clone(listener);
                tasks.push(tokio::spawn(async move { listener.run().await }));
                info!("Gateway started with poller and stream listener");
            }
            None => info!("Gateway started in poller-only mode"),
        }
    }

    /// Stop both strategies and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        self.poller.shutdown();
        if let Some(listener) = &self.listener {
            listener.shutdown();
        }
        let handles: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut t) => t.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Ingestion task ended abnormally");
            }
        }
        info!("Gateway stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedWindow;
    use async_trait::async_trait;
    use quakeguard_core::clock::FixedClock;

    struct StaticFeed(&'static str);

    #[async_trait]
    impl FeedClient for StaticFeed {
        async fn fetch(&self, _window: FeedWindow) -> Result<String, IngestError> {
            Ok(self.0.to_string())
        }
    }

    fn gateway(body: &'static str) -> EventSourceGateway {
        EventSourceGateway::with_parts(
            &QuakeConfig::default(),
            Arc::new(FixedClock::new(Timestamp(1_705_312_800_000))),
            Arc::new(StaticFeed(body)),
            Arc::new(AlwaysOnline),
            None,
        )
    }

    #[test]
    fn test_from_config_without_stream_url() {
        let gw = EventSourceGateway::from_config(
            &QuakeConfig::default(),
            Arc::new(FixedClock::new(Timestamp(0))),
        )
        .unwrap();
        assert!(gw.listener.is_none());
        assert_eq!(gw.status().mode, IngestMode::PollerOnly);
    }

    #[test]
    fn test_from_config_with_stream_url() {
        let mut config = QuakeConfig::default();
        config.stream.url = Some("wss://example.invalid/events".into());
        let gw = EventSourceGateway::from_config(&config, Arc::new(FixedClock::new(Timestamp(0))))
            .unwrap();
        assert!(gw.listener.is_some());
        assert_eq!(gw.status().mode, IngestMode::Redundant);
        assert_eq!(gw.status().connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_channel_subscription_receives_events() {
        let gw = gateway(r#"[{"id":"a","lat":40.8,"lon":29.0,"mag":4.0}]"#);
        let (_sub, mut rx) = gw.subscribe_channel(8);

        gw.start();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event should arrive")
            .unwrap();
        assert_eq!(event.id, "a");

        gw.shutdown().await;
        let status = gw.status();
        assert_eq!(status.counters.events_delivered, 1);
        assert!(status.counters.polls_ok >= 1);
        assert!(status.last_poll_at.is_some());
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let gw = gateway("[]");
        gw.start();
        gw.start();
        assert_eq!(gw.tasks.lock().unwrap().len(), 1);
        gw.shutdown().await;
        assert!(gw.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let gw = gateway("[]");
        let (_sub, mut rx) = gw.subscribe_channel(1);
        let sink = gw.sink();
        for id in ["a", "b", "c"] {
            let raw = serde_json::json!({"id": id, "lat": 40.0, "lon": 30.0, "mag": 4.0});
            let event = crate::normalizer::EventNormalizer::new(Arc::clone(sink.clock()), "t")
                .normalize(&crate::normalizer::RawEventReport(raw))
                .into_event()
                .unwrap();
            assert!(sink.deliver(event));
        }
        assert_eq!(rx.recv().await.unwrap().id, "a");
        assert!(rx.try_recv().is_err());
    }
}
