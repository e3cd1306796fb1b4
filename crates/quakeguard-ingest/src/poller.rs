//! Fixed-cadence HTTP polling strategy.

use std::sync::Arc;
use std::time::Duration;

use quakeguard_core::config::{FeedConfig, MIN_POLL_INTERVAL_SECS};
use quakeguard_core::events::DomainEvent;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::feed::{parse_feed_body, Connectivity, FeedClient, FeedWindow};
use crate::normalizer::{EventNormalizer, NormalizeOutcome};
use crate::sink::EventSink;

/// Outcome of one successful poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    pub items: usize,
    pub delivered: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Polls the feed on a fixed interval and forwards unseen events.
///
/// Failures are logged and swallowed. The cadence never backs off.
pub struct Poller {
    client: Arc<dyn FeedClient>,
    connectivity: Arc<dyn Connectivity>,
    normalizer: EventNormalizer,
    sink: Arc<EventSink>,
    interval: Duration,
    window_minutes: u32,
    result_limit: u32,
    wake: Notify,
    shutdown: Notify,
}

impl Poller {
    /// The poll interval is floored at [`MIN_POLL_INTERVAL_SECS`].
    pub fn new(
        config: &FeedConfig,
        client: Arc<dyn FeedClient>,
        connectivity: Arc<dyn Connectivity>,
        sink: Arc<EventSink>,
    ) -> Self {
        let secs = config.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);
        if secs != config.poll_interval_secs {
            warn!(
                configured = config.poll_interval_secs,
                effective = secs,
                "Poll interval raised to floor"
            );
        }
        Self {
            client,
            connectivity,
            normalizer: EventNormalizer::new(Arc::clone(sink.clock()), config.source_name.clone()),
            sink,
            interval: Duration::from_secs(secs),
            window_minutes: config.window_minutes,
            result_limit: config.result_limit,
            wake: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single poll and record its outcome on the sink.
    pub async fn poll_once(&self) -> Result<PollReport, IngestError> {
        match self.fetch_and_deliver().await {
            Ok(report) => {
                self.sink.record_poll_ok();
                self.sink.publish(DomainEvent::PollCompleted {
                    items: report.items,
                    delivered: report.delivered,
                    skipped: report.skipped,
                    timestamp: self.sink.clock().now(),
                });
                Ok(report)
            }
            Err(e) => {
                self.sink.record_poll_failed();
                self.sink.publish(DomainEvent::PollFailed {
                    reason: e.to_string(),
                    timestamp: self.sink.clock().now(),
                });
                Err(e)
            }
        }
    }

    async fn fetch_and_deliver(&self) -> Result<PollReport, IngestError> {
        if !self.connectivity.is_online() {
            return Err(IngestError::Offline);
        }

        let window = FeedWindow::ending_at(
            self.sink.clock().now().to_datetime(),
            self.window_minutes,
            self.result_limit,
        );
        let body = self.client.fetch(window).await?;
        let items = parse_feed_body(&body)?;

        let mut report = PollReport {
            items: items.len(),
            ..PollReport::default()
        };
        for raw in &items {
            match self.normalizer.normalize(raw) {
                NormalizeOutcome::Normalized(event) => {
                    if self.sink.deliver(event) {
                        report.delivered += 1;
                    } else {
                        report.duplicates += 1;
                    }
                }
                NormalizeOutcome::Skip(reason) => {
                    debug!(reason = %reason, "Feed item skipped");
                    report.skipped += 1;
                }
            }
        }
        self.sink.record_skipped(report.skipped as u64);
        Ok(report)
    }

    /// Poll loop. The first poll runs immediately. Returns on [`Poller::shutdown`].
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Poller started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {
                    debug!("Out-of-cadence poll requested");
                }
                _ = self.shutdown.notified() => {
                    info!("Poller stopped");
                    return;
                }
            }

            match self.poll_once().await {
                Ok(report) => debug!(
                    items = report.items,
                    delivered = report.delivered,
                    duplicates = report.duplicates,
                    skipped = report.skipped,
                    "Poll completed"
                ),
                Err(e) => warn!(error = %e, transient = e.is_transient(), "Poll failed"),
            }
        }
    }

    /// Wake the loop for one extra poll. The regular cadence is unaffected.
    pub fn force_immediate_poll(&self) {
        self.wake.notify_one();
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quakeguard_core::clock::FixedClock;
    use quakeguard_core::types::Timestamp;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Feed client returning queued bodies, then the last one forever.
    struct ScriptedFeed {
        responses: Mutex<Vec<Result<String, IngestError>>>,
        calls: AtomicUsize,
        windows: Mutex<Vec<FeedWindow>>,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<Result<String, IngestError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                windows: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FeedClient for ScriptedFeed {
        async fn fetch(&self, window: FeedWindow) -> Result<String, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.windows.lock().unwrap().push(window);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                match &responses[0] {
                    Ok(body) => Ok(body.clone()),
                    Err(_) => Err(IngestError::Network("scripted".into())),
                }
            }
        }
    }

    struct Toggle(AtomicBool);

    impl Connectivity for Toggle {
        fn is_online(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn sink() -> Arc<EventSink> {
        Arc::new(EventSink::new(
            100,
            Arc::new(FixedClock::new(Timestamp(1_705_312_800_000))),
        ))
    }

    fn poller(feed: Arc<ScriptedFeed>, sink: Arc<EventSink>, online: bool) -> Poller {
        Poller::new(
            &FeedConfig::default(),
            feed,
            Arc::new(Toggle(AtomicBool::new(online))),
            sink,
        )
    }

    const TWO_EVENTS: &str = r#"{"result":[
        {"earthquake_id":"a","mag":4.2,"depth":7,"title":"A","geojson":{"coordinates":[29.0,40.8]}},
        {"earthquake_id":"b","mag":3.1,"title":"B","geojson":{"coordinates":[27.1,38.4]}},
        {"title":"no id"}
    ]}"#;

    #[test]
    fn test_interval_floor() {
        let config = FeedConfig {
            poll_interval_secs: 1,
            ..FeedConfig::default()
        };
        let p = Poller::new(
            &config,
            ScriptedFeed::new(vec![Ok("[]".into())]),
            Arc::new(Toggle(AtomicBool::new(true))),
            sink(),
        );
        assert_eq!(p.interval(), Duration::from_secs(MIN_POLL_INTERVAL_SECS));
    }

    #[tokio::test]
    async fn test_poll_once_delivers_and_skips() {
        let sink = sink();
        let p = poller(ScriptedFeed::new(vec![Ok(TWO_EVENTS.into())]), Arc::clone(&sink), true);

        let first = p.poll_once().await.unwrap();
        assert_eq!(first, PollReport { items: 3, delivered: 2, duplicates: 0, skipped: 1 });

        let second = p.poll_once().await.unwrap();
        assert_eq!(second.delivered, 0);
        assert_eq!(second.duplicates, 2);

        let c = sink.counters();
        assert_eq!(c.polls_ok, 2);
        assert_eq!(c.events_delivered, 2);
        assert_eq!(c.items_skipped, 2);
    }

    #[tokio::test]
    async fn test_events_carry_feed_source() {
        let sink = sink();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let _sub = sink.subscribe(Arc::new(move |e| {
            seen_cb.lock().unwrap().push(e.source.clone());
        }));
        let p = poller(ScriptedFeed::new(vec![Ok(TWO_EVENTS.into())]), Arc::clone(&sink), true);
        p.poll_once().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["kandilli", "kandilli"]);
    }

    #[tokio::test]
    async fn test_window_requested_from_clock() {
        let feed = ScriptedFeed::new(vec![Ok("[]".into())]);
        let p = poller(Arc::clone(&feed), sink(), true);
        p.poll_once().await.unwrap();
        let window = feed.windows.lock().unwrap()[0];
        assert_eq!(window.end.timestamp_millis(), 1_705_312_800_000);
        assert_eq!((window.end - window.start).num_minutes(), 60);
        assert_eq!(window.limit, 100);
    }

    #[tokio::test]
    async fn test_offline_skips_request() {
        let feed = ScriptedFeed::new(vec![Ok("[]".into())]);
        let sink = sink();
        let p = poller(Arc::clone(&feed), Arc::clone(&sink), false);
        assert!(matches!(p.poll_once().await, Err(IngestError::Offline)));
        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.counters().polls_failed, 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_failure_not_panic() {
        let sink = sink();
        let p = poller(
            ScriptedFeed::new(vec![Ok("not json".into()), Ok(TWO_EVENTS.into())]),
            Arc::clone(&sink),
            true,
        );
        assert!(matches!(p.poll_once().await, Err(IngestError::Malformed(_))));
        assert_eq!(p.poll_once().await.unwrap().delivered, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_fixed_cadence_through_failures() {
        let feed = ScriptedFeed::new(vec![Err(IngestError::Timeout(12))]);
        let p = Arc::new(poller(Arc::clone(&feed), sink(), true));

        let runner = Arc::clone(&p);
        let handle = tokio::spawn(async move { runner.run().await });

        // Immediate first poll plus one per 10 s interval.
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), 4);

        p.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller should stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_immediate_poll() {
        let feed = ScriptedFeed::new(vec![Ok("[]".into())]);
        let p = Arc::new(poller(Arc::clone(&feed), sink(), true));

        let runner = Arc::clone(&p);
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);

        p.force_immediate_poll();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), 2);

        // The regular tick still lands at t = 10 s.
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), 3);

        p.shutdown();
        handle.await.unwrap();
    }
}
