//! The delivery point shared by every ingestion strategy.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use quakeguard_core::clock::Clock;
use quakeguard_core::events::DomainEvent;
use quakeguard_core::types::{NormalizedEvent, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::dedup::SeenEventCache;

/// Subscriber callback. Invoked once per newly seen event, on the ingesting task.
pub type EventCallback = Arc<dyn Fn(&NormalizedEvent) + Send + Sync>;

const DOMAIN_EVENT_CAPACITY: usize = 256;

/// Ingestion counters, as reported by the gateway status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounters {
    pub polls_ok: u64,
    pub polls_failed: u64,
    pub events_delivered: u64,
    pub duplicates_suppressed: u64,
    pub items_skipped: u64,
    pub reconnect_attempts: u64,
}

#[derive(Default)]
struct AtomicCounters {
    polls_ok: AtomicU64,
    polls_failed: AtomicU64,
    events_delivered: AtomicU64,
    duplicates_suppressed: AtomicU64,
    items_skipped: AtomicU64,
    reconnect_attempts: AtomicU64,
}

/// Dedup cache, subscriber list, counters and status broadcast.
///
/// One instance is shared by the poller and the stream listener; tests
/// build as many isolated instances as they need.
pub struct EventSink {
    seen: SeenEventCache,
    subscribers: RwLock<Vec<(u64, EventCallback)>>,
    next_subscriber: AtomicU64,
    counters: AtomicCounters,
    /// Epoch ms of the last completed poll, 0 when none yet.
    last_poll_ms: AtomicI64,
    domain_events: broadcast::Sender<DomainEvent>,
    clock: Arc<dyn Clock>,
}

impl EventSink {
    pub fn new(dedup_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let (domain_events, _) = broadcast::channel(DOMAIN_EVENT_CAPACITY);
        Self {
            seen: SeenEventCache::new(dedup_capacity),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
            counters: AtomicCounters::default(),
            last_poll_ms: AtomicI64::new(0),
            domain_events,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Register a callback for newly seen events.
    pub fn subscribe(self: &Arc<Self>, callback: EventCallback) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.write_subscribers().push((id, callback));
        debug!(subscriber = id, "Subscriber registered");
        Subscription {
            id,
            sink: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        let mut subs = self.write_subscribers();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        before != subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn write_subscribers(&self) -> std::sync::RwLockWriteGuard<'_, Vec<(u64, EventCallback)>> {
        match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Forward `event` to every subscriber unless its id was seen before.
    /// Returns whether it was delivered.
    pub fn deliver(&self, event: NormalizedEvent) -> bool {
        if !self.seen.insert_if_absent(&event.id) {
            self.counters
                .duplicates_suppressed
                .fetch_add(1, Ordering::Relaxed);
            debug!(event_id = %event.id, "Duplicate event suppressed");
            return false;
        }

        let callbacks: Vec<EventCallback> = match self.subscribers.read() {
            Ok(subs) => subs.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect(),
        };

        info!(
            event_id = %event.id,
            source = %event.source,
            magnitude = event.magnitude,
            region = %event.region,
            subscribers = callbacks.len(),
            "Event delivered"
        );
        for callback in &callbacks {
            callback(&event);
        }

        self.counters.events_delivered.fetch_add(1, Ordering::Relaxed);
        self.publish(DomainEvent::EventDelivered {
            event_id: event.id.clone(),
            source: event.source.clone(),
            magnitude: event.magnitude,
            timestamp: self.clock.now(),
        });
        true
    }

    pub fn record_skipped(&self, count: u64) {
        self.counters.items_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_poll_ok(&self) {
        self.counters.polls_ok.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ms.store(self.clock.now().0, Ordering::Relaxed);
    }

    pub fn record_poll_failed(&self) {
        self.counters.polls_failed.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ms.store(self.clock.now().0, Ordering::Relaxed);
    }

    pub fn record_reconnect_attempt(&self) {
        self.counters
            .reconnect_attempts
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> IngestCounters {
        let c = &self.counters;
        IngestCounters {
            polls_ok: c.polls_ok.load(Ordering::Relaxed),
            polls_failed: c.polls_failed.load(Ordering::Relaxed),
            events_delivered: c.events_delivered.load(Ordering::Relaxed),
            duplicates_suppressed: c.duplicates_suppressed.load(Ordering::Relaxed),
            items_skipped: c.items_skipped.load(Ordering::Relaxed),
            reconnect_attempts: c.reconnect_attempts.load(Ordering::Relaxed),
        }
    }

    pub fn last_poll_at(&self) -> Option<Timestamp> {
        match self.last_poll_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(Timestamp(ms)),
        }
    }

    /// Broadcast a status event. Having no receivers is not an error.
    pub fn publish(&self, event: DomainEvent) {
        debug!(event = event.event_name(), "Domain event");
        let _ = self.domain_events.send(event);
    }

    pub fn domain_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.domain_events.subscribe()
    }
}

/// Handle returned by [`EventSink::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    sink: Weak<EventSink>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving events. Returns `false` if already unsubscribed.
    pub fn unsubscribe(&mut self) -> bool {
        match std::mem::take(&mut self.sink).upgrade() {
            Some(sink) => sink.unsubscribe(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
