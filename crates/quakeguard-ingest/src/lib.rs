//! Event ingestion for QuakeGuard.
//!
//! Normalizes loosely-shaped upstream reports, deduplicates them, and
//! delivers them to subscribers from two redundant strategies: a
//! fixed-cadence HTTP poller and a persistent WebSocket listener.

pub mod dedup;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod normalizer;
pub mod poller;
pub mod sink;
pub mod stream;

pub use dedup::SeenEventCache;
pub use error::IngestError;
pub use feed::{AlwaysOnline, Connectivity, FeedClient, FeedWindow, HttpFeedClient};
pub use gateway::{EventSourceGateway, GatewayStatus};
pub use normalizer::{
    classify_certainty, EventNormalizer, NormalizeOutcome, RawEventReport, SkipReason,
};
pub use poller::{PollReport, Poller};
pub use sink::{EventCallback, EventSink, IngestCounters, Subscription};
pub use stream::{Frame, StreamConnection, StreamConnector, StreamListener, WebSocketConnector};
