//! Alert decision and delivery for QuakeGuard.
//!
//! Decides whether an event warrants an alert at the observer's location,
//! then arbitrates and delivers it over independent channels behind the
//! [`AlertPlatform`] seam.

pub mod channel;
pub mod decision;
pub mod error;
pub mod location;
pub mod orchestrator;
pub mod pipeline;
pub mod platform;
pub mod session;

pub use channel::{ChannelContext, ChannelHandler, ChannelRegistry};
pub use decision::{Decision, DecisionFilter, SuppressReason, UrgencyTier};
pub use error::{AlertError, ChannelError, LocationError};
pub use location::{CachedLocationProvider, LocationProvider, StaticLocation};
pub use orchestrator::{AlertOrchestrator, OrchestratorState, SendOutcome};
pub use pipeline::{AlertPipeline, PipelineOutcome};
pub use platform::{AlertPlatform, PlatformHandle, TracingPlatform};
pub use session::{ActiveAlertSession, EndReason, ResourceLedger, SessionInfo};
