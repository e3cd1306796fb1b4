//! Wave physics engine for QuakeGuard.
//!
//! Pure, deterministic estimation of seismic wave arrival times and shaking
//! severity at an observer location. Nothing in this crate performs I/O or
//! reads the clock; identical inputs produce bit-identical outputs.

pub mod attenuation;
pub mod confidence;
pub mod engine;
pub mod geo;
pub mod intensity;
pub mod region;
pub mod site;
pub mod uncertainty;
pub mod velocity;

pub use confidence::CalculationQuality;
pub use engine::{Bounds, ObserverSite, SeismicInput, WaveCalculationResult, WaveEngine};
pub use region::SeismicRegion;
pub use site::SiteClass;
