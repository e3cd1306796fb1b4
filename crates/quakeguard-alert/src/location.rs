//! Observer location with a short-lived cache.
//!
//! Device fixes are reused for `cache_ttl_secs`; when the device cannot
//! produce one the configured home location stands in, marked as
//! [`LocationSource::Configured`] so confidence scoring can account for it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quakeguard_core::clock::Clock;
use quakeguard_core::config::LocationConfig;
use quakeguard_core::types::{GeoPoint, LocationFix, LocationSource};
use tracing::debug;

use crate::error::LocationError;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<LocationFix, LocationError>;
}

/// Always answers with one fixed point.
pub struct StaticLocation {
    point: GeoPoint,
    source: LocationSource,
    clock: Arc<dyn Clock>,
}

impl StaticLocation {
    pub fn new(point: GeoPoint, source: LocationSource, clock: Arc<dyn Clock>) -> Self {
        Self {
            point,
            source,
            clock,
        }
    }
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Result<LocationFix, LocationError> {
        Ok(LocationFix {
            point: self.point,
            source: self.source,
            acquired_at: self.clock.now(),
        })
    }
}

/// Caches device fixes and falls back to the configured home location.
pub struct CachedLocationProvider {
    device: Option<Arc<dyn LocationProvider>>,
    fallback: Option<GeoPoint>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<LocationFix>>,
}

impl CachedLocationProvider {
    pub fn new(
        device: Option<Arc<dyn LocationProvider>>,
        fallback: Option<GeoPoint>,
        ttl_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            device,
            fallback,
            ttl_ms: i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            clock,
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(
        config: &LocationConfig,
        device: Option<Arc<dyn LocationProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(device, config.home(), config.cache_ttl_secs, clock)
    }

    /// Forget the cached device fix.
    pub fn invalidate(&self) {
        *self.lock_cache() = None;
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<LocationFix>> {
        match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn fresh_cached(&self) -> Option<LocationFix> {
        let now = self.clock.now();
        self.lock_cache()
            .filter(|fix| (0..self.ttl_ms).contains(&fix.acquired_at.age_ms(now)))
    }

    fn fallback_fix(&self, cause: LocationError) -> Result<LocationFix, LocationError> {
        match self.fallback {
            Some(point) if point.is_valid() => {
                debug!(error = %cause, "Using configured home location");
                Ok(LocationFix {
                    point,
                    source: LocationSource::Configured,
                    acquired_at: self.clock.now(),
                })
            }
            _ => Err(cause),
        }
    }
}

#[async_trait]
impl LocationProvider for CachedLocationProvider {
    async fn current_location(&self) -> Result<LocationFix, LocationError> {
        if let Some(fix) = self.fresh_cached() {
            return Ok(fix);
        }

        let Some(device) = &self.device else {
            return self.fallback_fix(LocationError::Unavailable(
                "no device location provider".into(),
            ));
        };

        match device.current_location().await {
            Ok(fix) if fix.point.is_valid() => {
                *self.lock_cache() = Some(fix);
                Ok(fix)
            }
            Ok(fix) => self.fallback_fix(LocationError::Unavailable(format!(
                "device reported invalid coordinates ({}, {})",
                fix.point.lat, fix.point.lon
            ))),
            Err(e) => self.fallback_fix(e),
        }
    }
}
