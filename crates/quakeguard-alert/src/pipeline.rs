//! Event to alert pipeline.
//!
//! location → wave engine → certainty → decision filter → orchestrator.
//! Each stage that stops an event logs why at debug level.

use std::sync::Arc;

use quakeguard_core::clock::Clock;
use quakeguard_core::config::QuakeConfig;
use quakeguard_core::types::NormalizedEvent;
use quakeguard_ingest::classify_certainty;
use quakeguard_physics::{ObserverSite, SeismicInput, WaveCalculationResult, WaveEngine};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::decision::{Decision, DecisionFilter, SuppressReason};
use crate::error::AlertError;
use crate::location::LocationProvider;
use crate::orchestrator::{AlertOrchestrator, SendOutcome};

/// What happened to one event.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineOutcome {
    Suppressed(SuppressReason),
    Sent(SendOutcome),
}

pub struct AlertPipeline {
    engine: WaveEngine,
    location: Arc<dyn LocationProvider>,
    filter: DecisionFilter,
    orchestrator: AlertOrchestrator,
    site_vs30: Option<f64>,
}

impl AlertPipeline {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        filter: DecisionFilter,
        orchestrator: AlertOrchestrator,
    ) -> Self {
        Self {
            engine: WaveEngine::new(),
            location,
            filter,
            orchestrator,
            site_vs30: None,
        }
    }

    pub fn from_config(
        config: &QuakeConfig,
        location: Arc<dyn LocationProvider>,
        orchestrator: AlertOrchestrator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let filter = DecisionFilter::new(config.alerts.clone(), clock);
        Self::new(location, filter, orchestrator).with_site_vs30(config.location.site_vs30)
    }

    /// Measured Vs30 at the observer, overriding the regional default.
    pub fn with_site_vs30(mut self, vs30: Option<f64>) -> Self {
        self.site_vs30 = vs30;
        self
    }

    pub fn orchestrator(&self) -> &AlertOrchestrator {
        &self.orchestrator
    }

    /// Wave estimate at the current observer location, if one can be made.
    pub async fn estimate(&self, event: &NormalizedEvent) -> Option<WaveCalculationResult> {
        let fix = match self.location.current_location().await {
            Ok(fix) => fix,
            Err(e) => {
                debug!(event_id = %event.id, error = %e, "No observer location, skipping wave estimate");
                return None;
            }
        };
        let site = ObserverSite {
            location: fix.point,
            source: fix.source,
            vs30: self.site_vs30,
        };
        let wave = self.engine.calculate(&SeismicInput::from(event), &site);
        if wave.is_none() {
            debug!(event_id = %event.id, "Wave engine rejected event parameters");
        }
        wave
    }

    /// Run one event through every stage.
    pub async fn process(&self, event: &NormalizedEvent) -> Result<PipelineOutcome, AlertError> {
        let wave = self.estimate(event).await;
        let certainty = classify_certainty(
            event.magnitude,
            wave.as_ref().map(|w| w.epicentral_distance_km),
        );

        match self.filter.evaluate(event, certainty, wave.as_ref()) {
            Decision::Suppressed(reason) => {
                debug!(event_id = %event.id, magnitude = event.magnitude, %reason, "Alert suppressed");
                Ok(PipelineOutcome::Suppressed(reason))
            }
            Decision::Alert(request) => {
                info!(
                    event_id = %event.id,
                    magnitude = event.magnitude,
                    priority = %request.priority,
                    "Alert decided"
                );
                let outcome = self.orchestrator.send_alert(request).await?;
                Ok(PipelineOutcome::Sent(outcome))
            }
        }
    }

    /// Consume events until the sender side closes or the orchestrator
    /// shuts down.
    pub async fn run(&self, mut events: mpsc::Receiver<NormalizedEvent>) {
        info!("Alert pipeline started");
        while let Some(event) = events.recv().await {
            match self.process(&event).await {
                Ok(_) => {}
                Err(AlertError::ShuttingDown) => break,
                Err(e) => warn!(event_id = %event.id, error = %e, "Alert request rejected"),
            }
        }
        info!("Alert pipeline stopped");
    }
}
