//! Wires the three stages together and drives startup and shutdown.
//!
//! Shutdown coordination borrows the teacher's `ShutdownState` shape: a
//! shared `AtomicBool` that downstream stages poll once they find their
//! ring empty, rather than a channel each stage must explicitly listen on.
//! There is exactly one shutdown trigger here (transport closing or a
//! fatal transport error), so the idempotency the teacher's `ShutdownSignal`
//! guards against concurrent triggers from multiple callers doesn't apply.
//!
//! Two flags, not one: `shutdown` tells Compute and Persistence that no more
//! new work is coming and they should start watching for their upstream ring
//! to go empty; `compute_done` tells Persistence specifically that Compute
//! has finished its last drain of Ring-A and can never push to Ring-B again.
//! Persistence must not exit on `shutdown` alone — Ring-B can look empty for
//! a moment while Compute is still mid-drain, and exiting there would drop
//! records that never overran any ring (§4.7's drain order: Compute first,
//! then Persistence).

use crate::compute::{self, ComputeMetrics};
use crate::config::{PipelineConfig, RING_A_SIZE, RING_B_SIZE};
use crate::ema::EmaEngine;
use crate::error::PipelineError;
use crate::ingress::IngressStage;
use crate::persistence::{self, PersistenceStage};
use crate::platform::{self, PlatformHooks};
use crate::record::Record;
use crate::transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ticker_ring::Ring;

pub struct Orchestrator {
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline to completion: connects, ingests, computes, and
    /// persists until the transport closes (or fails), then drains both
    /// rings and joins the background stages with a bounded timeout.
    pub async fn run(self) -> Result<(), PipelineError> {
        platform::default_hooks().raise_thread_priority();

        let ring_a: Arc<Ring<Record, RING_A_SIZE>> = Arc::new(Ring::new());
        let ring_b: Arc<Ring<Record, RING_B_SIZE>> = Arc::new(Ring::new());

        // Persistence must be ready (file open, header written) before any
        // other stage starts, so a startup failure here aborts cleanly
        // with nothing else spun up to unwind.
        let persistence_stage = PersistenceStage::open(&self.config.output_path)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let compute_done = Arc::new(AtomicBool::new(false));

        let persistence_handle = tokio::spawn(persistence::run(
            persistence_stage,
            ring_b.clone(),
            self.config.flush_interval(),
            compute_done.clone(),
        ));

        let ema_engine = EmaEngine::new(self.config.ema_interval);
        let compute_metrics = Arc::new(ComputeMetrics::default());
        let compute_handle = tokio::spawn(compute::run(
            ring_a.clone(),
            ring_b.clone(),
            ema_engine,
            compute_metrics,
            shutdown.clone(),
            compute_done.clone(),
        ));

        let ingress = IngressStage::new(ring_a.as_ref());
        let transport_result = transport::run_until_closed(
            &self.config.websocket_url,
            &self.config.product_id,
            |raw| ingress.on_frame(raw),
        )
        .await;

        shutdown.store(true, Ordering::Release);

        if tokio::time::timeout(self.config.shutdown_timeout, compute_handle)
            .await
            .is_err()
        {
            // Compute did not finish its drain within the bound: force
            // Persistence's exit condition anyway rather than have it wait
            // on a `compute_done` that will now never arrive. Any records
            // still in Ring-A or Ring-B at this point are lost, per §5's
            // documented bounded-timeout behavior.
            compute_done.store(true, Ordering::Release);
        }
        let _ = tokio::time::timeout(self.config.shutdown_timeout, persistence_handle).await;

        transport_result.map_err(PipelineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn startup_failure_surfaces_as_pipeline_error() {
        // A directory can never be opened as a file, so this exercises the
        // startup-abort path without needing a live transport.
        let config = PipelineConfig {
            websocket_url: "wss://example.invalid".into(),
            product_id: "BTC-USD".into(),
            output_path: std::env::temp_dir(),
            ema_interval: chrono::Duration::seconds(5),
            shutdown_timeout: Duration::from_millis(50),
        };
        let orchestrator = Orchestrator::new(config);
        let result = orchestrator.run().await;
        assert!(result.is_err());
    }
}
