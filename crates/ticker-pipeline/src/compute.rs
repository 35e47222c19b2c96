//! Compute stage: drains Ring-A, applies both EMAs, enqueues into Ring-B.

use crate::ema::EmaEngine;
use crate::error::ParseError;
use crate::record::Record;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use ticker_ring::Ring;

#[derive(Debug, Default)]
pub struct ComputeMetrics {
    pub persistence_drops: AtomicU64,
    pub records_processed: AtomicU64,
}

impl ComputeMetrics {
    pub fn persistence_drops(&self) -> u64 {
        self.persistence_drops.load(Ordering::Relaxed)
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
    }
}

/// Drains Ring-A, stamps EMA values onto each record, and forwards it to
/// Ring-B. Ring-B overrun is handled by dropping the *oldest* queued record
/// (not the new one): persistence is the tail of the pipeline and recent
/// values matter more to a consumer than old ones do.
pub struct ComputeStage<'a, const A: usize, const B: usize> {
    ring_a: &'a Ring<Record, A>,
    ring_b: &'a Ring<Record, B>,
    ema: EmaEngine,
    metrics: Arc<ComputeMetrics>,
}

impl<'a, const A: usize, const B: usize> ComputeStage<'a, A, B> {
    pub fn new(ring_a: &'a Ring<Record, A>, ring_b: &'a Ring<Record, B>, ema: EmaEngine) -> Self {
        Self {
            ring_a,
            ring_b,
            ema,
            metrics: Arc::new(ComputeMetrics::default()),
        }
    }

    pub fn with_metrics(
        ring_a: &'a Ring<Record, A>,
        ring_b: &'a Ring<Record, B>,
        ema: EmaEngine,
        metrics: Arc<ComputeMetrics>,
    ) -> Self {
        Self {
            ring_a,
            ring_b,
            ema,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ComputeMetrics {
        &self.metrics
    }

    pub fn ema(&self) -> &EmaEngine {
        &self.ema
    }

    /// Pops and processes every record currently queued in Ring-A. Returns
    /// the number processed, so the caller's run loop can decide whether to
    /// yield (nothing to do) or keep draining (more work queued up).
    pub fn drain_available(&mut self) -> usize {
        let mut processed = 0;
        while let Some(record) = self.ring_a.try_pop() {
            self.process_one(record);
            processed += 1;
        }
        processed
    }

    fn process_one(&mut self, mut record: Record) {
        let now = record.event_time;

        // If the price doesn't parse, the EMA is left untouched and the
        // record carries whatever value was already current (§4.5).
        record.price_ema = match record.price.parse::<f64>() {
            Ok(price) => self.ema.update_price(price, now),
            Err(_) => {
                let err = ParseError::Decimal {
                    field: "price",
                    raw: record.price.clone(),
                };
                eprintln!("compute: {err}");
                self.ema.price().value()
            }
        };
        record.mid_price_ema = self.ema.update_mid_price(record.mid_price, now);

        self.metrics.records_processed.fetch_add(1, Ordering::Relaxed);
        self.push_with_drop_oldest(record);
    }

    /// Pushes into Ring-B; on overrun, evicts the oldest queued record and
    /// retries once. `try_push`'s `Result<(), T>` return is what makes this
    /// possible: a rejected push hands the item straight back, so it can be
    /// retried after the eviction rather than reconstructed.
    fn push_with_drop_oldest(&mut self, record: Record) {
        match self.ring_b.try_push(record) {
            Ok(()) => {}
            Err(rejected) => {
                self.ring_b.try_pop();
                eprintln!("compute: ring-b full, dropping oldest queued record");
                self.metrics.persistence_drops.fetch_add(1, Ordering::Relaxed);
                // Ring-B has exactly one consumer (Persistence), so the slot
                // just freed above is guaranteed to still be free here.
                let _ = self.ring_b.try_push(rejected);
            }
        }
    }
}

/// Runs the compute stage's loop until `shutdown` is observed, cooperatively
/// yielding when Ring-A is empty so the executor can schedule other tasks
/// (Ingress writing in, Persistence draining out) instead of busy-spinning.
///
/// Sets `compute_done` only after Ring-A has been drained for the last time,
/// so Persistence — which must not exit until every record Compute forwards
/// has actually reached Ring-B — has a signal that is true exactly when
/// Compute can never push to Ring-B again (§4.7's drain ordering: Compute
/// drains Ring-A, *then* Persistence drains Ring-B).
pub async fn run<const A: usize, const B: usize>(
    ring_a: std::sync::Arc<Ring<Record, A>>,
    ring_b: std::sync::Arc<Ring<Record, B>>,
    ema: EmaEngine,
    metrics: Arc<ComputeMetrics>,
    shutdown: Arc<AtomicBool>,
    compute_done: Arc<AtomicBool>,
) {
    let mut stage = ComputeStage::with_metrics(&ring_a, &ring_b, ema, metrics);

    loop {
        let processed = stage.drain_available();

        if shutdown.load(Ordering::Acquire) && ring_a.is_empty() {
            // Final drain: a frame may have landed between the emptiness
            // check above and the shutdown flag being observed.
            stage.drain_available();
            compute_done.store(true, Ordering::Release);
            break;
        }

        if processed == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::{DateTime, Utc};

    fn record_at(price: &str, secs: i64) -> Record {
        let mut r = Record::from_decoded(
            serde_json::json!({
                "type": "ticker",
                "product_id": "BTC-USD",
                "price": price,
                "best_bid": "1",
                "best_ask": "3",
            })
            .as_object()
            .unwrap(),
        )
        .unwrap();
        r.event_time = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
        r
    }

    #[test]
    fn first_record_gets_identity_ema() {
        let ring_a: Ring<Record, 4> = Ring::new();
        let ring_b: Ring<Record, 4> = Ring::new();
        ring_a.try_push(record_at("100", 0)).unwrap();

        let mut stage = ComputeStage::new(&ring_a, &ring_b, EmaEngine::new(chrono::Duration::seconds(5)));
        stage.drain_available();

        let out = ring_b.try_pop().unwrap();
        assert_eq!(out.price_ema, 100.0);
        assert_eq!(out.mid_price_ema, 2.0);
    }

    #[test]
    fn gated_sample_carries_previous_ema_forward() {
        let ring_a: Ring<Record, 8> = Ring::new();
        let ring_b: Ring<Record, 8> = Ring::new();
        ring_a.try_push(record_at("100", 0)).unwrap();
        ring_a.try_push(record_at("200", 1)).unwrap();

        let mut stage = ComputeStage::new(&ring_a, &ring_b, EmaEngine::new(chrono::Duration::seconds(5)));
        stage.drain_available();

        ring_b.try_pop().unwrap();
        let second = ring_b.try_pop().unwrap();
        assert_eq!(second.price_ema, 100.0);
    }

    #[test]
    fn unparseable_price_leaves_ema_untouched() {
        let ring_a: Ring<Record, 8> = Ring::new();
        let ring_b: Ring<Record, 8> = Ring::new();
        ring_a.try_push(record_at("100", 0)).unwrap();
        ring_a.try_push(record_at("not-a-number", 10)).unwrap();

        let mut stage = ComputeStage::new(&ring_a, &ring_b, EmaEngine::new(chrono::Duration::seconds(5)));
        stage.drain_available();

        ring_b.try_pop().unwrap();
        let second = ring_b.try_pop().unwrap();
        // Carries the prior EMA value forward rather than folding in 0.0.
        assert_eq!(second.price_ema, 100.0);
    }

    #[test]
    fn drop_oldest_on_ring_b_overrun_keeps_newest_records() {
        let ring_a: Ring<Record, 16> = Ring::new();
        let ring_b: Ring<Record, 4> = Ring::new();
        for i in 0..7 {
            ring_a.try_push(record_at(&i.to_string(), i)).unwrap();
        }

        let mut stage = ComputeStage::new(&ring_a, &ring_b, EmaEngine::new(chrono::Duration::seconds(5)));
        stage.drain_available();

        assert_eq!(ring_b.len(), 3);
        assert!(stage.metrics().persistence_drops() >= 4);

        // The retained records are the most recent ones.
        let first = ring_b.try_pop().unwrap();
        assert_eq!(first.price, "4");
    }
}
