//! Ingress stage: decode one frame, build one [`Record`], hand it to Ring-A.

use crate::error::DecodeError;
use crate::record::Record;
use std::sync::atomic::{AtomicU64, Ordering};
use ticker_ring::Ring;

/// Statistical counters for the Ingress stage. All use `Relaxed` ordering:
/// they are purely observational and guard no other data, so there is no
/// happens-before relationship to preserve — the same justification the
/// teacher gives for its own collector metrics.
#[derive(Debug, Default)]
pub struct IngressMetrics {
    pub decode_errors: AtomicU64,
    pub non_ticker_frames: AtomicU64,
    pub ingress_drops: AtomicU64,
    pub frames_accepted: AtomicU64,
}

impl IngressMetrics {
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn non_ticker_frames(&self) -> u64 {
        self.non_ticker_frames.load(Ordering::Relaxed)
    }

    pub fn ingress_drops(&self) -> u64 {
        self.ingress_drops.load(Ordering::Relaxed)
    }

    pub fn frames_accepted(&self) -> u64 {
        self.frames_accepted.load(Ordering::Relaxed)
    }
}

/// Decodes raw text frames and enqueues the resulting records into a
/// Ring-A of fixed capacity `N`. Owns no transport state: the orchestrator
/// feeds it frames as they arrive.
pub struct IngressStage<'a, const N: usize> {
    ring_a: &'a Ring<Record, N>,
    metrics: IngressMetrics,
}

impl<'a, const N: usize> IngressStage<'a, N> {
    pub fn new(ring_a: &'a Ring<Record, N>) -> Self {
        Self {
            ring_a,
            metrics: IngressMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &IngressMetrics {
        &self.metrics
    }

    /// Handles one raw text frame end to end:
    /// decode → reject non-ticker → build Record → enqueue (drop-newest on
    /// overrun). Never blocks, never panics on malformed input.
    pub fn on_frame(&self, raw: &str) {
        if let Err(err) = self.decode(raw) {
            match err {
                DecodeError::Malformed(ref reason) => {
                    eprintln!("ingress: malformed frame: {reason}");
                    self.metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                }
                DecodeError::NotTicker => {
                    self.metrics
                        .non_ticker_frames
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn decode(&self, raw: &str) -> Result<(), DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let map = value
            .as_object()
            .ok_or_else(|| DecodeError::Malformed("frame is not a JSON object".into()))?;

        let record = Record::from_decoded(map)?;

        match self.ring_a.try_push(record) {
            Ok(()) => {
                self.metrics.frames_accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(_dropped) => {
                // Drop-newest: the compute stage is the bottleneck, so
                // retained records should be the oldest, stablest ones.
                eprintln!("ingress: ring-a full, dropping newest frame");
                self.metrics.ingress_drops.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker_frame(price: &str) -> String {
        format!(
            r#"{{"type":"ticker","product_id":"BTC-USD","price":"{price}","best_bid":"1","best_ask":"3"}}"#
        )
    }

    #[test]
    fn accepts_a_valid_ticker_frame() {
        let ring: Ring<Record, 4> = Ring::new();
        let stage = IngressStage::new(&ring);
        stage.on_frame(&ticker_frame("100"));
        assert_eq!(stage.metrics().frames_accepted(), 1);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn counts_malformed_frames_without_pushing() {
        let ring: Ring<Record, 4> = Ring::new();
        let stage = IngressStage::new(&ring);
        stage.on_frame("not json");
        assert_eq!(stage.metrics().decode_errors(), 1);
        assert!(ring.is_empty());
    }

    #[test]
    fn counts_non_ticker_frames_without_pushing() {
        let ring: Ring<Record, 4> = Ring::new();
        let stage = IngressStage::new(&ring);
        stage.on_frame(r#"{"type":"heartbeat"}"#);
        assert_eq!(stage.metrics().non_ticker_frames(), 1);
        assert!(ring.is_empty());
    }

    #[test]
    fn drop_newest_on_ring_a_overrun() {
        // Capacity N-1 = 3.
        let ring: Ring<Record, 4> = Ring::new();
        let stage = IngressStage::new(&ring);
        for i in 0..7 {
            stage.on_frame(&ticker_frame(&i.to_string()));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(stage.metrics().frames_accepted(), 3);
        assert_eq!(stage.metrics().ingress_drops(), 4);

        // The three retained frames are the first three (oldest), proving
        // the newest ones were the ones dropped.
        assert_eq!(ring.try_pop().unwrap().price, "0");
        assert_eq!(ring.try_pop().unwrap().price, "1");
        assert_eq!(ring.try_pop().unwrap().price, "2");
    }
}
