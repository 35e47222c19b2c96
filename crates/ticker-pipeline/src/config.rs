//! Pipeline-wide configuration assembled from CLI flags.

use std::path::PathBuf;
use std::time::Duration;

/// Ring-A's fixed capacity (entries, before the one reserved slot), chosen
/// for an ingest-heavy burst that Compute can drain in well under a second
/// at typical ticker rates.
pub const RING_A_SIZE: usize = 4096;

/// Ring-B's fixed capacity: persistence writes are cheap and should rarely
/// queue deeply, so a smaller buffer is enough and keeps drop-oldest
/// eviction rare in practice.
pub const RING_B_SIZE: usize = 256;

/// How often the Persistence stage flushes its buffered writer to disk.
/// Amortizes the flush syscall across many writes while bounding the
/// data-loss window to roughly this interval (§4.6).
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub websocket_url: String,
    pub product_id: String,
    pub output_path: PathBuf,
    pub ema_interval: chrono::Duration,
    pub shutdown_timeout: Duration,
}

impl PipelineConfig {
    pub fn flush_interval(&self) -> Duration {
        FLUSH_INTERVAL
    }
}
