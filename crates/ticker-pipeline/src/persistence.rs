//! Persistence stage: drains Ring-B and appends each record as a CSV line.

use crate::record::{Record, HEADER_ROW};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use ticker_ring::Ring;

use crate::error::FileError;

#[derive(Debug, Default)]
pub struct PersistenceMetrics {
    pub records_written: AtomicU64,
    pub write_errors: AtomicU64,
}

impl PersistenceMetrics {
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }
}

/// Owns the output file handle and writes records popped off Ring-B.
/// The header row is written exactly once, only when the file is newly
/// created or was empty — reopening an existing non-empty file for append
/// must never duplicate it.
pub struct PersistenceStage {
    writer: BufWriter<std::fs::File>,
    metrics: Arc<PersistenceMetrics>,
}

impl PersistenceStage {
    /// Opens `path` for append, creating it if absent. Writes the header row
    /// immediately if the file is empty (covers both the brand-new and the
    /// truncated-to-zero cases).
    pub fn open(path: &Path) -> Result<Self, FileError> {
        let existed_nonempty = path
            .metadata()
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| FileError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let mut writer = BufWriter::new(file);
        if !existed_nonempty {
            writeln!(writer, "{HEADER_ROW}").map_err(|e| FileError::Open {
                path: path.display().to_string(),
                source: e,
            })?;
            writer.flush().map_err(|e| FileError::Open {
                path: path.display().to_string(),
                source: e,
            })?;
        }

        Ok(Self {
            writer,
            metrics: Arc::new(PersistenceMetrics::default()),
        })
    }

    pub fn metrics(&self) -> &PersistenceMetrics {
        &self.metrics
    }

    /// Writes one record as a CSV line. A write failure is counted, not
    /// fatal: the stage keeps running so later records still have a chance.
    pub fn write_record(&mut self, record: &Record) {
        match writeln!(self.writer, "{}", record.to_row()) {
            Ok(()) => {
                self.metrics.records_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(source) => {
                let err = FileError::Write(source);
                eprintln!("persistence: {err}");
                self.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Runs the persistence stage's loop until `compute_done` is observed and
/// Ring-B is drained, flushing on a fixed cadence so a crash loses at most
/// one interval's worth of writes rather than everything since startup.
///
/// Exit is gated on `compute_done`, not the top-level shutdown flag: Compute
/// is still allowed to push records into Ring-B for a while after shutdown
/// starts (draining whatever is left in Ring-A), and those pushes must not
/// race a Persistence exit. `compute_done` is only set once Compute has
/// drained Ring-A for the last time, so `compute_done && ring_b.is_empty()`
/// is the first point at which no more records can ever arrive (§4.7).
pub async fn run<const B: usize>(
    mut stage: PersistenceStage,
    ring_b: Arc<Ring<Record, B>>,
    flush_interval: std::time::Duration,
    compute_done: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    // A missed tick should delay the next one rather than fire a burst of
    // catch-up ticks once the stage is busy again.
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let mut drained_any = false;
        while let Some(record) = ring_b.try_pop() {
            stage.write_record(&record);
            drained_any = true;
        }

        if compute_done.load(Ordering::Acquire) && ring_b.is_empty() {
            while let Some(record) = ring_b.try_pop() {
                stage.write_record(&record);
            }
            let _ = stage.flush();
            break;
        }

        // Race the flush tick against a short bounded sleep so an idle
        // stage doesn't busy-spin, while a busy one loops back (almost)
        // immediately to keep draining. Either way the tick still fires on
        // schedule if its deadline is already due. The idle sleep is kept
        // within §4.6's "a few hundred microseconds" ceiling so an idle gap
        // never adds more than that to end-to-end latency.
        let idle_delay = if drained_any { 0 } else { 200 };
        tokio::select! {
            _ = ticker.tick() => {
                let _ = stage.flush();
            }
            () = tokio::time::sleep(std::time::Duration::from_micros(idle_delay)) => {}
        }
    }
}
