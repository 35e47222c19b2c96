//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ticker-pipeline", about = "Ingest, compute, and persist a single-symbol exchange ticker feed")]
pub struct Cli {
    /// Websocket URL of the exchange feed.
    #[arg(long, default_value = "wss://ws-feed.exchange.example/ws")]
    pub url: String,

    /// Product to subscribe to, e.g. `BTC-USD`.
    #[arg(long, default_value = "BTC-USD")]
    pub product: String,

    /// Output CSV path. Appended to if it already exists.
    #[arg(long, default_value = "ticker_data.csv")]
    pub output: PathBuf,

    /// EMA sampling interval, in seconds.
    #[arg(long, default_value_t = crate::ema::DEFAULT_INTERVAL_SECS as u64)]
    pub ema_interval_secs: u64,

    /// Ring-A capacity in bits (2^n slots). The binary only ever
    /// instantiates `Ring<Record, 4096>`, so this is validated against
    /// that fixed size rather than used to select a type at runtime.
    #[arg(long, default_value_t = 12)]
    pub ring_a_bits: u8,

    /// Ring-B capacity in bits (2^n slots), validated the same way as
    /// `ring_a_bits` against the binary's fixed `Ring<Record, 256>`.
    #[arg(long, default_value_t = 8)]
    pub ring_b_bits: u8,

    /// Seconds to wait for stages to drain and exit cleanly before forcing
    /// shutdown.
    #[arg(long, default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

impl Cli {
    /// Checks `--ring-a-bits` / `--ring-b-bits` against the binary's fixed
    /// `Ring` sizes, since const generics can't be chosen at runtime.
    pub fn validate_ring_bits(&self) -> Result<(), String> {
        let ring_a_expected = crate::config::RING_A_SIZE.trailing_zeros() as u8;
        let ring_b_expected = crate::config::RING_B_SIZE.trailing_zeros() as u8;
        if self.ring_a_bits != ring_a_expected {
            return Err(format!(
                "--ring-a-bits {} does not match this build's fixed ring size (2^{ring_a_expected} = {})",
                self.ring_a_bits,
                crate::config::RING_A_SIZE
            ));
        }
        if self.ring_b_bits != ring_b_expected {
            return Err(format!(
                "--ring-b-bits {} does not match this build's fixed ring size (2^{ring_b_expected} = {})",
                self.ring_b_bits,
                crate::config::RING_B_SIZE
            ));
        }
        Ok(())
    }
}
