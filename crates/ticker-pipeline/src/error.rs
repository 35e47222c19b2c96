//! Error taxonomy for the ticker pipeline (see design §7).
//!
//! Only [`TransportError`] and a startup [`FileError`] ever reach the
//! orchestrator; every other variant here is absorbed locally by the stage
//! that produced it and surfaced only through a counter.

use thiserror::Error;

/// A decoded frame could not be turned into a [`crate::record::Record`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame's `type` field was absent, not a string, or not `"ticker"`,
    /// or a required field (`product_id`, `price`) was missing.
    #[error("frame is not a ticker event")]
    NotTicker,
    /// The frame was not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// A field within an otherwise valid frame could not be parsed as its
/// expected type. Never fatal: the field falls back to a documented
/// default and the record still flows downstream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("field `{field}` is not a valid decimal: {raw}")]
    Decimal { field: &'static str, raw: String },
    #[error("field `{field}` is not a valid ISO-8601 timestamp: {raw}")]
    Timestamp { field: &'static str, raw: String },
}

/// The transport connection failed. Fatal: triggers orderly shutdown.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
    #[error("transport closed unexpectedly")]
    Closed,
    #[error("failed to send subscribe message: {0}")]
    Subscribe(#[source] Box<tokio_tungstenite::tungstenite::Error>),
}

/// Persistence file I/O failed.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to open output file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write to output file failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Errors that can abort pipeline startup or force a shutdown. Everything
/// else in the pipeline is a locally-absorbed, counted error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not open persistence file at startup: {0}")]
    Startup(#[from] FileError),
}
