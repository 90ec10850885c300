// ── Core error types ──
//
// Errors surfaced by telemon-core. Wire-level failures from
// telemon-ingest are translated by the `From` impl below so callers
// only ever match on `CoreError`.

use thiserror::Error;

use crate::element::ElementError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport errors ─────────────────────────────────────────────
    #[error("No telemetry device found matching {pattern} ({} candidate(s) tried)", tried.len())]
    DeviceNotFound { pattern: String, tried: Vec<String> },

    #[error("Cannot open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Connection lost on {path}: {reason}")]
    ConnectionLost { path: String, reason: String },

    #[error("Message bus unavailable: {reason}")]
    Bus { reason: String },

    // ── Dispatch errors ──────────────────────────────────────────────
    #[error("Element id {id:?} is already in use")]
    DuplicateId { id: String },

    #[error("No element with id {id:?}")]
    UnknownElement { id: String },

    #[error("Rejected value for {id}: {source}")]
    InvalidElementValue {
        id: String,
        #[source]
        source: ElementError,
    },

    #[error("Undecodable frame: {message}")]
    Decode { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Output errors ────────────────────────────────────────────────
    #[error("Render sink failed: {0}")]
    Sink(#[from] std::io::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ── Conversion from ingest-layer errors ──────────────────────────────

impl From<telemon_ingest::Error> for CoreError {
    fn from(err: telemon_ingest::Error) -> Self {
        use telemon_ingest::Error as E;
        match err {
            E::DeviceNotFound { pattern, tried } => CoreError::DeviceNotFound { pattern, tried },
            E::OpenFailed { path, message } => CoreError::OpenFailed {
                path,
                reason: message,
            },
            E::ConnectionLost { path, message } => CoreError::ConnectionLost {
                path,
                reason: message,
            },
            E::NotConnected => CoreError::ConnectionLost {
                path: "<closed>".into(),
                reason: "link is not open".into(),
            },
            E::BusConnect(reason) => CoreError::Bus { reason },
            E::InvalidUrl(e) => CoreError::config(format!("invalid bus URL: {e}")),
            E::Decode { message } => CoreError::Decode { message },
            E::InvalidConfig(message) => CoreError::Config { message },
            E::InvalidPattern(e) => CoreError::config(format!("invalid device search pattern: {e}")),
        }
    }
}
