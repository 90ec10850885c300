use thiserror::Error;

/// Top-level error type for the `telemon-ingest` crate.
///
/// Covers every failure mode between the wire and a decoded update:
/// device discovery, link I/O, the message bus, framing and decoding.
/// `telemon-core` maps these into its own error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Discovery ───────────────────────────────────────────────────
    /// No candidate device path matched and opened.
    #[error("No serial device found matching {pattern} ({} candidate(s) tried)", tried.len())]
    DeviceNotFound { pattern: String, tried: Vec<String> },

    /// An explicitly configured port could not be opened.
    #[error("Failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    // ── Link ────────────────────────────────────────────────────────
    /// I/O error while polling or reading an open link.
    #[error("Connection lost on {path}: {message}")]
    ConnectionLost { path: String, message: String },

    /// Operation attempted on a closed link.
    #[error("Link is not open")]
    NotConnected,

    // ── Bus ─────────────────────────────────────────────────────────
    /// WebSocket connection to the bus failed.
    #[error("Bus connection failed: {0}")]
    BusConnect(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Decoding ────────────────────────────────────────────────────
    /// Payload is malformed or has the wrong size.
    #[error("Decode error: {message}")]
    Decode { message: String },

    // ── Configuration ───────────────────────────────────────────────
    /// Pipeline component was built with impossible parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Device search pattern is not a valid regular expression.
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl Error {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns `true` if reconnecting might resolve this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost { .. } | Self::NotConnected | Self::BusConnect(_)
        )
    }

    /// Returns `true` for errors that only affect a single frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
