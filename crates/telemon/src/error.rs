//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use telemon_config::ConfigError;
use telemon_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const DEVICE: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("No telemetry device found matching {pattern}")]
    #[diagnostic(
        code(telemon::device_not_found),
        help(
            "{tried} candidate(s) were tried.\n\
             Check the cable, then run: telemon ports\n\
             Or name the device directly: telemon run --port <PATH>"
        )
    )]
    DeviceNotFound { pattern: String, tried: usize },

    #[error("Could not open {path}")]
    #[diagnostic(
        code(telemon::open_failed),
        help("{reason}\nIs another program holding the port, or is it missing permissions?")
    )]
    OpenFailed { path: String, reason: String },

    #[error("Lost the connection to {path}: {reason}")]
    #[diagnostic(code(telemon::connection_lost))]
    ConnectionLost { path: String, reason: String },

    #[error("Message bus unavailable: {reason}")]
    #[diagnostic(
        code(telemon::bus),
        help("Check transport.bus_url and that the publisher is running.")
    )]
    Bus { reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(telemon::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(telemon::no_config),
        help(
            "Create one with: telemon config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(telemon::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(telemon::config))]
    Config(Box<figment::Error>),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(telemon::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(telemon::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not encode config: {0}")]
    #[diagnostic(code(telemon::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DeviceNotFound { .. }
            | Self::OpenFailed { .. }
            | Self::ConnectionLost { .. }
            | Self::Bus { .. } => exit_code::DEVICE,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceNotFound { pattern, tried } => CliError::DeviceNotFound {
                pattern,
                tried: tried.len(),
            },
            CoreError::OpenFailed { path, reason } => CliError::OpenFailed { path, reason },
            CoreError::ConnectionLost { path, reason } => CliError::ConnectionLost { path, reason },
            CoreError::Bus { reason } => CliError::Bus { reason },
            CoreError::DuplicateId { id } => CliError::Validation {
                field: "layout".into(),
                reason: format!("element id '{id}' is used twice"),
            },
            e @ (CoreError::UnknownElement { .. } | CoreError::InvalidElementValue { .. }) => {
                CliError::Validation {
                    field: "layout".into(),
                    reason: e.to_string(),
                }
            }
            CoreError::Decode { message } => CliError::Validation {
                field: "decoder".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Sink(e) => CliError::Io(e),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<telemon_ingest::Error> for CliError {
    fn from(err: telemon_ingest::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            e @ ConfigError::UnknownTemplate { .. } => CliError::Validation {
                field: "layout".into(),
                reason: e.to_string(),
            },
            ConfigError::Serialization(e) => CliError::Toml(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Ingest(e) => e.into(),
            ConfigError::Core(e) => e.into(),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
