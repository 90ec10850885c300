//! Configuration for telemon.
//!
//! One TOML file describes the link, the decoder, the frame selector and
//! the dashboard layout. Loading layers built-in defaults, the file, and
//! `TELEMON_` environment variables; the `build_*` functions translate
//! the result into the runtime objects `telemon-core` and
//! `telemon-ingest` expect.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

use telemon_core::element::{IndicatorLampConfig, RangeBarConfig, TextElementConfig};
use telemon_core::{CoreError, ElementTemplate, Group, Manager, MonitorConfig, WidgetSpec};
use telemon_ingest::framing::DEFAULT_MAX_BUFFER;
use telemon_ingest::serial::{DEFAULT_BAUD_RATE, default_port_pattern};
use telemon_ingest::{
    CommandDecoder, Decoder, FixedFormatDecoder, FramePolicy, FrameSelector, Framing,
    OrderedKeyDecoder, Pipeline, PortSelection, RecodingDecoder, SerialConfig, WindowValidator,
};

/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "TELEMON_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("layout references unknown template '{name}'")]
    UnknownTemplate { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error(transparent)]
    Ingest(#[from] telemon_ingest::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn validation(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub decoder: DecoderConfig,
    /// Sliding-window check on binary frames; absent means no check.
    pub validator: Option<ValidatorConfig>,
    pub framing: FramingConfig,
    pub renderer: RendererConfig,
    pub ingestion: IngestionConfig,
    /// Named element lists that `[[layout]]` groups instantiate.
    pub templates: BTreeMap<String, Vec<ElementTemplate>>,
    /// Top-level dashboard entries, top to bottom.
    pub layout: Vec<LayoutEntry>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Serial,
    Bus,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,

    /// Explicit serial device; autodetect when unset.
    pub port: Option<String>,

    /// Regex (or plain substring) a detected device path must match.
    pub device_search_pattern: Option<String>,

    /// Replaces the platform's device-path filter.
    pub port_pattern: Option<String>,

    pub baud_rate: u32,

    pub timeout_ms: u64,

    pub reconnect_delay_secs: f64,

    /// WebSocket endpoint when `kind = "bus"`.
    pub bus_url: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Serial,
            port: None,
            device_search_pattern: None,
            port_pattern: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 100,
            reconnect_delay_secs: 5.0,
            bus_url: None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecoderKind {
    /// Separator-delimited values zipped onto `keys`.
    Ordered,
    /// Packed binary struct described by `layout`.
    Fixed,
    /// Tagged binary records with code substitution through `table`.
    Recoding,
    /// `<id> <values...>` segments.
    #[default]
    Command,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub kind: DecoderKind,
    pub keys: Vec<String>,
    pub separator: String,
    pub layout: Option<String>,
    /// Code → name substitutions, keyed by decimal or `0x` hex code.
    pub table: BTreeMap<String, String>,
    pub scale: Option<f64>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            kind: DecoderKind::Command,
            keys: Vec::new(),
            separator: ",".into(),
            layout: None,
            table: BTreeMap::new(),
            scale: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidatorConfig {
    pub window_size: usize,
    pub start_byte: u8,
    pub end_byte: u8,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FramingKind {
    Lines,
    Window,
    Tagged,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Derived from the decoder kind when unset.
    pub kind: Option<FramingKind>,
    pub policy: FramePolicy,
    pub max_buffer: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            kind: None,
            policy: FramePolicy::Freshest,
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputKind {
    #[default]
    Terminal,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    pub frequency_hz: f64,
    pub output: OutputKind,
    /// Address the remote push server binds when `output = "remote"`.
    pub listen: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frequency_hz: telemon_core::config::DEFAULT_FREQUENCY_HZ,
            output: OutputKind::Terminal,
            listen: "127.0.0.1:8765".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub poll_frequency_hz: f64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            poll_frequency_hz: telemon_core::config::DEFAULT_POLL_FREQUENCY_HZ,
        }
    }
}

fn default_border() -> bool {
    true
}

/// One `[[layout]]` entry: a group stamped from a template, or a
/// standalone element.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LayoutEntry {
    Group {
        group: String,
        template: String,
        #[serde(default = "default_border")]
        border: bool,
    },
    Element(ElementTemplate),
}

impl Config {
    /// A small working dashboard, written by `telemon config init`.
    pub fn starter() -> Self {
        let axis = vec![
            ElementTemplate::new(
                "pos",
                WidgetSpec::RangeBar(RangeBarConfig {
                    label: "Position".into(),
                    unit: "mm".into(),
                    ..RangeBarConfig::default()
                }),
            ),
            ElementTemplate::new(
                "homed",
                WidgetSpec::IndicatorLamp(IndicatorLampConfig {
                    label: "Homed".into(),
                    ..IndicatorLampConfig::default()
                }),
            ),
        ];

        Self {
            templates: BTreeMap::from([("axis".to_owned(), axis)]),
            layout: vec![
                LayoutEntry::Element(ElementTemplate::new(
                    "status",
                    WidgetSpec::Text(TextElementConfig {
                        static_text: Some("Status: ".into()),
                        text: "waiting".into(),
                        ..TextElementConfig::default()
                    }),
                )),
                LayoutEntry::Group {
                    group: "X".into(),
                    template: "axis".into(),
                    border: true,
                },
                LayoutEntry::Group {
                    group: "Y".into(),
                    template: "axis".into(),
                    border: true,
                },
            ],
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "telemon", "telemon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default log file for `telemon run`, which cannot log to the terminal
/// it draws on.
pub fn log_path() -> PathBuf {
    ProjectDirs::from("rs", "telemon", "telemon").map_or_else(
        || dirs_fallback().join("telemon.log"),
        |dirs| dirs.data_local_dir().join("telemon.log"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("telemon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` if it exists, then `TELEMON_*` variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Translation to runtime objects ──────────────────────────────────

/// Serial link settings from `[transport]`.
pub fn serial_config(transport: &TransportConfig) -> SerialConfig {
    let port = match &transport.port {
        Some(path) => PortSelection::Path(path.clone()),
        None => PortSelection::Autodetect {
            search: transport.device_search_pattern.clone(),
        },
    };
    SerialConfig {
        port,
        baud_rate: transport.baud_rate,
        timeout: Duration::from_millis(transport.timeout_ms),
        pattern: transport
            .port_pattern
            .clone()
            .unwrap_or_else(|| default_port_pattern().to_owned()),
    }
}

pub fn bus_url(transport: &TransportConfig) -> Result<Url, ConfigError> {
    let raw = transport
        .bus_url
        .as_deref()
        .ok_or_else(|| validation("transport.bus_url", "required when kind = \"bus\""))?;
    Url::parse(raw).map_err(|e| validation("transport.bus_url", format!("{raw}: {e}")))
}

pub fn build_decoder(decoder: &DecoderConfig) -> Result<Box<dyn Decoder>, ConfigError> {
    let built: Box<dyn Decoder> = match decoder.kind {
        DecoderKind::Ordered => {
            if decoder.keys.is_empty() {
                return Err(validation("decoder.keys", "ordered decoding needs at least one key"));
            }
            Box::new(OrderedKeyDecoder::new(
                decoder.keys.iter().cloned(),
                decoder.separator.clone(),
            )?)
        }
        DecoderKind::Fixed => {
            let layout = decoder
                .layout
                .as_deref()
                .ok_or_else(|| validation("decoder.layout", "required when kind = \"fixed\""))?;
            Box::new(FixedFormatDecoder::new(layout, decoder.keys.iter().cloned())?)
        }
        DecoderKind::Recoding => {
            let table = decoder
                .table
                .iter()
                .map(|(code, name)| Ok((parse_code(code)?, name.clone())))
                .collect::<Result<HashMap<_, _>, ConfigError>>()?;
            let recoding = RecodingDecoder::new(table);
            match decoder.scale {
                Some(scale) => Box::new(recoding.with_scale(scale)?),
                None => Box::new(recoding),
            }
        }
        DecoderKind::Command => Box::new(CommandDecoder),
    };
    Ok(built)
}

fn parse_code(raw: &str) -> Result<u8, ConfigError> {
    let trimmed = raw.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|e| validation("decoder.table", format!("code {raw:?}: {e}")))
}

/// Framing implied by the decoder when `[framing] kind` is unset.
pub fn framing_kind(config: &Config) -> FramingKind {
    config.framing.kind.unwrap_or(match config.decoder.kind {
        DecoderKind::Ordered | DecoderKind::Command => FramingKind::Lines,
        DecoderKind::Fixed => FramingKind::Window,
        DecoderKind::Recoding => FramingKind::Tagged,
    })
}

pub fn build_framing(config: &Config) -> Result<Framing, ConfigError> {
    let validator = config
        .validator
        .map(|v| WindowValidator::new(v.window_size, v.start_byte, v.end_byte))
        .transpose()?;

    Ok(match framing_kind(config) {
        FramingKind::Lines => Framing::Lines {
            terminator: b'\n',
            validator,
        },
        FramingKind::Window => Framing::Window(validator.ok_or_else(|| {
            validation("validator", "window framing needs a [validator] section")
        })?),
        FramingKind::Tagged => Framing::tagged(),
    })
}

/// Frame selector + decoder for the configured wire format.
pub fn build_pipeline(config: &Config) -> Result<Pipeline, ConfigError> {
    if config.framing.max_buffer == 0 {
        return Err(validation("framing.max_buffer", "must be at least 1"));
    }
    let selector = FrameSelector::new(build_framing(config)?, config.framing.policy)
        .with_max_buffer(config.framing.max_buffer);
    Ok(Pipeline::new(selector, build_decoder(&config.decoder)?))
}

/// Register every `[[layout]]` entry in order.
pub fn build_manager(config: &Config) -> Result<Manager, ConfigError> {
    let mut manager = Manager::new();
    for entry in &config.layout {
        match entry {
            LayoutEntry::Group {
                group,
                template,
                border,
            } => {
                let templates =
                    config
                        .templates
                        .get(template)
                        .ok_or_else(|| ConfigError::UnknownTemplate {
                            name: template.clone(),
                        })?;
                manager.add_group(Group::from_templates(group.as_str(), templates, *border)?)?;
            }
            LayoutEntry::Element(template) => manager.add_template(template)?,
        }
    }
    Ok(manager)
}

pub fn monitor_config(config: &Config) -> Result<MonitorConfig, ConfigError> {
    let delay = config.transport.reconnect_delay_secs;
    let reconnect_delay = Duration::try_from_secs_f64(delay)
        .map_err(|e| validation("transport.reconnect_delay_secs", format!("{delay}: {e}")))?;
    Ok(MonitorConfig::from_rates(
        config.renderer.frequency_hz,
        config.ingestion.poll_frequency_hz,
        reconnect_delay,
    )?)
}

// ── Tests ───────────────────────────────────────────────────────────
