//! Display side of telemon.
//!
//! [`element`] holds the widget kinds, [`template`] their declarative
//! form, [`group`] prefixed collections of them. [`Manager`] registers
//! elements and routes decoded updates to them; [`Monitor`] drives
//! ingestion and rendering into a [`sink`].

pub mod config;
pub mod element;
pub mod error;
pub mod group;
pub mod manager;
pub mod monitor;
pub mod sink;
pub mod template;

pub use config::MonitorConfig;
pub use element::{Element, ElementError, Render, Widget};
pub use error::CoreError;
pub use group::Group;
pub use manager::{DispatchStats, Manager, Node};
pub use monitor::{Monitor, RunSummary, Source};
pub use sink::{RemoteSink, RenderSink, TerminalSink};
pub use template::{ElementTemplate, WidgetSpec};
