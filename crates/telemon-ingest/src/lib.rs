//! Telemetry ingestion for telemon.
//!
//! Bytes come in from a serial link ([`serial`]) or a message bus
//! ([`bus`]), get cut into frames and validated ([`framing`],
//! [`validate`]), and are decoded into named values ([`decode`]).
//! [`Pipeline`] strings the wire-side stages together.

pub mod bus;
pub mod decode;
pub mod error;
pub mod framing;
pub mod pipeline;
pub mod scripted;
pub mod serial;
pub mod validate;
pub mod value;

pub use decode::{CommandDecoder, Decoder, FixedFormatDecoder, OrderedKeyDecoder, RecodingDecoder};
pub use error::Error;
pub use framing::{FramePolicy, FrameSelector, FrameStats, Framing};
pub use pipeline::{Pipeline, PipelineStats};
pub use serial::{ByteStreamTransport, Connector, PortSelection, SerialConfig, SerialHandle, SystemPorts};
pub use validate::{Validator, Verdict, WindowValidator};
pub use value::{DecodedUpdate, Value};
