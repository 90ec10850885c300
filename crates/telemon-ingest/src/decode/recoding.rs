//! Tagged device records with code-table substitution.
//!
//! Record layout (the interior of a [`Framing::Tagged`](crate::framing::Framing::Tagged) frame):
//!
//! ```text
//! code:u8  type:u8  value  n:u8  params:[u8; n]
//! ```
//!
//! `type` is [`TAG_FIXED_POINT`] (little-endian `i32` divided by the
//! scale) or [`TAG_TEXT`] (NUL-terminated UTF-8).

use std::collections::HashMap;

use crate::decode::{Decoder, utf8};
use crate::error::Error;
use crate::value::{DecodedUpdate, Value};

/// Value is a little-endian `i32` fixed-point number.
pub const TAG_FIXED_POINT: u8 = 0x01;
/// Value is a NUL-terminated string.
pub const TAG_TEXT: u8 = 0x02;

/// Fixed-point divisor used by the reference firmware.
pub const DEFAULT_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RecodingDecoder {
    table: HashMap<u8, String>,
    scale: f64,
}

impl Default for RecodingDecoder {
    fn default() -> Self {
        Self {
            table: HashMap::new(),
            scale: DEFAULT_SCALE,
        }
    }
}

impl RecodingDecoder {
    pub fn new(table: HashMap<u8, String>) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Result<Self, Error> {
        if !scale.is_finite() || scale.abs() < f64::EPSILON {
            return Err(Error::InvalidConfig(format!("scale must be finite and non-zero, got {scale}")));
        }
        self.scale = scale;
        Ok(self)
    }

    /// Substitute `code` through the table, or pass it through.
    pub fn recode(&self, code: u8) -> Value {
        self.table
            .get(&code)
            .map_or(Value::Int(i64::from(code)), |name| Value::Text(name.clone()))
    }

    fn identifier(&self, code: u8) -> String {
        self.table
            .get(&code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

impl Decoder for RecodingDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, Error> {
        let [code, kind, rest @ ..] = payload else {
            return Err(Error::decode("tagged record shorter than its header"));
        };

        let (value, rest) = match *kind {
            TAG_FIXED_POINT => {
                let (raw, rest) = rest
                    .split_first_chunk::<4>()
                    .ok_or_else(|| Error::decode("truncated fixed-point value"))?;
                let scaled = f64::from(i32::from_le_bytes(*raw)) / self.scale;
                (Value::Float(scaled), rest)
            }
            TAG_TEXT => {
                let nul = rest
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or_else(|| Error::decode("unterminated text value"))?;
                let (text, rest) = rest.split_at(nul);
                (Value::from(utf8(text)?), rest.get(1..).unwrap_or_default())
            }
            other => return Err(Error::decode(format!("unknown value type 0x{other:02X}"))),
        };

        let [n, params @ ..] = rest else {
            return Err(Error::decode("missing parameter count"));
        };
        if params.len() != usize::from(*n) {
            return Err(Error::decode(format!(
                "expected {n} parameter bytes, got {}",
                params.len()
            )));
        }

        let mut values = Vec::with_capacity(params.len() + 1);
        values.push(value);
        values.extend(params.iter().map(|p| self.recode(*p)));

        let mut update = DecodedUpdate::new();
        update.push(self.identifier(*code), values);
        Ok(update)
    }
}
