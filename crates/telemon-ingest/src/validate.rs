//! Frame structural validation.

use crate::error::Error;

/// Outcome of validating one frame.
///
/// `Rejected` is a value, not an error: a malformed frame is dropped
/// and counted, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// Frame is well formed; the payload has framing stripped.
    Accepted(&'a [u8]),
    Rejected,
}

impl<'a> Verdict<'a> {
    pub fn payload(self) -> Option<&'a [u8]> {
        match self {
            Self::Accepted(p) => Some(p),
            Self::Rejected => None,
        }
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Structural check applied to a frame before decoding.
pub trait Validator: Send + Sync {
    fn validate<'a>(&self, frame: &'a [u8]) -> Verdict<'a>;
}

// ── WindowValidator ──────────────────────────────────────────────────

/// Fixed-length frame delimited by a start and an end marker byte.
///
/// Accepts iff `len == window_size`, `frame[0] == start_byte` and
/// `frame[len - 1] == end_byte`; the payload is the interior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowValidator {
    window_size: usize,
    start_byte: u8,
    end_byte: u8,
}

impl WindowValidator {
    pub fn new(window_size: usize, start_byte: u8, end_byte: u8) -> Result<Self, Error> {
        if window_size < 2 {
            return Err(Error::InvalidConfig(format!(
                "window_size must be at least 2 (start and end markers), got {window_size}"
            )));
        }
        Ok(Self {
            window_size,
            start_byte,
            end_byte,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn start_byte(&self) -> u8 {
        self.start_byte
    }

    pub fn end_byte(&self) -> u8 {
        self.end_byte
    }
}

impl Validator for WindowValidator {
    fn validate<'a>(&self, frame: &'a [u8]) -> Verdict<'a> {
        if frame.len() != self.window_size {
            return Verdict::Rejected;
        }
        match frame {
            [first, interior @ .., last] if *first == self.start_byte && *last == self.end_byte => {
                Verdict::Accepted(interior)
            }
            _ => Verdict::Rejected,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
