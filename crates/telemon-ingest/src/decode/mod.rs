//! Payload decoders.
//!
//! A decoder turns one validated payload into a [`DecodedUpdate`].
//! Every strategy shares the same contract so the pipeline can hold
//! any of them behind `Box<dyn Decoder>`.

pub mod command;
pub mod fixed;
pub mod ordered;
pub mod recoding;

pub use command::CommandDecoder;
pub use fixed::FixedFormatDecoder;
pub use ordered::OrderedKeyDecoder;
pub use recoding::RecodingDecoder;

use crate::error::Error;
use crate::value::DecodedUpdate;

/// Turns a validated payload into an ordered set of named values.
pub trait Decoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, Error>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, Error> {
        (**self).decode(payload)
    }
}

pub(crate) fn utf8(payload: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(payload).map_err(|e| Error::decode(format!("payload is not UTF-8: {e}")))
}
