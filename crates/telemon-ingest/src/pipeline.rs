//! Frame selection + decoding, as one unit the ingestion loop drives.

use serde::Serialize;

use crate::decode::Decoder;
use crate::framing::{FrameSelector, FrameStats};
use crate::value::DecodedUpdate;

/// Counters across the whole pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    #[serde(flatten)]
    pub frames: FrameStats,
    /// Payloads the decoder failed on.
    pub decode_errors: u64,
}

/// Validator/selector followed by a decoder.
///
/// Decode failures are logged with the raw payload and counted; a bad
/// frame never stops the frames after it.
pub struct Pipeline {
    selector: FrameSelector,
    decoder: Box<dyn Decoder>,
    decode_errors: u64,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("selector", &self.selector)
            .field("decode_errors", &self.decode_errors)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(selector: FrameSelector, decoder: Box<dyn Decoder>) -> Self {
        Self {
            selector,
            decoder,
            decode_errors: 0,
        }
    }

    /// Feed bytes read from a byte-stream link; returns the decoded
    /// updates selected this cycle, oldest first.
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<DecodedUpdate> {
        self.selector.push(bytes);
        let payloads = self.selector.drain();
        payloads
            .iter()
            .filter_map(|payload| self.decode(payload))
            .collect()
    }

    /// Decode one discrete bus message; bus messages are already framed.
    pub fn ingest_message(&mut self, message: &[u8]) -> Option<DecodedUpdate> {
        self.decode(message)
    }

    /// Drop any partial frame. Called after the link is replaced.
    pub fn reset(&mut self) {
        self.selector.reset();
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames: self.selector.stats(),
            decode_errors: self.decode_errors,
        }
    }

    fn decode(&mut self, payload: &[u8]) -> Option<DecodedUpdate> {
        match self.decoder.decode(payload) {
            Ok(update) => Some(update),
            Err(e) => {
                self.decode_errors += 1;
                tracing::warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping undecodable frame"
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::decode::{FixedFormatDecoder, OrderedKeyDecoder};
    use crate::framing::{FramePolicy, Framing};
    use crate::validate::WindowValidator;
    use crate::value::Value;

    #[test]
    fn sequential_frames_decode_in_order() {
        let validator = WindowValidator::new(4, 0x02, 0x03).unwrap();
        let selector = FrameSelector::new(Framing::Window(validator), FramePolicy::Sequential);
        let decoder = FixedFormatDecoder::new("<h", ["v"]).unwrap();
        let mut pipeline = Pipeline::new(selector, Box::new(decoder));

        let updates = pipeline.ingest(&[0x02, 0x05, 0x00, 0x03, 0x02, 0x07, 0x00, 0x03]);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].get("v").unwrap(), &[Value::Int(5)]);
        assert_eq!(updates[1].get("v").unwrap(), &[Value::Int(7)]);
        assert_eq!(pipeline.stats().frames.accepted, 2);
    }

    #[test]
    fn decode_errors_are_counted() {
        let selector = FrameSelector::new(Framing::lines(), FramePolicy::Sequential);
        let decoder = FixedFormatDecoder::new("<i", ["v"]).unwrap();
        let mut pipeline = Pipeline::new(selector, Box::new(decoder));

        let updates = pipeline.ingest(b"ab\nabcd\n");
        assert_eq!(updates.len(), 1);
        assert_eq!(pipeline.stats().decode_errors, 1);
    }

    #[test]
    fn bus_messages_skip_framing() {
        let selector = FrameSelector::new(Framing::lines(), FramePolicy::Freshest);
        let decoder = OrderedKeyDecoder::new(["a"], ",").unwrap();
        let mut pipeline = Pipeline::new(selector, Box::new(decoder));

        let update = pipeline.ingest_message(&Bytes::from_static(b"9")).unwrap();
        assert_eq!(update.get("a").unwrap(), &[Value::from("9")]);
        assert_eq!(pipeline.stats().frames.accepted, 0);
    }
}
