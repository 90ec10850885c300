//! Frame extraction and freshest-frame selection.
//!
//! A [`FrameSelector`] accumulates whatever the transport delivered,
//! finds complete frames for the configured [`Framing`], runs them
//! through validation and hands back payloads according to the
//! [`FramePolicy`]. Under [`FramePolicy::Freshest`] only the newest
//! complete valid frame survives a drain; everything older is counted
//! as superseded and dropped, never queued.

use std::ops::Range;

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::decode::recoding::{TAG_FIXED_POINT, TAG_TEXT};
use crate::validate::{Validator, Verdict, WindowValidator};

/// Upper bound on bytes held while waiting for a frame to complete.
pub const DEFAULT_MAX_BUFFER: usize = 4096;

// ── Framing / policy ─────────────────────────────────────────────────

/// How frames are delimited on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    /// Text frames ending in `terminator`; a trailing `\r` is stripped.
    /// With a validator each line must also pass it.
    Lines {
        terminator: u8,
        validator: Option<WindowValidator>,
    },
    /// Fixed-length frames; candidates begin at the validator's start byte.
    Window(WindowValidator),
    /// Variable-length tagged records: `start, code, type, value, n, params[n], end`.
    Tagged { start: u8, end: u8 },
}

impl Framing {
    pub fn lines() -> Self {
        Self::Lines {
            terminator: b'\n',
            validator: None,
        }
    }

    pub fn tagged() -> Self {
        Self::Tagged {
            start: 0xAA,
            end: 0xFF,
        }
    }
}

/// Which of the complete frames in the buffer a drain yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePolicy {
    /// Only the newest complete valid frame; the rest of the buffer is discarded.
    #[default]
    Freshest,
    /// Every complete valid frame in arrival order.
    Sequential,
}

/// Running counters for one selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    /// Frames handed out by `drain`.
    pub accepted: u64,
    /// Candidates the validator turned down.
    pub rejected: u64,
    /// Valid frames dropped because a newer one was available.
    pub superseded: u64,
    /// Bytes dropped to keep the buffer bounded.
    pub overflowed: u64,
}

// ── FrameSelector ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FrameSelector {
    framing: Framing,
    policy: FramePolicy,
    max_buffer: usize,
    buffer: BytesMut,
    /// Lines only: the buffer head is the tail of a discarded line.
    resync: bool,
    stats: FrameStats,
}

/// Result of one pass over the buffer.
struct Scan {
    /// Payload ranges of valid frames, oldest first.
    frames: Vec<Range<usize>>,
    rejected: u64,
    /// Bytes before this index can never become part of a frame.
    consumed: usize,
}

impl FrameSelector {
    pub fn new(framing: Framing, policy: FramePolicy) -> Self {
        Self {
            framing,
            policy,
            max_buffer: DEFAULT_MAX_BUFFER,
            buffer: BytesMut::new(),
            resync: false,
            stats: FrameStats::default(),
        }
    }

    pub fn with_max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer.max(1);
        self
    }

    pub fn framing(&self) -> &Framing {
        &self.framing
    }

    pub fn policy(&self) -> FramePolicy {
        self.policy
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Bytes currently held waiting for a frame to complete.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, data: &[u8]) {
        let mut data = data;
        if self.resync {
            if let Framing::Lines { terminator, .. } = self.framing {
                let Some(pos) = data.iter().position(|b| *b == terminator) else {
                    return;
                };
                data = data.get(pos + 1..).unwrap_or_default();
            }
            self.resync = false;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Forget buffered bytes; the next frame starts from scratch.
    ///
    /// Called after the link is replaced, so a half-received line from
    /// the old connection is never glued onto the new stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.resync = matches!(self.framing, Framing::Lines { .. });
    }

    /// Extract payloads per the policy and compact the buffer.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let scan = self.scan();
        self.stats.rejected += scan.rejected;

        if scan.frames.is_empty() {
            self.buffer.advance(scan.consumed);
            self.enforce_bound();
            return Vec::new();
        }

        match self.policy {
            FramePolicy::Freshest => {
                let count = scan.frames.len();
                let payload = scan
                    .frames
                    .last()
                    .and_then(|r| self.buffer.get(r.clone()))
                    .map(Bytes::copy_from_slice)
                    .unwrap_or_default();

                let superseded = count - 1;
                if superseded > 0 {
                    tracing::trace!(superseded, "Dropped stale frames");
                }
                self.stats.superseded += u64::try_from(superseded).unwrap_or(u64::MAX);
                self.stats.accepted += 1;

                let partial_dropped = scan.consumed < self.buffer.len();
                self.resync = partial_dropped && matches!(self.framing, Framing::Lines { .. });
                self.buffer.clear();
                vec![payload]
            }
            FramePolicy::Sequential => {
                let payloads: Vec<Bytes> = scan
                    .frames
                    .iter()
                    .filter_map(|r| self.buffer.get(r.clone()))
                    .map(Bytes::copy_from_slice)
                    .collect();
                self.stats.accepted += u64::try_from(payloads.len()).unwrap_or(u64::MAX);
                self.buffer.advance(scan.consumed);
                self.enforce_bound();
                payloads
            }
        }
    }

    fn enforce_bound(&mut self) {
        let len = self.buffer.len();
        if len <= self.max_buffer {
            return;
        }
        let dropped = match self.framing {
            // A line with its head cut off is garbage; wait for the next one.
            Framing::Lines { .. } => {
                self.buffer.clear();
                self.resync = true;
                len
            }
            Framing::Window(_) | Framing::Tagged { .. } => {
                let excess = len - self.max_buffer;
                self.buffer.advance(excess);
                excess
            }
        };
        tracing::debug!(dropped, max_buffer = self.max_buffer, "Frame buffer overflow");
        self.stats.overflowed += u64::try_from(dropped).unwrap_or(u64::MAX);
    }

    fn scan(&self) -> Scan {
        match &self.framing {
            Framing::Lines {
                terminator,
                validator,
            } => scan_lines(&self.buffer, *terminator, validator.as_ref()),
            Framing::Window(v) => scan_window(&self.buffer, v),
            Framing::Tagged { start, end } => scan_tagged(&self.buffer, *start, *end),
        }
    }
}

// ── Scanners ─────────────────────────────────────────────────────────

fn scan_lines(buf: &[u8], terminator: u8, validator: Option<&WindowValidator>) -> Scan {
    let mut frames = Vec::new();
    let mut rejected = 0;
    let mut start = 0;

    while let Some(offset) = buf
        .get(start..)
        .and_then(|rest| rest.iter().position(|b| *b == terminator))
    {
        let end_of_line = start + offset;
        let mut end = end_of_line;
        if end > start && buf.get(end - 1) == Some(&b'\r') {
            end -= 1;
        }

        if end > start {
            match validator {
                None => frames.push(start..end),
                Some(v) => match buf.get(start..end).map(|line| v.validate(line)) {
                    Some(Verdict::Accepted(payload)) => {
                        frames.push(start + 1..start + 1 + payload.len());
                    }
                    _ => rejected += 1,
                },
            }
        }
        start = end_of_line + 1;
    }

    Scan {
        frames,
        rejected,
        consumed: start,
    }
}

fn scan_window(buf: &[u8], validator: &WindowValidator) -> Scan {
    let window = validator.window_size();
    let mut frames = Vec::new();
    let mut rejected = 0;
    let mut i = 0;

    loop {
        let Some(offset) = buf
            .get(i..)
            .and_then(|rest| rest.iter().position(|b| *b == validator.start_byte()))
        else {
            i = buf.len();
            break;
        };
        i += offset;

        let Some(candidate) = buf.get(i..i + window) else {
            break;
        };
        match validator.validate(candidate) {
            Verdict::Accepted(payload) => {
                frames.push(i + 1..i + 1 + payload.len());
                i += window;
            }
            Verdict::Rejected => {
                rejected += 1;
                i += 1;
            }
        }
    }

    Scan {
        frames,
        rejected,
        consumed: i,
    }
}

enum Tag {
    Complete(usize),
    Incomplete,
    Invalid,
}

/// Length of the tagged record at the head of `buf` (which starts with the start byte).
fn tagged_len(buf: &[u8], end: u8) -> Tag {
    let Some(&kind) = buf.get(2) else {
        return Tag::Incomplete;
    };
    let mut idx = 3;
    match kind {
        TAG_FIXED_POINT => idx += 4,
        TAG_TEXT => {
            let Some(nul) = buf
                .get(idx..)
                .and_then(|rest| rest.iter().position(|b| *b == 0))
            else {
                return Tag::Incomplete;
            };
            idx += nul + 1;
        }
        _ => return Tag::Invalid,
    }
    let Some(&n) = buf.get(idx) else {
        return Tag::Incomplete;
    };
    idx += 1 + usize::from(n);
    match buf.get(idx) {
        None => Tag::Incomplete,
        Some(b) if *b == end => Tag::Complete(idx + 1),
        Some(_) => Tag::Invalid,
    }
}

fn scan_tagged(buf: &[u8], start: u8, end: u8) -> Scan {
    let mut frames = Vec::new();
    let mut rejected = 0;
    let mut i = 0;

    loop {
        let Some(offset) = buf
            .get(i..)
            .and_then(|rest| rest.iter().position(|b| *b == start))
        else {
            i = buf.len();
            break;
        };
        i += offset;

        match tagged_len(buf.get(i..).unwrap_or_default(), end) {
            Tag::Complete(len) => {
                frames.push(i + 1..i + len - 1);
                i += len;
            }
            Tag::Invalid => {
                rejected += 1;
                i += 1;
            }
            Tag::Incomplete => break,
        }
    }

    Scan {
        frames,
        rejected,
        consumed: i,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn window() -> WindowValidator {
        WindowValidator::new(5, 0x02, 0x03).unwrap()
    }

    fn payloads(frames: &[Bytes]) -> Vec<&[u8]> {
        frames.iter().map(Bytes::as_ref).collect()
    }

    #[test]
    fn freshest_keeps_only_newest_window_frame() {
        let mut sel = FrameSelector::new(Framing::Window(window()), FramePolicy::Freshest);
        sel.push(&[0x02, 1, 2, 3, 0x03, 0x02, 4, 5, 6, 0x03]);

        let out = sel.drain();
        assert_eq!(payloads(&out), vec![&[4_u8, 5, 6][..]]);
        assert_eq!(sel.stats().superseded, 1);
        assert_eq!(sel.stats().accepted, 1);
        assert_eq!(sel.buffered(), 0);
    }

    #[test]
    fn freshest_discards_trailing_partial() {
        let mut sel = FrameSelector::new(Framing::Window(window()), FramePolicy::Freshest);
        sel.push(&[0x02, 1, 2, 3, 0x03, 0x02, 9]);
        assert_eq!(payloads(&sel.drain()), vec![&[1_u8, 2, 3][..]]);
        assert_eq!(sel.buffered(), 0);

        // The cut-off frame's remainder is garbage without a start byte.
        sel.push(&[9, 0x03]);
        assert!(sel.drain().is_empty());
        assert_eq!(sel.buffered(), 0);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut sel = FrameSelector::new(Framing::Window(window()), FramePolicy::Freshest);
        sel.push(&[0xEE, 0x02, 1, 2]);
        assert!(sel.drain().is_empty());
        assert_eq!(sel.buffered(), 3);

        sel.push(&[3, 0x03]);
        assert_eq!(payloads(&sel.drain()), vec![&[1_u8, 2, 3][..]]);
    }

    #[test]
    fn rejected_candidates_are_counted() {
        let mut sel = FrameSelector::new(Framing::Window(window()), FramePolicy::Sequential);
        sel.push(&[0x02, 1, 2, 3, 0x04, 0x02, 7, 8, 9, 0x03]);

        let out = sel.drain();
        assert_eq!(payloads(&out), vec![&[7_u8, 8, 9][..]]);
        assert_eq!(sel.stats().rejected, 1);
    }

    #[test]
    fn sequential_returns_every_line_in_order() {
        let mut sel = FrameSelector::new(Framing::lines(), FramePolicy::Sequential);
        sel.push(b"1,2\r\n3,4\n\n5,");

        let out = sel.drain();
        assert_eq!(payloads(&out), vec![&b"1,2"[..], &b"3,4"[..]]);
        assert_eq!(sel.buffered(), 2);

        sel.push(b"6\n");
        assert_eq!(payloads(&sel.drain()), vec![&b"5,6"[..]]);
    }

    #[test]
    fn freshest_lines_resync_after_dropping_partial() {
        let mut sel = FrameSelector::new(Framing::lines(), FramePolicy::Freshest);
        sel.push(b"1,2\n3,4\n5,");
        assert_eq!(payloads(&sel.drain()), vec![&b"3,4"[..]]);

        // "6\n" finishes the discarded "5," line and must not surface.
        sel.push(b"6\n7,8\n");
        assert_eq!(payloads(&sel.drain()), vec![&b"7,8"[..]]);
    }

    #[test]
    fn lines_with_validator_strip_markers() {
        let validator = WindowValidator::new(7, b'<', b'>').unwrap();
        let framing = Framing::Lines {
            terminator: b'\n',
            validator: Some(validator),
        };
        let mut sel = FrameSelector::new(framing, FramePolicy::Sequential);
        sel.push(b"<1,2,3>\n<1,2,3\n<4,5,6>\n");

        assert_eq!(payloads(&sel.drain()), vec![&b"1,2,3"[..], &b"4,5,6"[..]]);
        assert_eq!(sel.stats().rejected, 1);
    }

    #[test]
    fn overlong_line_overflows_and_resyncs() {
        let mut sel = FrameSelector::new(Framing::lines(), FramePolicy::Freshest).with_max_buffer(8);
        sel.push(b"abcdefghijkl");
        assert!(sel.drain().is_empty());
        assert_eq!(sel.stats().overflowed, 12);
        assert_eq!(sel.buffered(), 0);

        sel.push(b"mn\nok\n");
        assert_eq!(payloads(&sel.drain()), vec![&b"ok"[..]]);
    }

    #[test]
    fn reset_drops_half_line() {
        let mut sel = FrameSelector::new(Framing::lines(), FramePolicy::Freshest);
        sel.push(b"12,3");
        assert!(sel.drain().is_empty());

        sel.reset();
        sel.push(b"4\n5,6\n");
        assert_eq!(payloads(&sel.drain()), vec![&b"5,6"[..]]);
    }

    #[test]
    fn tagged_frames_are_extracted() {
        let mut sel = FrameSelector::new(Framing::tagged(), FramePolicy::Sequential);
        let fixed = [0xAA, 0x05, 0x01, 0xE8, 0x03, 0x00, 0x00, 0x01, 0x07, 0xFF];
        let text = [0xAA, 0x06, 0x02, b'o', b'k', 0x00, 0x00, 0xFF];
        let mut wire = Vec::new();
        wire.extend_from_slice(&fixed);
        wire.extend_from_slice(&text);
        sel.push(&wire);

        let out = sel.drain();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref(), &fixed[1..fixed.len() - 1]);
        assert_eq!(out[1].as_ref(), &text[1..text.len() - 1]);
    }

    #[test]
    fn tagged_unknown_type_is_rejected() {
        let mut sel = FrameSelector::new(Framing::tagged(), FramePolicy::Freshest);
        sel.push(&[0xAA, 0x05, 0x09, 0x00, 0xFF]);
        assert!(sel.drain().is_empty());
        assert_eq!(sel.stats().rejected, 1);
    }

    #[test]
    fn tagged_waits_for_string_terminator() {
        let mut sel = FrameSelector::new(Framing::tagged(), FramePolicy::Freshest);
        sel.push(&[0xAA, 0x06, 0x02, b'o']);
        assert!(sel.drain().is_empty());
        sel.push(&[b'k', 0x00, 0x00, 0xFF]);
        assert_eq!(sel.drain().len(), 1);
    }
}
