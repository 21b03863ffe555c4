//! # Video Stream Demuxer
//!
//! Turns an arbitrarily chunked byte stream into frame units.
//!
//! A frame unit starts at a 4-byte start marker (`00 00 00 01`) and ends right
//! before the next one. The last, still unterminated unit is kept as
//! carry-over until a later chunk completes it. Bytes before the first marker
//! are discarded.
//!
//! ```text
//! chunk 1: .. preamble .. |00 00 00 01 67 ..|00 00 00 01 68 ..
//!                          ^ emitted         ^ carry-over
//! chunk 2: .. 68 cont ..  |00 00 00 01 65 ..
//!          ^ completes the carried unit      ^ new carry-over
//! ```
//!
//! Unit contents are not validated.
//!
//! ## Usage
//!
//! ```
//! use jjrc_link::video::VideoStreamDemuxer;
//!
//! let mut demuxer = VideoStreamDemuxer::new();
//!
//! let units: Vec<_> = demuxer.ingest(&[0xAA, 0, 0, 0, 1, 0x67, 0x42]).collect();
//! assert!(units.is_empty());
//!
//! let units: Vec<_> = demuxer.ingest(&[0, 0, 0, 1, 0x68]).collect();
//! assert_eq!(units.len(), 1);
//! assert_eq!(units[0].as_bytes(), &[0, 0, 0, 1, 0x67, 0x42]);
//! assert!(units[0].is_keyframe());
//! ```

use bytes::{Buf, Bytes, BytesMut};

/// Start marker delimiting frame units
pub const START_MARKER: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Start marker followed by the sequence parameter set header, which opens
/// the first decodable unit of a stream
pub const KEYFRAME_MARKER: [u8; 5] = [0x00, 0x00, 0x00, 0x01, 0x67];

const MARKER_LEN: usize = START_MARKER.len();

/// One complete frame unit, starting with [`START_MARKER`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameUnit {
    data: Bytes,
}

impl FrameUnit {
    /// Unit bytes including the start marker
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Give up the unit as shared bytes
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Length in bytes including the start marker
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Never true for units produced by the demuxer
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the unit starts with [`KEYFRAME_MARKER`]
    pub fn is_keyframe(&self) -> bool {
        self.data.starts_with(&KEYFRAME_MARKER)
    }
}

impl From<Bytes> for FrameUnit {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

/// Marker-delimited frame unit splitter with carry-over buffer
#[derive(Debug, Default)]
pub struct VideoStreamDemuxer {
    /// Starts with a marker once synced; otherwise holds at most a marker prefix
    carry: BytesMut,
    synced: bool,
    /// Carry-over bytes before this offset are known to hold no marker after offset 0
    scanned: usize,
}

impl VideoStreamDemuxer {
    /// Create a demuxer that has not seen any marker yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the units it completes
    ///
    /// The returned iterator is lazy. Units it does not yield before being
    /// dropped stay buffered and come out of the next call.
    pub fn ingest(&mut self, chunk: &[u8]) -> FrameUnits<'_> {
        self.carry.extend_from_slice(chunk);
        if !self.synced {
            self.sync();
        }
        FrameUnits { demuxer: self }
    }

    /// Whether the first start marker has been seen
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Bytes retained for the next call
    pub fn carry_over(&self) -> &[u8] {
        &self.carry
    }

    /// Drop all buffered bytes and wait for a new first marker
    pub fn reset(&mut self) {
        self.carry.clear();
        self.synced = false;
        self.scanned = 0;
    }

    fn sync(&mut self) {
        match find_marker(&self.carry, 0) {
            Some(pos) => {
                self.carry.advance(pos);
                self.synced = true;
                self.scanned = 0;
            }
            None => {
                // A marker may straddle this chunk and the next one
                let keep = (MARKER_LEN - 1).min(self.carry.len());
                let discard = self.carry.len() - keep;
                self.carry.advance(discard);
            }
        }
    }

    fn next_unit(&mut self) -> Option<FrameUnit> {
        if !self.synced {
            return None;
        }

        let from = self.scanned.max(1);
        match find_marker(&self.carry, from) {
            Some(pos) => {
                self.scanned = 0;
                Some(FrameUnit {
                    data: self.carry.split_to(pos).freeze(),
                })
            }
            None => {
                self.scanned = self.carry.len().saturating_sub(MARKER_LEN - 1);
                None
            }
        }
    }
}

/// Iterator over the units completed by one [`VideoStreamDemuxer::ingest`] call
#[derive(Debug)]
pub struct FrameUnits<'a> {
    demuxer: &'a mut VideoStreamDemuxer,
}

impl Iterator for FrameUnits<'_> {
    type Item = FrameUnit;

    fn next(&mut self) -> Option<FrameUnit> {
        self.demuxer.next_unit()
    }
}

fn find_marker(haystack: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(MARKER_LEN)
        .position(|window| window == START_MARKER)
        .map(|pos| pos + from)
}
