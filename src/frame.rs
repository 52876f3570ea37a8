//! Frame parsing, encoding, and checksum.
//!
//! Wire format (shared by the Actor and Arm links):
//! ```text
//! 24 24 [TYPE] [LEN] (payload: LEN big-endian u16 words) [CRC] 23 23
//! ```
//! `LEN` counts 16-bit words, not bytes, so a payload of N words occupies
//! `2*N` bytes on the wire. `CRC` is the XOR of every byte from the first
//! header byte through the last payload byte, masked to 8 bits.

use crate::error::{FrameError, FrameResult};

const HEADER: [u8; 2] = [0x24, 0x24];
const FOOTER: [u8; 2] = [0x23, 0x23];

/// Maximum word count the one-byte `DataLen` field can encode.
const MAX_PAYLOAD_WORDS: usize = 255;

/// Protocol-level invariant on `DataLen` (spec §3): real frames never carry
/// more than this many words. The decoder uses it to recognize a clearly
/// bogus length byte and resync immediately instead of waiting for bytes
/// that will never arrive.
const MAX_VALID_DATA_LEN: usize = 125;

/// A decoded frame: a data type tag plus its big-endian u16 payload words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data_type: u8,
    pub payload: Vec<u16>,
}

impl Frame {
    pub fn new(data_type: u8, payload: Vec<u16>) -> Self {
        Self { data_type, payload }
    }

    /// Encode into wire bytes: header, type, len, payload words (BE), CRC, footer.
    pub fn encode(&self) -> FrameResult<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD_WORDS {
            return Err(FrameError::PayloadTooLong {
                words: self.payload.len(),
            });
        }

        let mut wire = Vec::with_capacity(7 + 2 * self.payload.len());
        wire.extend_from_slice(&HEADER);
        wire.push(self.data_type);
        wire.push(self.payload.len() as u8);
        for word in &self.payload {
            wire.extend_from_slice(&word.to_be_bytes());
        }

        let crc = xor_checksum(&wire);
        wire.push(crc);
        wire.extend_from_slice(&FOOTER);
        Ok(wire)
    }

    /// Parse a single complete wire frame (including header and footer).
    pub fn parse(wire: &[u8]) -> FrameResult<Self> {
        if wire.len() < 7 {
            return Err(FrameError::FrameTooShort { len: wire.len() });
        }
        if wire[0..2] != HEADER {
            return Err(FrameError::MissingHeader);
        }

        let data_type = wire[2];
        let data_len = wire[3] as usize;
        let total_len = 7 + 2 * data_len;
        if wire.len() < total_len {
            return Err(FrameError::FrameTooShort { len: wire.len() });
        }

        let crc_index = 4 + 2 * data_len;
        let computed = xor_checksum(&wire[..crc_index]);
        let expected = wire[crc_index];
        if computed != expected {
            return Err(FrameError::ChecksumMismatch { expected, computed });
        }

        if wire[crc_index + 1..crc_index + 3] != FOOTER {
            return Err(FrameError::MissingFooter);
        }

        let mut payload = Vec::with_capacity(data_len);
        for i in 0..data_len {
            let off = 4 + 2 * i;
            payload.push(u16::from_be_bytes([wire[off], wire[off + 1]]));
        }

        Ok(Frame { data_type, payload })
    }
}

/// XOR of every byte in `bytes`, masked to 8 bits (XOR is already 8-bit here
/// since the inputs are bytes, but the mask documents the wire invariant).
fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b) & 0xFF
}

/// Stateful byte-stream decoder. Buffers partial frames across `feed()`
/// calls and recovers framing after any malformed byte by rescanning for
/// the next header candidate, so it can be driven by arbitrarily chunked
/// input (single bytes, full TCP segments, or anything in between) and
/// always produce the same sequence of frames.
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(256) }
    }

    /// Feed new bytes and extract any complete, valid frames.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();
        while let Some(frame) = self.try_parse_one() {
            frames.push(frame);
        }
        frames
    }

    /// Feed a single byte; convenience wrapper for byte-at-a-time tests.
    pub fn push_byte(&mut self, byte: u8) -> Vec<Frame> {
        self.feed(&[byte])
    }

    /// Try to parse and remove one frame from the head of the buffer.
    /// Returns `None` when the buffer holds no complete frame (either
    /// because more bytes are needed, or because it was fully drained by
    /// resync discards).
    fn try_parse_one(&mut self) -> Option<Frame> {
        loop {
            if self.buf.len() < 2 {
                return None;
            }
            if self.buf[0..2] != HEADER {
                self.buf.remove(0);
                continue;
            }
            if self.buf.len() < 4 {
                return None;
            }

            let data_len = self.buf[3] as usize;
            if data_len > MAX_VALID_DATA_LEN {
                // Cannot be a real frame; waiting for 7+2*data_len bytes
                // could stall arbitrarily long. Resync now.
                self.buf.remove(0);
                continue;
            }

            let total_len = 7 + 2 * data_len;
            if self.buf.len() < total_len {
                return None;
            }

            match Frame::parse(&self.buf[..total_len]) {
                Ok(frame) => {
                    self.buf.drain(..total_len);
                    return Some(frame);
                }
                Err(_) => {
                    // Checksum or footer mismatch: drop the leading header
                    // byte and rescan for the next candidate.
                    self.buf.remove(0);
                    continue;
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_zero_length_payload() {
        let frame = Frame::new(0x01, vec![]);
        let wire = frame.encode().unwrap();
        // header(2) type(1) len(1) crc(1) footer(2) = 7 bytes
        assert_eq!(wire, vec![0x24, 0x24, 0x01, 0x00, 0x01, 0x23, 0x23]);
    }

    #[test]
    fn round_trip_with_payload() {
        let frame = Frame::new(0x10, vec![0x0001, 0x1234]);
        let wire = frame.encode().unwrap();
        let parsed = Frame::parse(&wire).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn payload_too_long() {
        let frame = Frame::new(0x01, vec![0; 256]);
        assert!(matches!(
            frame.encode(),
            Err(FrameError::PayloadTooLong { words: 256 })
        ));
    }

    #[test]
    fn bad_checksum() {
        let frame = Frame::new(0x10, vec![0x0001]);
        let mut wire = frame.encode().unwrap();
        let crc_index = wire.len() - 3;
        wire[crc_index] ^= 0xFF;
        assert!(matches!(
            Frame::parse(&wire),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn missing_footer() {
        let frame = Frame::new(0x10, vec![0x0001]);
        let mut wire = frame.encode().unwrap();
        let last = wire.len() - 1;
        wire[last] = 0x00;
        assert!(matches!(Frame::parse(&wire), Err(FrameError::MissingFooter)));
    }

    #[test]
    fn too_short() {
        assert!(matches!(
            Frame::parse(&[0x24, 0x24, 0x01]),
            Err(FrameError::FrameTooShort { .. })
        ));
    }

    #[test]
    fn decoder_feeds_in_arbitrary_chunks() {
        let frame = Frame::new(0x02, vec![0x0001]);
        let wire = frame.encode().unwrap();

        let mut whole = FrameDecoder::new();
        let all_at_once = whole.feed(&wire);

        let mut byte_at_a_time = FrameDecoder::new();
        let mut collected = Vec::new();
        for &b in &wire {
            collected.extend(byte_at_a_time.push_byte(b));
        }

        assert_eq!(all_at_once, vec![frame.clone()]);
        assert_eq!(collected, vec![frame]);
    }

    #[test]
    fn decoder_recovers_from_garbage_prefix() {
        let frame = Frame::new(0x02, vec![0x0001]);
        let wire = frame.encode().unwrap();
        let mut data = vec![0x00, 0xFF, 0x24, 0x99];
        data.extend_from_slice(&wire);

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&data);
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn decoder_recovers_from_bogus_datalen() {
        // A header followed by a DataLen above the protocol's valid range
        // (> 125): the decoder must resync immediately rather than stall
        // waiting for bytes that will never arrive.
        let mut data = vec![0x24, 0x24, 0xAA, 0xC8]; // DataLen=200, invalid
        let frame = Frame::new(0x02, vec![0x0001]);
        data.extend_from_slice(&frame.encode().unwrap());

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&data);
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn decoder_multiple_frames_in_one_feed() {
        let f1 = Frame::new(0x01, vec![]);
        let f2 = Frame::new(0x02, vec![0x0042]);
        let mut data = f1.encode().unwrap();
        data.extend_from_slice(&f2.encode().unwrap());

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&data);
        assert_eq!(frames, vec![f1, f2]);
    }

    #[test]
    fn decoder_idempotent_under_chunking() {
        let f1 = Frame::new(0x01, vec![0x0010]);
        let f2 = Frame::new(0x02, vec![0x0020, 0x0030]);
        let mut data = f1.encode().unwrap();
        data.extend_from_slice(&f2.encode().unwrap());

        let mut one_shot = FrameDecoder::new();
        let expected = one_shot.feed(&data);

        for chunk_size in [1usize, 2, 3, 5, 7] {
            let mut decoder = FrameDecoder::new();
            let mut got = Vec::new();
            for chunk in data.chunks(chunk_size) {
                got.extend(decoder.feed(chunk));
            }
            assert_eq!(got, expected, "mismatch at chunk_size={chunk_size}");
        }
    }
}
