//! Packet codec for the Niimbot wire protocol.
//!
//! Layout:
//! ```text
//! Byte 0-1:   Start marker (0x55 0x55)
//! Byte 2:     Packet type
//! Byte 3:     Payload length (N)
//! Byte 4..:   Payload (N bytes)
//! Byte 4+N:   Checksum = type ^ N ^ payload[0] ^ ... ^ payload[N-1]
//! Byte 5+N:   End marker (0xAA 0xAA)
//! ```
//!
//! Everything here is pure: no I/O, no state.

use heapless::Vec;

use crate::config::{FRAME_CAPACITY, FRAME_OVERHEAD, MAX_INBOUND_PAYLOAD, MAX_PAYLOAD};
use crate::error::CodecError;

pub const START_MARKER: [u8; 2] = [0x55, 0x55];
pub const END_MARKER: [u8; 2] = [0xAA, 0xAA];

/// An encoded frame, ready for the radio.
pub type Frame = Vec<u8, FRAME_CAPACITY>;

/// A decoded protocol unit.  Holds any payload a frame can declare;
/// only [`MAX_PAYLOAD`] bytes fit back into an outgoing frame.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub kind: u8,
    pub payload: Vec<u8, MAX_INBOUND_PAYLOAD>,
}

impl Packet {
    /// Build a packet; fails past [`MAX_INBOUND_PAYLOAD`] bytes.
    pub fn new(kind: u8, payload: &[u8]) -> Result<Self, CodecError> {
        let payload = Vec::from_slice(payload).map_err(|_| CodecError::PayloadTooLarge)?;
        Ok(Self { kind, payload })
    }

    pub fn checksum(&self) -> u8 {
        checksum(self.kind, &self.payload)
    }

    /// Total bytes this packet occupies on the wire.
    pub fn wire_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    pub fn encode(&self) -> Result<Frame, CodecError> {
        encode(self.kind, &self.payload)
    }
}

/// Outcome of a decode attempt at the head of a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A valid frame; `consumed` bytes belong to it.
    Packet { packet: Packet, consumed: usize },
    /// Not enough bytes yet - wait for more.
    Incomplete,
    /// The head of the buffer is not a valid frame.
    Invalid(CodecError),
}

/// XOR of type, length and every payload byte.
pub fn checksum(kind: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(kind ^ payload.len() as u8, |acc, b| acc ^ b)
}

/// Frame `payload` as a packet of type `kind`.
pub fn encode(kind: u8, payload: &[u8]) -> Result<Frame, CodecError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(CodecError::PayloadTooLarge);
    }

    let mut frame = Frame::new();
    // Capacity was checked above; none of these pushes can fail.
    let _ = frame.extend_from_slice(&START_MARKER);
    let _ = frame.push(kind);
    let _ = frame.push(payload.len() as u8);
    let _ = frame.extend_from_slice(payload);
    let _ = frame.push(checksum(kind, payload));
    let _ = frame.extend_from_slice(&END_MARKER);
    Ok(frame)
}

/// Read the declared frame length at the head of `buf`, if the length
/// byte is present.
pub fn declared_len(buf: &[u8]) -> Option<usize> {
    buf.get(3).map(|&len| len as usize + FRAME_OVERHEAD)
}

/// Try to decode one frame from the head of `buf`.
///
/// `Incomplete` means "wait for more bytes"; `Invalid` means the head is
/// garbage and the caller should resynchronise.
pub fn decode(buf: &[u8]) -> Decoded {
    if buf.len() < FRAME_OVERHEAD {
        return Decoded::Incomplete;
    }
    if buf[..2] != START_MARKER {
        return Decoded::Invalid(CodecError::BadStart);
    }

    let kind = buf[2];
    let len = buf[3] as usize;
    let total = len + FRAME_OVERHEAD;
    if buf.len() < total {
        return Decoded::Incomplete;
    }

    if buf[5 + len..7 + len] != END_MARKER {
        return Decoded::Invalid(CodecError::BadEnd);
    }

    let payload = &buf[4..4 + len];
    let expected = checksum(kind, payload);
    let actual = buf[4 + len];
    if expected != actual {
        return Decoded::Invalid(CodecError::Checksum { expected, actual });
    }

    match Packet::new(kind, payload) {
        Ok(packet) => Decoded::Packet {
            packet,
            consumed: total,
        },
        Err(e) => Decoded::Invalid(e),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_frame_layout() {
        let frame = encode(0xDC, &[0x01]).unwrap();
        assert_eq!(
            frame.as_slice(),
            &[0x55, 0x55, 0xDC, 0x01, 0x01, 0xDC, 0xAA, 0xAA]
        );
    }

    #[test]
    fn empty_payload_frame() {
        let frame = encode(0x40, &[]).unwrap();
        assert_eq!(frame.as_slice(), &[0x55, 0x55, 0x40, 0x00, 0x40, 0xAA, 0xAA]);
    }

    #[test]
    fn encode_rejects_oversize_payload() {
        let payload = [0u8; MAX_PAYLOAD + 1];
        assert_eq!(encode(0x85, &payload), Err(CodecError::PayloadTooLarge));
        assert!(encode(0x85, &payload[..MAX_PAYLOAD]).is_ok());
    }

    /// Hand-built frame, bypassing the encoder's size limit.
    fn raw_frame(kind: u8, payload: &[u8]) -> Vec<u8, 262> {
        let mut frame: Vec<u8, 262> = Vec::new();
        frame.extend_from_slice(&START_MARKER).unwrap();
        frame.push(kind).unwrap();
        frame.push(payload.len() as u8).unwrap();
        frame.extend_from_slice(payload).unwrap();
        frame.push(checksum(kind, payload)).unwrap();
        frame.extend_from_slice(&END_MARKER).unwrap();
        frame
    }

    #[test]
    fn decode_accepts_payloads_past_encoder_limit() {
        let payload: [u8; MAX_INBOUND_PAYLOAD] = core::array::from_fn(|i| i as u8);
        for len in [MAX_PAYLOAD + 1, 250, MAX_INBOUND_PAYLOAD] {
            let frame = raw_frame(0xDD, &payload[..len]);
            match decode(&frame) {
                Decoded::Packet { packet, consumed } => {
                    assert_eq!(packet.kind, 0xDD);
                    assert_eq!(packet.payload.as_slice(), &payload[..len]);
                    assert_eq!(consumed, len + FRAME_OVERHEAD);
                }
                other => panic!("len {len}: {other:?}"),
            }
        }
    }

    #[test]
    fn decode_roundtrip_across_types_and_lengths() {
        let mut payload = [0u8; MAX_PAYLOAD];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(31).wrapping_add(7);
        }
        for kind in 0..=u8::MAX {
            for len in 0..=MAX_PAYLOAD {
                let frame = encode(kind, &payload[..len]).unwrap();
                match decode(&frame) {
                    Decoded::Packet { packet, consumed } => {
                        assert_eq!(packet.kind, kind);
                        assert_eq!(packet.payload.as_slice(), &payload[..len]);
                        assert_eq!(consumed, len + FRAME_OVERHEAD);
                    }
                    other => panic!("kind {kind:#x} len {len}: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn decode_short_buffer_is_incomplete() {
        assert_eq!(decode(&[]), Decoded::Incomplete);
        assert_eq!(decode(&[0x55, 0x55, 0xDD]), Decoded::Incomplete);
        // Declares 1 payload byte but only 7 bytes present.
        assert_eq!(
            decode(&[0x55, 0x55, 0xDD, 0x01, 0x08, 0xAA, 0xAA]),
            Decoded::Incomplete
        );
    }

    #[test]
    fn decode_reports_bad_start() {
        let mut frame = encode(0x02, &[0x01]).unwrap();
        frame[0] = 0x00;
        assert_eq!(decode(&frame), Decoded::Invalid(CodecError::BadStart));
    }

    #[test]
    fn decode_reports_bad_end_marker() {
        let mut frame = encode(0x02, &[0x01]).unwrap();
        let last = frame.len() - 1;
        frame[last] = 0xAB;
        assert_eq!(decode(&frame), Decoded::Invalid(CodecError::BadEnd));
    }

    #[test]
    fn single_bit_flip_in_body_is_detected() {
        let frame = encode(0xB3, &[0x00, 0x01, 0x10, 0x20]).unwrap();
        let len_index = 3;
        for index in 2..frame.len() - 2 {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[index] ^= 1 << bit;
                let result = decode(&corrupted);
                if index == len_index {
                    // A longer length just looks truncated.
                    assert!(
                        !matches!(result, Decoded::Packet { .. }),
                        "length flip bit {bit} decoded"
                    );
                } else {
                    assert!(
                        matches!(result, Decoded::Invalid(_)),
                        "flip at {index} bit {bit}: {result:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn trailing_bytes_are_outside_the_frame() {
        let mut buf: Vec<u8, 32> = Vec::new();
        buf.extend_from_slice(&encode(0x14, &[0x01]).unwrap()).unwrap();
        buf.extend_from_slice(&[0xFF, 0x00, 0x13]).unwrap();
        match decode(&buf) {
            Decoded::Packet { packet, consumed } => {
                assert_eq!(packet.kind, 0x14);
                assert_eq!(consumed, 8);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn packet_checksum_matches_invariant() {
        let packet = Packet::new(0x85, &[0x00, 0x05, 0, 0, 0, 1, 0xF0]).unwrap();
        assert_eq!(packet.checksum(), 0x85 ^ 7 ^ 0x05 ^ 1 ^ 0xF0);
        assert_eq!(packet.wire_len(), 14);
        assert_eq!(packet.encode().unwrap()[11], packet.checksum());
    }

    #[test]
    fn declared_len_needs_length_byte() {
        assert_eq!(declared_len(&[0x55, 0x55, 0xDD]), None);
        assert_eq!(declared_len(&[0x55, 0x55, 0xDD, 0x09]), Some(16));
    }
}
