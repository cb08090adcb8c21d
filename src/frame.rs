//! # Frame codec
//!
//! Wraps and unwraps the wire envelope: start marker, header, body, CRC, end
//! marker.

use crate::crc;
use crate::error::FrameError;

/// `{0x01, 0xFE}`
pub const START_MARKER: [u8; 2] = [0x01, 0xFE];
/// `{0x0D, 0x0A}` — also the stream terminator `Connection` scans for.
pub const END_MARKER: [u8; 2] = [0x0D, 0x0A];

const MINIMUM_RESPONSE_LENGTH: usize = 9;

/// Build a complete on-wire frame for one command.
///
/// `len = 1 + payload.len()` counts the command-code byte plus payload.
pub fn encode(to: u8, from: u8, seq: u8, cmd_code: u8, payload: &[u8]) -> Vec<u8> {
    let body_len = 1 + payload.len();
    let mut framed = Vec::with_capacity(2 + 5 + body_len + 2 + 2);
    framed.extend_from_slice(&START_MARKER);

    let mut checked = Vec::with_capacity(5 + body_len);
    checked.push(to);
    checked.push(from);
    checked.push(seq);
    checked.extend_from_slice(&(body_len as u16).to_le_bytes());
    checked.push(cmd_code);
    checked.extend_from_slice(payload);

    let (crc_lo, crc_hi) = crc::checksum(&checked);

    framed.extend_from_slice(&checked);
    framed.push(crc_lo);
    framed.push(crc_hi);
    framed.extend_from_slice(&END_MARKER);
    framed
}

/// Unwrap a received frame (already delimited by [`END_MARKER`]) down to its
/// body: `[cmd_code, result_code?, payload...]`.
pub fn decode(frame: &[u8]) -> Result<&[u8], FrameError> {
    let len = frame.len();
    if len < MINIMUM_RESPONSE_LENGTH {
        return Err(FrameError::InvalidResponseLength);
    }
    if frame[0] != START_MARKER[0] || frame[1] != START_MARKER[1] {
        return Err(FrameError::InvalidStartByte);
    }

    let checked = &frame[2..len - 4];
    let (crc_lo, crc_hi) = crc::checksum(checked);
    let (recv_lo, recv_hi) = (frame[len - 4], frame[len - 3]);
    if crc_lo != recv_lo || crc_hi != recv_hi {
        return Err(FrameError::InvalidCrc(crc_lo, crc_hi, recv_lo, recv_hi));
    }

    let body_len = u16::from_le_bytes([frame[5], frame[6]]) as usize;
    let body_start = 7;
    let body_end = body_start + body_len;
    if body_end > len {
        return Err(FrameError::InvalidResponseLength);
    }
    Ok(&frame[body_start..body_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_empty_payload() {
        let framed = encode(1, 0, 1, 0, &[]);
        let body = decode(&framed).unwrap();
        assert_eq!(body, &[0x00]);
    }

    #[test]
    fn round_trips_arbitrary_payload() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01];
        let framed = encode(1, 0, 42, 7, &payload);
        let body = decode(&framed).unwrap();
        let mut expected = vec![7u8];
        expected.extend_from_slice(&payload);
        assert_eq!(body, expected.as_slice());
    }

    #[test]
    fn get_version_frame_matches_wire_layout() {
        // (to=1, from=0, seq=1, cmd=GET_VERSION=0, payload=[])
        let framed = encode(1, 0, 1, 0, &[]);
        assert_eq!(&framed[0..2], &START_MARKER);
        assert_eq!(&framed[2..7], &[1, 0, 1, 1, 0]);
        assert_eq!(framed[7], 0x00); // cmd code
        assert_eq!(&framed[framed.len() - 2..], &END_MARKER);
    }

    #[test]
    fn rejects_short_frame() {
        assert_eq!(decode(&[0; 8]), Err(FrameError::InvalidResponseLength));
    }

    #[test]
    fn rejects_bad_start_marker() {
        let mut framed = encode(1, 0, 1, 0, &[]);
        framed[1] = 0xFE; // already correct; flip byte 0 instead
        framed[0] = 0x02;
        assert_eq!(decode(&framed), Err(FrameError::InvalidStartByte));
    }

    #[test]
    fn rejects_corrupted_crc() {
        let mut framed = encode(1, 0, 1, 0, &[]);
        let crc_idx = framed.len() - 4;
        framed[crc_idx] ^= 0xFF;
        assert!(matches!(decode(&framed), Err(FrameError::InvalidCrc(..))));
    }
}
