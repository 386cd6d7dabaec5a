//! Packet pack/unpack: length byte, additive checksum, byte stuffing.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::error::{CodecError, Result};

/// Frame delimiter. Byte stuffing guarantees it never occurs inside the
/// stuffed body, so scanning for it is enough to find frame boundaries.
pub const DELIMITER: u8 = 0x00;

/// Bytes added around every payload before stuffing: one length byte and a
/// two-byte checksum trailer.
pub const OVERHEAD: usize = 3;

/// Largest payload [`pack`] accepts. 252 + [`OVERHEAD`] is 255, the top of
/// the one-byte length field; anything longer would alias modulo 256 and
/// weaken the length check on the receiving side.
pub const MAX_PAYLOAD: usize = 252;

/// Smallest valid decoded packet: length byte, one payload byte, checksum.
const MIN_DECODED: usize = 4;

static CORRUPT_PACKETS: AtomicU64 = AtomicU64::new(0);

/// Frames that failed validation since process start. Monotonic, never
/// reset; sample it before and after an interval to measure line quality.
pub fn corrupt_packet_count() -> u64 {
    CORRUPT_PACKETS.load(Ordering::Relaxed)
}

/// 16-bit additive checksum: the byte sum modulo 65536.
///
/// Weak against reordering but catches every single-byte corruption, which
/// is the dominant failure on a point-to-point serial line.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

/// Build the wire frame for one payload.
///
/// Packet layout before stuffing:
///
/// ```text
/// ┌─────────────┬──────────────────┬───────────────────────┐
/// │ Length (1B) │ Payload (N bytes)│ Checksum (2B, BE)     │
/// │ (N+3) % 256 │                  │ sum(length ++ payload)│
/// └─────────────┴──────────────────┴───────────────────────┘
/// ```
///
/// The whole packet is then COBS-stuffed and terminated with [`DELIMITER`].
pub fn pack(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut packet = Vec::with_capacity(payload.len() + OVERHEAD);
    packet.push(((payload.len() + OVERHEAD) % 256) as u8);
    packet.extend_from_slice(payload);
    let sum = checksum(&packet);
    packet.extend_from_slice(&sum.to_be_bytes());

    let mut frame = cobs::encode_vec(&packet);
    frame.push(DELIMITER);
    Ok(frame)
}

/// Validate one delimiter-terminated frame and return its payload.
///
/// A frame that fails any check — delimiter, stuffing, length byte,
/// checksum — is counted, logged, and rejected; the caller drops it and
/// moves on. Corruption on one link never takes the process down.
pub fn unpack(frame: &[u8]) -> Result<Vec<u8>> {
    match validate(frame) {
        Ok(payload) => Ok(payload),
        Err(err) => {
            CORRUPT_PACKETS.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, frame_len = frame.len(), "dropping corrupt packet");
            Err(err)
        }
    }
}

fn validate(frame: &[u8]) -> Result<Vec<u8>> {
    let Some(body) = frame.strip_suffix(&[DELIMITER]) else {
        return Err(CodecError::MissingDelimiter);
    };

    let decoded = cobs::decode_vec(body).map_err(|_| CodecError::Stuffing)?;
    if decoded.len() < MIN_DECODED {
        return Err(CodecError::TooShort { len: decoded.len() });
    }

    let embedded = decoded[0];
    if (decoded.len() % 256) as u8 != embedded {
        return Err(CodecError::LengthMismatch {
            embedded,
            decoded: decoded.len(),
        });
    }

    let (content, trailer) = decoded.split_at(decoded.len() - 2);
    let computed = checksum(content);
    let received = u16::from_be_bytes([trailer[0], trailer[1]]);
    if computed != received {
        return Err(CodecError::ChecksumMismatch { computed, received });
    }

    Ok(content[1..].to_vec())
}
