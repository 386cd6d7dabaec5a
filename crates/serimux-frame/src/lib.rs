//! Checksummed, byte-stuffed packet framing.
//!
//! Every packet is a length byte plus payload plus a 16-bit additive
//! checksum, COBS-stuffed so the zero byte never appears inside a frame,
//! then terminated with a zero delimiter. Frame boundaries survive
//! arbitrary read splits, and any single corrupted byte fails validation.
//!
//! Corrupt frames are dropped, logged, and counted — one bad byte on a
//! noisy line costs one packet, never the process.

pub mod buffer;
pub mod codec;
pub mod error;

pub use buffer::FrameBuffer;
pub use codec::{checksum, corrupt_packet_count, pack, unpack, DELIMITER, MAX_PAYLOAD, OVERHEAD};
pub use error::{CodecError, Result};
