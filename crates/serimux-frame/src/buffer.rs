//! Per-link reassembly of raw reads into delimiter-terminated frames.

use bytes::{Bytes, BytesMut};

use crate::codec::DELIMITER;

/// Initial capacity for each link's reassembly buffer.
const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Accumulates raw bytes from one link and yields complete frames.
///
/// Serial reads split frames arbitrarily; whatever arrives is appended here
/// and frames are cut at each delimiter. Bytes after the last delimiter stay
/// buffered until more arrive — nothing is discarded speculatively, so a
/// frame split across any number of reads reassembles intact.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append raw bytes read from the link.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, delimiter included, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        let pos = self.buf.iter().position(|&byte| byte == DELIMITER)?;
        Some(self.buf.split_to(pos + 1).freeze())
    }

    /// Bytes buffered but not yet terminated by a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
