/// Errors produced while packing payloads or validating received frames.
///
/// Every variant except the two pack-side rejections marks a corrupt frame;
/// [`unpack`](crate::codec::unpack) counts and logs those before returning.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Refused to pack: a packet carries at least one payload byte.
    #[error("payload is empty")]
    EmptyPayload,

    /// Refused to pack: the payload exceeds the one-byte length field's
    /// usable range.
    #[error("payload too large ({len} bytes, max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// The frame does not end with the delimiter byte.
    #[error("frame missing trailing delimiter")]
    MissingDelimiter,

    /// Byte-stuffing decode failed; the frame was truncated or mangled.
    #[error("byte-stuffing decode failed")]
    Stuffing,

    /// Decoded packet is shorter than the fixed header and trailer.
    #[error("decoded packet too short ({len} bytes, need at least 4)")]
    TooShort { len: usize },

    /// The embedded length byte disagrees with the decoded length.
    #[error("length mismatch (length byte {embedded}, decoded {decoded} bytes)")]
    LengthMismatch { embedded: u8, decoded: usize },

    /// The additive checksum does not match the trailer.
    #[error("checksum mismatch (computed {computed:#06x}, received {received:#06x})")]
    ChecksumMismatch { computed: u16, received: u16 },
}

pub type Result<T> = std::result::Result<T, CodecError>;
