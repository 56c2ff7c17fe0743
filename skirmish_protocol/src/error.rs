use thiserror::Error;

/// Failure to read a packet back into typed fields.
///
/// Readers and writers share no tagging, so most of these mean the sender
/// wrote a different field list than the receiver expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet of {len} bytes is shorter than the 3-byte header")]
    TooShort { len: usize },
    #[error("read past end of packet: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u64 },
}
