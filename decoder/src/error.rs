use thiserror::Error;

/// Errors the decoder can surface.
///
/// `FoulPlayDetected` is deliberately absent: foul play is data returned
/// by a reducer, never a failure of the decode itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("short read: needed {needed} bytes, had {available}")]
    ShortRead { needed: usize, available: usize },

    #[error("replay ended before the move region finished decoding")]
    TruncatedReplay,

    #[error("checksum mismatch: computed {computed:#06x}, expected {expected:#06x}")]
    ChecksumMismatch { computed: u16, expected: u16 },

    #[error("unknown extra sector type {0}")]
    UnknownSectorType(i32),

    #[error("dynamic-length marker {marker:#04x} claims length {claimed}, only {available} bytes available")]
    DynamicLengthOverflow {
        marker: u8,
        claimed: usize,
        available: usize,
    },

    #[error("cooperative cancellation requested")]
    CancelRequested,
}

pub type Result<T> = std::result::Result<T, Error>;
