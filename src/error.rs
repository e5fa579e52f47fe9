use thiserror::Error;

/// Errors produced by the storage substrate.
///
/// Parse errors are fatal for the containing file, block, or log segment;
/// no in-place repair is attempted. "Key not present" is never an error:
/// lookups report it as `Ok(None)`, and duplicate/overwrite outcomes on the
/// skip list are plain booleans.
#[derive(Debug, Error)]
pub enum Error {
    /// Key is not strictly greater than the previous key in a sorted builder.
    #[error("{0}: keys must be strictly increasing")]
    OutOfOrder(&'static str),

    /// Mutation attempted on a builder that has already been finalized.
    #[error("{0}: already finished")]
    AlreadyFinished(&'static str),

    /// Input bytes ended before the named structure was complete.
    #[error("truncated input while reading {0}")]
    Truncated(&'static str),

    /// Fewer than eight bytes remained where a frame header was expected.
    #[error("truncated frame header")]
    TruncatedHeader,

    /// A frame header declared more payload bytes than remain in the input.
    #[error("truncated frame payload")]
    TruncatedPayload,

    /// A payload declared key/value lengths that exceed its remaining bytes.
    #[error("truncated key/value in payload")]
    TruncatedKv,

    /// A payload is too small to contain its fixed fields.
    #[error("payload too small")]
    PayloadTooSmall,

    /// A structural invariant of an on-disk layout failed.
    #[error("corrupt {0}")]
    Corrupt(&'static str),

    /// Stored and recomputed payload checksums disagree.
    #[error("crc mismatch: computed {computed:#010x}, stored {stored:#010x}")]
    CrcMismatch { computed: u32, stored: u32 },

    /// A magic number or format version sentinel did not match.
    #[error("bad magic or version in {0}")]
    BadMagicOrVersion(&'static str),

    /// A varint length field was malformed or overlong.
    #[error("malformed varint for {0}")]
    BadLength(&'static str),

    /// Decoded parameters are outside their valid range.
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),

    /// A serialized buffer's length disagrees with its header-declared sizes.
    #[error("serialized size mismatch")]
    SizeMismatch,

    /// An operation against the file layer reported failure.
    #[error("io failure during {0}")]
    Io(&'static str),
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;
