use thiserror::Error;

/// The error type for parsing and emitting headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum Error {
    /// An incoming packet could not be parsed because it was shorter than assumed.
    ///
    /// The packet may be shorter than the minimum length specified, a size longer than the actual
    /// payload. For variable length headers, this may be because some of its fields were out of
    /// bounds of the received data.
    #[error("truncated packet")]
    Truncated,

    /// An incoming packet had an incorrect checksum and was dropped.
    ///
    /// Checksum checks can be switched off with [`Checksum::Ignored`].
    ///
    /// [`Checksum::Ignored`]: enum.Checksum.html#variant.Ignored
    #[error("checksum error")]
    WrongChecksum,

    /// An incoming packet could not be recognized and was dropped.
    ///
    /// E.g. a frame with a dispatch value that has no meaning in 6LoWPAN, or a `LOWPAN_NHC` octet
    /// outside the extension header and UDP ranges.
    #[error("unrecognized packet")]
    Unrecognized,

    /// An incoming packet was recognized but was self-contradictory.
    ///
    /// Examples: an IPHC header with a reserved destination address mode; an extension header
    /// whose length is not a multiple of eight octets.
    #[error("malformed packet")]
    Malformed,

    /// Parsing depends on information derived from a non-implemented feature.
    ///
    /// Similar to `Unrecognized` but in contrast we know that our implementation is incomplete.
    /// An example is an HC1 header announcing a following HC2 encoding.
    #[error("unsupported option")]
    Unsupported,
}

/// The result type for header parsing.
pub type Result<T> = core::result::Result<T, Error>;
