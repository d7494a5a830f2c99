use thiserror::Error;

/// Failure modes for the wire codec. Both variants mean the same thing to a
/// caller: the connection cannot continue and must be torn down without a
/// reply (§7 "Malformed frame / short read on wire ⇒ close the connection
/// without reply").
#[derive(Error, Debug)]
pub enum Error {
    #[error("peer disconnected or sent a short frame")]
    Disconnect,

    #[error("i/o error talking to peer: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure modes for a single typed-field read or write. Distinct from
/// [`Error`] because a field overrun does not necessarily mean the
/// connection is dead — the caller (a command handler) decides what to do
/// with it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("not enough bytes remaining in frame to read this field")]
    ShortRead,
    #[error("writing this field would exceed the frame's capacity")]
    WouldOverflow,
    #[error("string field longer than 255 bytes")]
    StringTooLong,
}
