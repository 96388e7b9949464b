use std::io;

use thiserror::Error;

/// Failure taxonomy for the extraction-and-decode pipeline.
///
/// Validation and decode failures are local to one payload; `SourceRead`
/// is fatal to a whole run. `SinkWrite` aborts only the affected payload
/// but leaves its output truncated, so callers must not ignore it.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A byte outside the configured alphabet (offset into the raw
    /// payload text as handed to the validator).
    #[error("invalid character {byte:#04x} at offset {offset}")]
    InvalidCharacter { byte: u8, offset: usize },

    /// Payload length after whitespace stripping is not a multiple of 4
    /// (and repair was not requested or is impossible).
    #[error("invalid length {len}: not a multiple of 4")]
    InvalidLength { len: usize },

    /// The extractor found no candidate payload in the source.
    #[error("no base64 payload found")]
    NoPayloadFound,

    /// The input source could not be read.
    #[error("source read error: {0}")]
    SourceRead(#[source] io::Error),

    /// The output sink rejected a write; the payload's output is unusable.
    #[error("sink write error: {0}")]
    SinkWrite(#[source] io::Error),
}
