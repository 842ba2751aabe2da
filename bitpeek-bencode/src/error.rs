use core::fmt;
use std::io;

use thiserror::Error;

/// The construct the decoder was in the middle of when input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Integer,
    LengthPrefix,
    StringBody,
    List,
    Dict,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Token::Integer => "integer",
            Token::LengthPrefix => "string length prefix",
            Token::StringBody => "string body",
            Token::List => "list",
            Token::Dict => "dictionary",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DecodeErrorKind {
    /// No bytes were left where a new value would have started.
    #[error("no more input")]
    StreamExhausted,

    #[error("input ended inside {0}")]
    UnexpectedEof(Token),

    #[error("malformed integer {0:?}")]
    MalformedInteger(String),

    #[error("malformed string length {0:?}")]
    MalformedLength(String),

    #[error("dictionary key is not a byte string")]
    NonStringDictionaryKey,

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A decoding failure together with the stream offset it was detected at.
#[derive(Debug, Error)]
#[error("{kind} (at byte {position})")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub position: u64,
}

impl DecodeError {
    pub(crate) fn new(kind: DecodeErrorKind, position: u64) -> Self {
        Self { kind, position }
    }

    pub(crate) fn from_io(e: io::Error, position: u64) -> Self {
        Self::new(DecodeErrorKind::Io(e), position)
    }

    pub(crate) fn eof(token: Token, position: u64) -> Self {
        Self::new(DecodeErrorKind::UnexpectedEof(token), position)
    }

    /// True when the stream ended cleanly between two top-level values.
    ///
    /// This is the normal "no more input" signal and not a sign of corruption.
    pub fn is_stream_exhausted(&self) -> bool {
        matches!(self.kind, DecodeErrorKind::StreamExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let err = DecodeError::eof(Token::StringBody, 7);
        assert_eq!(err.to_string(), "input ended inside string body (at byte 7)");
    }

    #[test]
    fn only_clean_end_is_exhaustion() {
        assert!(DecodeError::new(DecodeErrorKind::StreamExhausted, 0).is_stream_exhausted());
        assert!(!DecodeError::eof(Token::List, 3).is_stream_exhausted());
    }
}
