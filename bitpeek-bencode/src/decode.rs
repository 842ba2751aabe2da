use std::{collections::BTreeMap, io};

use log::trace;

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeErrorKind, Token};
use crate::value::Value;

const DELIM_TOKEN: u8 = b':';
const INTEGER_TOKEN: u8 = b'i';
const LIST_TOKEN: u8 = b'l';
const DICT_TOKEN: u8 = b'd';
const END_TOKEN: u8 = b'e';

/// Containers nested deeper than this are rejected unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Longest digit run accepted for an integer or a length prefix.
/// `-9223372036854775808` is 20 bytes.
const MAX_DIGITS: usize = 20;

impl Value {
    /// Decodes a single value from `reader`.
    ///
    /// Bytes following the value stay in `reader`. Wrap unbuffered sources such
    /// as files in a [`std::io::BufReader`] first.
    pub fn decode<R: io::BufRead>(reader: &mut R) -> Result<Value, DecodeError> {
        Decoder::new(reader).decode_next()
    }
}

/// Pull decoder over a buffered byte stream.
///
/// Each call to [`Decoder::decode_next`] yields one top-level value. A stream
/// that ends exactly between values reports [`DecodeErrorKind::StreamExhausted`];
/// ending anywhere else is reported as corruption.
pub struct Decoder<R> {
    cursor: ByteCursor<R>,
    max_depth: usize,
    finished: bool,
}

impl<R: io::BufRead> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_depth(reader, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(reader: R, max_depth: usize) -> Self {
        Self {
            cursor: ByteCursor::new(reader),
            max_depth,
            finished: false,
        }
    }

    /// Bytes consumed from the underlying reader so far.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn decode_next(&mut self) -> Result<Value, DecodeError> {
        let first = self
            .cursor
            .peek()
            .map_err(|e| DecodeError::from_io(e, self.cursor.position()))?;
        match first {
            Some(byte) => self.read_value(byte, 0),
            None => Err(DecodeError::new(
                DecodeErrorKind::StreamExhausted,
                self.cursor.position(),
            )),
        }
    }

    fn read_byte(&mut self, within: Token) -> Result<u8, DecodeError> {
        match self.cursor.next_byte() {
            Ok(Some(byte)) => Ok(byte),
            Ok(None) => Err(DecodeError::eof(within, self.cursor.position())),
            Err(e) => Err(DecodeError::from_io(e, self.cursor.position())),
        }
    }

    fn peek_byte(&mut self, within: Token) -> Result<u8, DecodeError> {
        match self.cursor.peek() {
            Ok(Some(byte)) => Ok(byte),
            Ok(None) => Err(DecodeError::eof(within, self.cursor.position())),
            Err(e) => Err(DecodeError::from_io(e, self.cursor.position())),
        }
    }

    /// Decodes the value starting with `first`, which has been peeked but not
    /// consumed.
    fn read_value(&mut self, first: u8, depth: usize) -> Result<Value, DecodeError> {
        match first {
            INTEGER_TOKEN => {
                self.cursor.advance();
                self.read_integer()
            }
            LIST_TOKEN => {
                self.cursor.advance();
                self.read_list(depth)
            }
            DICT_TOKEN => {
                self.cursor.advance();
                self.read_dict(depth)
            }
            _ => self.read_bytes().map(Value::Bytes),
        }
    }

    fn read_integer(&mut self) -> Result<Value, DecodeError> {
        let start = self.cursor.position() - 1;
        let mut digits = Vec::new();
        loop {
            let byte = self.read_byte(Token::Integer)?;
            if byte == END_TOKEN {
                break;
            }
            digits.push(byte);
            if digits.len() > MAX_DIGITS {
                return Err(malformed_integer(&digits, start));
            }
        }
        parse_integer(&digits)
            .map(Value::Integer)
            .ok_or_else(|| malformed_integer(&digits, start))
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let start = self.cursor.position();
        let mut digits = Vec::new();
        loop {
            let byte = self.read_byte(Token::LengthPrefix)?;
            if byte == DELIM_TOKEN {
                break;
            }
            digits.push(byte);
            if !byte.is_ascii_digit() || digits.len() > MAX_DIGITS {
                return Err(malformed_length(&digits, start));
            }
        }
        let length = std::str::from_utf8(&digits)
            .ok()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| malformed_length(&digits, start))?;

        self.cursor.read_exact_vec(length).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DecodeError::eof(Token::StringBody, self.cursor.position())
            } else {
                DecodeError::from_io(e, self.cursor.position())
            }
        })
    }

    fn enter(&self, depth: usize, start: u64) -> Result<(), DecodeError> {
        if depth >= self.max_depth {
            return Err(DecodeError::new(
                DecodeErrorKind::NestingTooDeep(self.max_depth),
                start,
            ));
        }
        Ok(())
    }

    fn read_list(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let start = self.cursor.position() - 1;
        self.enter(depth, start)?;
        let mut list = Vec::new();
        loop {
            let byte = self.peek_byte(Token::List)?;
            if byte == END_TOKEN {
                self.cursor.advance();
                break;
            }
            list.push(self.read_value(byte, depth + 1)?);
        }
        trace!("list of {} items at byte {}", list.len(), start);
        Ok(Value::List(list))
    }

    fn read_dict(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let start = self.cursor.position() - 1;
        self.enter(depth, start)?;
        let mut dict = BTreeMap::new();
        loop {
            let byte = self.peek_byte(Token::Dict)?;
            if byte == END_TOKEN {
                self.cursor.advance();
                break;
            }
            // Only byte strings can be keys; reject the others before descending.
            if matches!(byte, INTEGER_TOKEN | LIST_TOKEN | DICT_TOKEN) {
                return Err(DecodeError::new(
                    DecodeErrorKind::NonStringDictionaryKey,
                    self.cursor.position(),
                ));
            }
            let key = self.read_bytes()?;
            let byte = self.peek_byte(Token::Dict)?;
            let value = self.read_value(byte, depth + 1)?;
            dict.insert(key, value);
        }
        trace!("dictionary of {} entries at byte {}", dict.len(), start);
        Ok(Value::Dict(dict))
    }
}

impl<R: io::BufRead> Iterator for Decoder<R> {
    type Item = Result<Value, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.decode_next() {
            Ok(value) => Some(Ok(value)),
            Err(e) => {
                self.finished = true;
                if e.is_stream_exhausted() {
                    None
                } else {
                    Some(Err(e))
                }
            }
        }
    }
}

/// Parses `-?[0-9]+` into an `i64`. Leading zeros are tolerated.
fn parse_integer(digits: &[u8]) -> Option<i64> {
    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn malformed_integer(digits: &[u8], position: u64) -> DecodeError {
    DecodeError::new(
        DecodeErrorKind::MalformedInteger(String::from_utf8_lossy(digits).into_owned()),
        position,
    )
}

fn malformed_length(digits: &[u8], position: u64) -> DecodeError {
    DecodeError::new(
        DecodeErrorKind::MalformedLength(String::from_utf8_lossy(digits).into_owned()),
        position,
    )
}
