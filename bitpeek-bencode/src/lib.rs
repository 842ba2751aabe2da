//! Streaming bencode decoder.
//!
//! Turns a byte stream into a [`Value`] tree of integers, byte strings, lists
//! and dictionaries. Decoding is read-only; there is no encoder.
//!
//! ```
//! use bitpeek_bencode::Value;
//!
//! let value = Value::decode(&mut &b"d3:cow3:moo4:spam4:eggse"[..]).unwrap();
//! assert_eq!(value.get(b"cow").and_then(Value::as_str), Some("moo"));
//! ```

mod cursor;
mod decode;
mod error;
mod value;

pub use decode::{Decoder, DEFAULT_MAX_DEPTH};
pub use error::{DecodeError, DecodeErrorKind, Token};
pub use value::Value;
