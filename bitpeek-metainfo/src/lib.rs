//! Projection of a decoded bencode tree onto the single-file torrent schema.

use std::{collections::BTreeMap, convert::TryFrom, io};

use bitpeek_bencode::{DecodeError, Value};
use log::debug;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Length of a SHA-1 piece hash.
pub const PIECE_HASH_LEN: usize = 20;

pub type PieceHash = [u8; PIECE_HASH_LEN];

const ANNOUNCE_KEY: &str = "announce";
const INFO_KEY: &str = "info";
const PIECE_LENGTH_KEY: &str = "piece length";
const PIECES_KEY: &str = "pieces";
const LENGTH_KEY: &str = "length";
const NAME_KEY: &str = "name";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("not a torrent file: {0}")]
    NotATorrentFile(&'static str),

    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("malformed field {0:?}")]
    MalformedField(&'static str),
}

/// Failure of [`parse_torrent`]: either the bytes or the tree was bad.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Torrent {
    // The announce URL of the tracker
    announce: String,
    info: Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    // Bytes per piece
    piece_length: u64,
    #[serde(serialize_with = "serialize_hashes")]
    pieces: Vec<PieceHash>,
    // Total content length in bytes
    length: u64,
    // Suggested file name
    name: String,
}

impl Torrent {
    pub fn announce(&self) -> &str {
        &self.announce
    }

    pub fn info(&self) -> &Info {
        &self.info
    }
}

impl Info {
    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn pieces(&self) -> &[PieceHash] {
        &self.pieces
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of pieces `length` splits into at `piece_length` bytes each.
    pub fn expected_piece_count(&self) -> u64 {
        self.length.div_ceil(self.piece_length)
    }

    /// Whether the hash list has one entry per piece. Projection does not
    /// enforce this.
    pub fn has_consistent_piece_count(&self) -> bool {
        self.pieces.len() as u64 == self.expected_piece_count()
    }
}

impl<'a> TryFrom<&'a Value> for Torrent {
    type Error = ProjectionError;

    fn try_from(value: &'a Value) -> Result<Self, Self::Error> {
        project(value)
    }
}

/// Maps a decoded tree onto [`Torrent`], checking every field on the way.
pub fn project(root: &Value) -> Result<Torrent, ProjectionError> {
    let root = root
        .as_dict()
        .ok_or(ProjectionError::NotATorrentFile("top level is not a dictionary"))?;
    let info = match root.get(INFO_KEY.as_bytes()) {
        Some(Value::Dict(info)) => info,
        Some(_) => return Err(ProjectionError::NotATorrentFile("info is not a dictionary")),
        None => return Err(ProjectionError::NotATorrentFile("no info dictionary")),
    };

    let announce = text_field(root, ANNOUNCE_KEY)?;

    let piece_length = integer_field(info, PIECE_LENGTH_KEY)?;
    if piece_length <= 0 {
        return Err(ProjectionError::MalformedField(PIECE_LENGTH_KEY));
    }
    let length = integer_field(info, LENGTH_KEY)?;
    if length < 0 {
        return Err(ProjectionError::MalformedField(LENGTH_KEY));
    }
    let name = text_field(info, NAME_KEY)?;

    let blob = bytes_field(info, PIECES_KEY)?;
    if blob.len() % PIECE_HASH_LEN != 0 {
        return Err(ProjectionError::MalformedField(PIECES_KEY));
    }
    let pieces = chunk_pieces(blob, PIECE_HASH_LEN)
        .into_iter()
        .map(PieceHash::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ProjectionError::MalformedField(PIECES_KEY))?;

    debug!(
        "projected {:?}: {} pieces of {} bytes, {} bytes total",
        name,
        pieces.len(),
        piece_length,
        length
    );

    Ok(Torrent {
        announce,
        info: Info {
            piece_length: piece_length as u64,
            pieces,
            length: length as u64,
            name,
        },
    })
}

/// Splits `blob` into consecutive `size`-byte chunks, in order.
///
/// The last chunk is shorter than `size` when the blob length is not a
/// multiple of it; [`project`] rejects such blobs before chunking.
///
/// # Panics
///
/// Panics if `size` is 0.
pub fn chunk_pieces(blob: &[u8], size: usize) -> Vec<&[u8]> {
    blob.chunks(size).collect()
}

/// Decodes one value from `reader` and projects it. Bytes after the
/// metainfo dictionary are left in `reader`.
pub fn parse_torrent<R: io::BufRead>(reader: &mut R) -> Result<Torrent, ParseError> {
    let root = Value::decode(reader)?;
    Ok(project(&root)?)
}

fn field<'a>(
    dict: &'a BTreeMap<Vec<u8>, Value>,
    key: &'static str,
) -> Result<&'a Value, ProjectionError> {
    dict.get(key.as_bytes())
        .ok_or(ProjectionError::MissingField(key))
}

fn malformed(key: &'static str, value: &Value) -> ProjectionError {
    debug!("field {:?} holds an unusable {}", key, value.kind());
    ProjectionError::MalformedField(key)
}

fn bytes_field<'a>(
    dict: &'a BTreeMap<Vec<u8>, Value>,
    key: &'static str,
) -> Result<&'a [u8], ProjectionError> {
    let value = field(dict, key)?;
    value.as_bytes().ok_or_else(|| malformed(key, value))
}

fn text_field(
    dict: &BTreeMap<Vec<u8>, Value>,
    key: &'static str,
) -> Result<String, ProjectionError> {
    let value = field(dict, key)?;
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| malformed(key, value))
}

fn integer_field(dict: &BTreeMap<Vec<u8>, Value>, key: &'static str) -> Result<i64, ProjectionError> {
    let value = field(dict, key)?;
    value.as_integer().ok_or_else(|| malformed(key, value))
}

fn serialize_hashes<S: Serializer>(pieces: &[PieceHash], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(pieces.iter().map(hex::encode))
}
