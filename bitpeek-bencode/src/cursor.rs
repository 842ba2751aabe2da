use std::io::{self, BufRead, Read};

/// Largest chunk reserved up front when reading a length-prefixed payload.
const READ_CHUNK: usize = 64 * 1024;

/// Byte reader over the caller's buffered stream with one byte of lookahead.
///
/// Lookahead uses the reader's own buffer, so a byte that was only peeked is
/// still there for the caller once the cursor is dropped.
pub(crate) struct ByteCursor<R> {
    reader: R,
    position: u64,
}

impl<R: BufRead> ByteCursor<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
        }
    }

    /// Number of bytes consumed so far.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Returns the next byte without consuming it, or `None` at end of stream.
    pub(crate) fn peek(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Consumes the byte last returned by [`ByteCursor::peek`].
    pub(crate) fn advance(&mut self) {
        self.reader.consume(1);
        self.position += 1;
    }

    /// Reads one byte, or `None` at end of stream.
    pub(crate) fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.advance();
        }
        Ok(byte)
    }

    /// Reads exactly `len` bytes. Running out first is an `UnexpectedEof` error.
    pub(crate) fn read_exact_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(READ_CHUNK));
        let read = self
            .reader
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut out)?;
        self.position += read as u64;
        if out.len() < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("wanted {} bytes, stream had {}", len, out.len()),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut reader = &b"ab"[..];
        let mut cursor = ByteCursor::new(&mut reader);
        assert_eq!(cursor.peek().unwrap(), Some(b'a'));
        assert_eq!(cursor.peek().unwrap(), Some(b'a'));
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.next_byte().unwrap(), Some(b'a'));
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.peek().unwrap(), Some(b'b'));
        drop(cursor);
        assert_eq!(reader, b"b");
    }

    #[test]
    fn next_byte_until_end() {
        let mut cursor = ByteCursor::new(&b"ab"[..]);
        assert_eq!(cursor.next_byte().unwrap(), Some(b'a'));
        assert_eq!(cursor.next_byte().unwrap(), Some(b'b'));
        assert_eq!(cursor.next_byte().unwrap(), None);
        assert_eq!(cursor.peek().unwrap(), None);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn read_exact_after_peek() {
        let mut cursor = ByteCursor::new(&b"spam!"[..]);
        cursor.peek().unwrap();
        assert_eq!(cursor.read_exact_vec(4).unwrap(), b"spam");
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.next_byte().unwrap(), Some(b'!'));
    }

    #[test]
    fn read_exact_short_stream() {
        let mut cursor = ByteCursor::new(&b"sp"[..]);
        let err = cursor.read_exact_vec(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn read_exact_zero_keeps_lookahead() {
        let mut cursor = ByteCursor::new(&b"e"[..]);
        assert!(cursor.read_exact_vec(0).unwrap().is_empty());
        assert_eq!(cursor.next_byte().unwrap(), Some(b'e'));
    }
}
