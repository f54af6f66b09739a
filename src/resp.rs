//! Low-level RESP framing: the frame-tag alphabet, a buffered reader that
//! hands the type-directed decoder exactly the bytes of one frame header at
//! a time, and the command-side array writer.
//!
//! This layer never materializes a generic "any RESP value" tree -- that
//! would force an allocation on every reply even for a caller who only
//! wants an `i64`. Instead it reads a tag byte, reads the header line that
//! follows it (length, inline value, ...), and hands control back to the
//! decoder, which is the only thing that knows whether the body needs a
//! heap buffer or an inline one.

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::error::DecodeError;

pub const SIMPLE_STRING: u8 = b'+';
pub const ERROR: u8 = b'-';
pub const INTEGER: u8 = b':';
pub const BULK_STRING: u8 = b'$';
pub const ARRAY: u8 = b'*';
pub const DOUBLE: u8 = b',';
pub const BOOLEAN: u8 = b'#';
pub const BIG_NUMBER: u8 = b'(';
pub const NULL: u8 = b'_';
pub const SET: u8 = b'~';
pub const MAP: u8 = b'%';

/// True for the subset of tags that do not carry a length-prefixed body:
/// the whole frame is tag + header line.
fn is_line_only(tag: u8) -> bool {
    matches!(
        tag,
        SIMPLE_STRING | ERROR | INTEGER | DOUBLE | BOOLEAN | BIG_NUMBER | NULL
    )
}

/// Buffered, blocking reader positioned at RESP frame boundaries.
///
/// Every successful read leaves the stream positioned exactly one byte past
/// the frame just consumed (Invariant 1). A failed read leaves the position
/// undefined (Invariant 2) -- callers must treat the underlying connection
/// as unusable from that point on.
pub struct RespReader<R> {
    inner: BufReader<R>,
    line_buf: Vec<u8>,
    peeked_tag: Option<u8>,
}

impl<R: Read> RespReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            line_buf: Vec::with_capacity(128),
            peeked_tag: None,
        }
    }

    /// Reads the single tag byte that opens a frame.
    pub fn read_tag(&mut self) -> io::Result<u8> {
        if let Some(tag) = self.peeked_tag.take() {
            return Ok(tag);
        }
        let mut b = [0u8; 1];
        self.inner.read_exact(&mut b)?;
        Ok(b[0])
    }

    /// Reads one tag byte and holds onto it so the next [`Self::read_tag`]
    /// returns the same value. Used only by `Vec<KV<K, V>>`, which must look
    /// at the element tag to tell a flat `[k, v, k, v, ...]` array apart from
    /// an array of two-element sub-arrays before committing to either shape.
    pub fn peek_tag(&mut self) -> io::Result<u8> {
        if let Some(tag) = self.peeked_tag {
            return Ok(tag);
        }
        let mut b = [0u8; 1];
        self.inner.read_exact(&mut b)?;
        self.peeked_tag = Some(b[0]);
        Ok(b[0])
    }

    /// Reads the CRLF-terminated header line following a tag byte (the
    /// length for `$`/`*`/`%`/`~`, the inline value for everything else),
    /// and returns it without the trailing CRLF. The returned slice borrows
    /// the reader's scratch buffer and is only valid until the next call.
    pub fn read_header_line(&mut self) -> Result<&[u8], DecodeError> {
        self.line_buf.clear();
        let n = self
            .inner
            .read_until(b'\n', &mut self.line_buf)
            .map_err(|e| DecodeError::Protocol(e.to_string()))?;
        if n < 2 || self.line_buf[n - 2] != b'\r' || self.line_buf[n - 1] != b'\n' {
            return Err(DecodeError::Protocol(
                "frame header missing terminating CRLF".into(),
            ));
        }
        Ok(&self.line_buf[..n - 2])
    }

    /// Returns the underlying stream for writing a command, bypassing the
    /// read-side buffer entirely (RESP requests and replies never
    /// interleave on the same bytes, so this never disturbs read framing).
    pub fn writer_mut(&mut self) -> &mut R
    where
        R: Write,
    {
        self.inner.get_mut()
    }

    /// Reads exactly `len` body bytes followed by the trailing CRLF into
    /// `out`. `out.len()` must equal `len`.
    pub fn read_body_exact(&mut self, len: usize, out: &mut [u8]) -> Result<(), DecodeError> {
        debug_assert_eq!(out.len(), len);
        self.inner
            .read_exact(out)
            .map_err(|e| DecodeError::Protocol(e.to_string()))?;
        self.consume_crlf()
    }

    /// Reads exactly `len` body bytes followed by the trailing CRLF into a
    /// freshly heap-allocated buffer. Used only by the allocating decoder.
    pub fn read_body_owned(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = vec![0u8; len];
        self.read_body_exact(len, &mut buf)?;
        Ok(buf)
    }

    fn consume_crlf(&mut self) -> Result<(), DecodeError> {
        let mut crlf = [0u8; 2];
        self.inner
            .read_exact(&mut crlf)
            .map_err(|e| DecodeError::Protocol(e.to_string()))?;
        if &crlf != b"\r\n" {
            return Err(DecodeError::Protocol(
                "bulk body missing terminating CRLF".into(),
            ));
        }
        Ok(())
    }

    /// Reads and discards exactly one full frame, including all transitive
    /// children of an aggregate. This is the skip-frame subroutine: it is
    /// what lets a record tolerate unknown fields without losing frame
    /// alignment, and it is how `Void` discards a reply it does not care
    /// about.
    pub fn skip_frame(&mut self) -> Result<(), DecodeError> {
        let tag = self
            .read_tag()
            .map_err(|e| DecodeError::Protocol(e.to_string()))?;
        self.skip_frame_body(tag)
    }

    pub(crate) fn skip_frame_body(&mut self, tag: u8) -> Result<(), DecodeError> {
        if is_line_only(tag) {
            self.read_header_line()?;
            return Ok(());
        }
        match tag {
            BULK_STRING => {
                let line = self.read_header_line()?;
                let len = parse_len(line)?;
                if len < 0 {
                    return Ok(()); // nil bulk string, no body
                }
                let len = len as usize;
                let mut scratch = vec![0u8; len];
                self.read_body_exact(len, &mut scratch)
            }
            ARRAY | SET => {
                let line = self.read_header_line()?;
                let count = parse_len(line)?;
                if count < 0 {
                    return Ok(()); // nil array
                }
                for _ in 0..count {
                    self.skip_frame()?;
                }
                Ok(())
            }
            MAP => {
                let line = self.read_header_line()?;
                let count = parse_len(line)?;
                if count < 0 {
                    return Ok(());
                }
                for _ in 0..count * 2 {
                    self.skip_frame()?;
                }
                Ok(())
            }
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

/// Parses a header line's decimal value (a length or an integer body).
pub fn parse_len(line: &[u8]) -> Result<i64, DecodeError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| DecodeError::Protocol(format!("not a valid length: {line:?}")))
}

/// Writes a command as a RESP array of bulk strings -- the only shape a
/// Redis server accepts as a request, in both RESP2 and RESP3.
pub fn encode_command<W: Write>(w: &mut W, args: &[Vec<u8>]) -> io::Result<()> {
    write!(w, "*{}\r\n", args.len())?;
    for arg in args {
        write!(w, "${}\r\n", arg.len())?;
        w.write_all(arg)?;
        w.write_all(b"\r\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_header_line_strips_crlf() {
        let mut r = RespReader::new(Cursor::new(b"$5\r\n".to_vec()));
        let tag = r.read_tag().unwrap();
        assert_eq!(tag, BULK_STRING);
        assert_eq!(r.read_header_line().unwrap(), b"5");
    }

    #[test]
    fn rejects_missing_crlf() {
        let mut r = RespReader::new(Cursor::new(b"5\n".to_vec()));
        assert!(r.read_header_line().is_err());
    }

    #[test]
    fn reads_bulk_body_into_inline_buffer() {
        let mut r = RespReader::new(Cursor::new(b"hello\r\n".to_vec()));
        let mut out = [0u8; 5];
        r.read_body_exact(5, &mut out).unwrap();
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn skip_frame_consumes_nested_array() {
        let mut r = RespReader::new(Cursor::new(
            b"*2\r\n$3\r\nfoo\r\n*1\r\n:7\r\nTRAILING".to_vec(),
        ));
        r.skip_frame().unwrap();
        let mut rest = Vec::new();
        r.inner.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"TRAILING");
    }

    #[test]
    fn skip_frame_handles_nil_bulk_and_array() {
        let mut r = RespReader::new(Cursor::new(b"$-1\r\n*-1\r\n".to_vec()));
        r.skip_frame().unwrap();
        r.skip_frame().unwrap();
    }

    #[test]
    fn encode_command_produces_bulk_array() {
        let mut out = Vec::new();
        encode_command(
            &mut out,
            &[b"SET".to_vec(), b"key".to_vec(), b"42".to_vec()],
        )
        .unwrap();
        assert_eq!(
            out,
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$2\r\n42\r\n".to_vec()
        );
    }
}
