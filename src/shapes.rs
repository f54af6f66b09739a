//! Reply container types: the library-provided polymorphic shapes a caller
//! names as a decode target when a bare primitive or record will not do.

use std::fmt;

use crate::alloc::OwnedBytes;
use crate::error::ErrorCode;

/// An inline byte buffer of capacity `N`, used as a decode target for
/// strings the caller knows an upper bound for ahead of time. Decoding a
/// body longer than `N` is a [`crate::error::DecodeError::BufferTooSmall`],
/// never a silent truncation.
#[derive(Clone, Copy)]
pub struct FixBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FixBuf<N> {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_slice()).ok()
    }

    pub(crate) fn from_body(body: &[u8]) -> Result<Self, crate::error::DecodeError> {
        if body.len() > N {
            return Err(crate::error::DecodeError::BufferTooSmall {
                capacity: N,
                needed: body.len(),
            });
        }
        let mut buf = [0u8; N];
        buf[..body.len()].copy_from_slice(body);
        Ok(Self {
            buf,
            len: body.len(),
        })
    }

    /// Builds a `FixBuf` directly from an already-filled backing array, used
    /// by the non-allocating decoder's exact-size body read (no intermediate
    /// copy through a slice).
    pub(crate) fn from_raw(buf: [u8; N], len: usize) -> Self {
        debug_assert!(len <= N);
        Self { buf, len }
    }
}

impl<const N: usize> Default for FixBuf<N> {
    fn default() -> Self {
        Self {
            buf: [0u8; N],
            len: 0,
        }
    }
}

impl<const N: usize> PartialEq for FixBuf<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}
impl<const N: usize> Eq for FixBuf<N> {}

impl<const N: usize> fmt::Debug for FixBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "FixBuf({s:?})"),
            None => write!(f, "FixBuf({:?})", self.as_slice()),
        }
    }
}

/// Tagged sum over {Ok(T), Nil, Err{code}}. Available in both non-allocating
/// and allocating decode modes since the error code is stored inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrErr<T> {
    Ok(T),
    Nil,
    Err(ErrorCode),
}

impl<T> OrErr<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            OrErr::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, OrErr::Err(_))
    }
}

/// Extends [`OrErr`] so the `Err` variant also carries the full error
/// message. Allocating mode only -- the message is heap-owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrFullErr<T> {
    Ok(T),
    Nil,
    Err { code: ErrorCode, message: String },
}

impl<T> OrFullErr<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            OrFullErr::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, OrFullErr::Err { .. })
    }
}

/// A decoded key/value pair. No invariants beyond holding the two fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KV<K, V> {
    pub key: K,
    pub value: V,
}

/// A fully dynamic reply: every RESP frame tag has a corresponding variant.
/// Allocating mode only -- this is the shape a caller reaches for when they
/// do not know ahead of time what a server will send back (e.g. `EVAL`'s
/// reply, or a debugging dump of `COMMAND DOCS`).
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicReply {
    Nil,
    Bool(bool),
    Number(i64),
    Double(f64),
    BigNumber(OwnedBytes),
    String(OwnedBytes),
    Error { code: ErrorCode, message: OwnedBytes },
    List(Vec<DynamicReply>),
    Set(Vec<DynamicReply>),
    Map(Vec<KV<DynamicReply, DynamicReply>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixbuf_rejects_overlong_body() {
        let err = FixBuf::<4>::from_body(b"hello").unwrap_err();
        assert!(matches!(
            err,
            crate::error::DecodeError::BufferTooSmall {
                capacity: 4,
                needed: 5
            }
        ));
    }

    #[test]
    fn fixbuf_accepts_exact_capacity() {
        let buf = FixBuf::<5>::from_body(b"hello").unwrap();
        assert_eq!(buf.as_slice(), b"hello");
        assert_eq!(buf.as_str(), Some("hello"));
    }

    #[test]
    fn or_err_ok_extracts_value() {
        let v: OrErr<i64> = OrErr::Ok(42);
        assert_eq!(v.ok(), Some(42));
    }
}
