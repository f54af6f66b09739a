//! `resp_record!`: a declarative-macro stand-in for a derive macro that
//! turns a plain struct definition into a record decodable from a RESP
//! map (RESP3) or a flat key/value array (RESP2), with unknown fields
//! skipped rather than rejected and missing fields reported by name.
//!
//! A derive macro would need its own proc-macro crate in this workspace;
//! `macro_rules!` gets the same ergonomics for a fixed, closed field list
//! without that extra compilation unit.

use std::io::Read;

use crate::alloc::ReplyAllocator;
use crate::decode::{DecodeAlloc, DecodeInline};
use crate::error::DecodeError;
use crate::resp::{self, ARRAY, MAP, NULL, RespReader};

/// Reads a record's header and returns how many key/value pairs follow,
/// regardless of whether the server sent a RESP3 map or a RESP2 flat array.
pub fn record_pair_count<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<i64, DecodeError> {
    match tag {
        MAP => {
            let line = r.read_header_line()?;
            let count = resp::parse_len(line)?;
            if count < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            Ok(count)
        }
        ARRAY => {
            let line = r.read_header_line()?;
            let count = resp::parse_len(line)?;
            if count < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            if count % 2 != 0 {
                return Err(DecodeError::Protocol(
                    "record array has odd element count".into(),
                ));
            }
            Ok(count / 2)
        }
        NULL => Err(DecodeError::UnexpectedNil),
        other => Err(DecodeError::UnexpectedTag { tag: other }),
    }
}

/// Reads a record field's key into `scratch` with no heap allocation.
/// Returns `usize::MAX` if the key is longer than the scratch buffer --
/// such a key can never match a known field name, so the caller treats it
/// the same as an unrecognized field, having already drained it from the
/// wire.
pub fn read_record_key_inline<R: Read>(
    r: &mut RespReader<R>,
    scratch: &mut [u8; 64],
) -> Result<usize, DecodeError> {
    let tag = r
        .read_tag()
        .map_err(|e| DecodeError::Protocol(e.to_string()))?;
    match tag {
        resp::SIMPLE_STRING => {
            let line = r.read_header_line()?;
            let len = line.len().min(scratch.len());
            scratch[..len].copy_from_slice(&line[..len]);
            if line.len() > scratch.len() {
                Ok(usize::MAX)
            } else {
                Ok(len)
            }
        }
        resp::BULK_STRING => {
            let line = r.read_header_line()?;
            let len = resp::parse_len(line)?;
            if len < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            let len = len as usize;
            if len <= scratch.len() {
                r.read_body_exact(len, &mut scratch[..len])?;
                Ok(len)
            } else {
                let mut drain = vec![0u8; len];
                r.read_body_exact(len, &mut drain)?;
                Ok(usize::MAX)
            }
        }
        other => Err(DecodeError::UnexpectedTag { tag: other }),
    }
}

/// Reads a record field's key as an owned `String`. Allocating mode only.
pub fn read_record_key_alloc<R: Read, A: ReplyAllocator>(
    r: &mut RespReader<R>,
    alloc: &A,
) -> Result<String, DecodeError> {
    String::decode_alloc(r, alloc)
}

/// Expands to `None` for a required field or `Some(default)` for a field
/// declared with a trailing `= default` expression. `macro_rules!` cannot
/// re-match a captured `:ty` fragment against `Option<$inner>`, so the
/// optional/required distinction is carried as a syntactic marker on each
/// field instead of inferred from its type.
#[macro_export]
macro_rules! __resp_record_field_init {
    () => {
        None
    };
    (= $default:expr) => {
        Some($default)
    };
}

/// Declares a struct decodable as a RESP record. Each field is either
/// `name: Type` (required -- a `MissingField` error if absent) or
/// `name: Type = default_expr` (filled with `default_expr` if absent).
/// Fields present on the wire but not named here are skipped, not
/// rejected, so a server that adds a field to a reply never breaks an
/// older client built against this macro.
#[macro_export]
macro_rules! resp_record {
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $fvis:vis $field:ident : $ftype:ty $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        $(#[$struct_meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $fvis $field: $ftype,
            )*
        }

        impl $crate::decode::DecodeInline for $name {
            fn decode_given_tag<R: ::std::io::Read>(
                tag: u8,
                r: &mut $crate::resp::RespReader<R>,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                let count = $crate::record::record_pair_count(tag, r)?;
                $(
                    let mut $field: Option<$ftype> =
                        $crate::__resp_record_field_init!($(= $default)?);
                )*
                for _ in 0..count {
                    let mut scratch = [0u8; 64];
                    let key_len = $crate::record::read_record_key_inline(r, &mut scratch)?;
                    $(
                        if key_len != usize::MAX
                            && &scratch[..key_len] == stringify!($field).as_bytes()
                        {
                            $field = Some(<$ftype as $crate::decode::DecodeInline>::decode_inline(r)?);
                            continue;
                        }
                    )*
                    r.skip_frame()?;
                }
                Ok(Self {
                    $(
                        $field: $field.ok_or($crate::error::DecodeError::MissingField(stringify!($field)))?,
                    )*
                })
            }
        }

        impl $crate::decode::DecodeAlloc for $name {
            fn decode_alloc_given_tag<R: ::std::io::Read, A: $crate::alloc::ReplyAllocator>(
                tag: u8,
                r: &mut $crate::resp::RespReader<R>,
                alloc: &A,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                let count = $crate::record::record_pair_count(tag, r)?;
                $(
                    let mut $field: Option<$ftype> =
                        $crate::__resp_record_field_init!($(= $default)?);
                )*
                for _ in 0..count {
                    let key = $crate::record::read_record_key_alloc(r, alloc)?;
                    $(
                        if key.as_bytes() == stringify!($field).as_bytes() {
                            $field = Some(<$ftype as $crate::decode::DecodeAlloc>::decode_alloc(r, alloc)?);
                            continue;
                        }
                    )*
                    r.skip_frame()?;
                }
                Ok(Self {
                    $(
                        $field: $field.ok_or($crate::error::DecodeError::MissingField(stringify!($field)))?,
                    )*
                })
            }
        }
    };
}

/// Checks that `tag` opens an array of exactly `expected` elements -- the
/// outer frame `trans`/`trans_alloc` read back from `EXEC`, which wraps a
/// positional record's fields rather than a keyed map or flat k/v array.
pub fn expect_array_of<R: Read>(tag: u8, r: &mut RespReader<R>, expected: usize) -> Result<(), DecodeError> {
    match tag {
        ARRAY => {
            let line = r.read_header_line()?;
            let count = resp::parse_len(line)?;
            if count < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            if count as usize != expected {
                return Err(DecodeError::Protocol(format!(
                    "expected {expected} positional fields, got {count}"
                )));
            }
            Ok(())
        }
        NULL => Err(DecodeError::UnexpectedNil),
        other => Err(DecodeError::UnexpectedTag { tag: other }),
    }
}

/// Decodes `Self`'s fields in declaration order from `Self::FIELD_COUNT`
/// consecutive top-level frames, with no enclosing array frame of its own.
/// This is the shape a pipeline's replies take on the wire (each command's
/// reply is its own independent top-level frame); [`Client::pipe`]
/// (`client.rs`) calls this directly. Contrast with the blanket
/// [`crate::decode::DecodeInline`] impl `resp_positional_record!` also
/// generates, which additionally reads the single `ARRAY` frame `EXEC`
/// wraps a transaction's replies in before decoding the same fields.
///
/// [`Client::pipe`]: crate::client::Client::pipe
pub trait DecodePositionalInline: Sized {
    const FIELD_COUNT: usize;

    fn decode_fields_inline<R: Read>(r: &mut RespReader<R>) -> Result<Self, DecodeError>;
}

/// Allocating counterpart of [`DecodePositionalInline`]. Blanket-implemented
/// for every positional-inline record, since `resp_positional_record!`
/// requires all-inline-compatible field types (see the macro's doc comment);
/// the allocator is accepted for interface symmetry with [`Client::pipe_alloc`]
/// but goes unused since no field here ever allocates.
///
/// [`Client::pipe_alloc`]: crate::client::Client::pipe_alloc
pub trait DecodePositionalAlloc: Sized {
    const FIELD_COUNT: usize;

    fn decode_fields_alloc<R: Read, A: ReplyAllocator>(r: &mut RespReader<R>, alloc: &A) -> Result<Self, DecodeError>;
}

impl<T: DecodePositionalInline> DecodePositionalAlloc for T {
    const FIELD_COUNT: usize = T::FIELD_COUNT;

    fn decode_fields_alloc<R: Read, A: ReplyAllocator>(r: &mut RespReader<R>, _alloc: &A) -> Result<Self, DecodeError> {
        T::decode_fields_inline(r)
    }
}

/// Declares a struct whose fields are decoded *positionally*, one per
/// successive top-level reply, rather than by key the way [`resp_record!`]
/// decodes a map. This is the shape a pipeline or `MULTI`/`EXEC` batch of
/// heterogeneous commands needs: command N's reply becomes field N, decoded
/// as field N's own declared type, in declaration order.
///
/// Every field type here must implement [`crate::decode::DecodeInline`] --
/// a positional record's fields have no keys to read, so there is no point
/// in the stream to fall back to an allocating-only decode from. A reply
/// that itself needs the heap (e.g. a `String` column) belongs in a
/// [`resp_record!`] struct reached via [`crate::decode::DecodeAlloc`]
/// instead, or decoded through [`crate::decode::DynamicReply`].
#[macro_export]
macro_rules! resp_positional_record {
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $fvis:vis $field:ident : $ftype:ty
            ),* $(,)?
        }
    ) => {
        $(#[$struct_meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $fvis $field: $ftype,
            )*
        }

        impl $crate::record::DecodePositionalInline for $name {
            const FIELD_COUNT: usize = [$(stringify!($field)),*].len();

            fn decode_fields_inline<R: ::std::io::Read>(
                r: &mut $crate::resp::RespReader<R>,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                Ok(Self {
                    $(
                        $field: <$ftype as $crate::decode::DecodeInline>::decode_inline(r)?,
                    )*
                })
            }
        }

        impl $crate::decode::DecodeInline for $name {
            fn decode_given_tag<R: ::std::io::Read>(
                tag: u8,
                r: &mut $crate::resp::RespReader<R>,
            ) -> ::std::result::Result<Self, $crate::error::DecodeError> {
                $crate::record::expect_array_of(
                    tag,
                    r,
                    <Self as $crate::record::DecodePositionalInline>::FIELD_COUNT,
                )?;
                <Self as $crate::record::DecodePositionalInline>::decode_fields_inline(r)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::GlobalAllocator;
    use crate::decode::{DecodeAlloc, DecodeInline};
    use crate::shapes::{FixBuf, OrErr};
    use std::io::Cursor;

    resp_record! {
        #[derive(Eq)]
        pub struct PingStats {
            pub id: i64,
            pub addr: FixBuf<32>,
            pub role: FixBuf<16> = FixBuf::default(),
        }
    }

    #[test]
    fn record_fills_defaults_for_missing_optional_field() {
        let mut r = RespReader::new(Cursor::new(
            b"%2\r\n$2\r\nid\r\n:7\r\n$4\r\naddr\r\n$9\r\n127.0.0.1\r\n".to_vec(),
        ));
        let v: PingStats = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v.id, 7);
        assert_eq!(v.addr.as_str(), Some("127.0.0.1"));
        assert_eq!(v.role.as_str(), Some(""));
    }

    #[test]
    fn record_skips_unknown_field() {
        let mut r = RespReader::new(Cursor::new(
            b"%2\r\n$2\r\nid\r\n:7\r\n$7\r\nunknown\r\n$3\r\nfoo\r\n".to_vec(),
        ));
        let err = <PingStats as DecodeInline>::decode_inline(&mut r).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("addr")));
    }

    #[test]
    fn record_decodes_from_flat_array_allocating() {
        let mut r = RespReader::new(Cursor::new(
            b"*4\r\n$2\r\nid\r\n:3\r\n$4\r\naddr\r\n$3\r\n::1\r\n".to_vec(),
        ));
        let alloc = GlobalAllocator;
        let v: PingStats = DecodeAlloc::decode_alloc(&mut r, &alloc).unwrap();
        assert_eq!(v.id, 3);
        assert_eq!(v.addr.as_str(), Some("::1"));
    }

    resp_positional_record! {
        pub struct TransactionBatch {
            pub c1: OrErr<FixBuf<10>>,
            pub c2: u64,
            pub c3: OrErr<()>,
        }
    }

    #[test]
    fn positional_record_decodes_fields_in_declared_order() {
        let mut r = RespReader::new(Cursor::new(
            b"$3\r\nfoo\r\n:9\r\n+OK\r\n".to_vec(),
        ));
        let v = TransactionBatch::decode_fields_inline(&mut r).unwrap();
        assert_eq!(v.c1.ok().unwrap().as_str(), Some("foo"));
        assert_eq!(v.c2, 9);
        assert!(v.c3.ok().is_some());
    }

    #[test]
    fn positional_record_reads_wrapping_exec_array() {
        let mut r = RespReader::new(Cursor::new(
            b"*3\r\n$3\r\nfoo\r\n:9\r\n+OK\r\n".to_vec(),
        ));
        let v: TransactionBatch = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v.c2, 9);
    }

    #[test]
    fn positional_record_as_or_err_catches_failed_transaction() {
        let mut r = RespReader::new(Cursor::new(b"-EXECABORT aborted\r\n".to_vec()));
        let v: OrErr<TransactionBatch> = DecodeInline::decode_inline(&mut r).unwrap();
        assert!(v.is_err());
    }

    #[test]
    fn positional_record_propagates_a_field_level_error() {
        let mut r = RespReader::new(Cursor::new(
            b"$3\r\nfoo\r\n:9\r\n-ERR queued command failed\r\n".to_vec(),
        ));
        let v = TransactionBatch::decode_fields_inline(&mut r).unwrap();
        assert!(v.c3.is_err());
    }
}
