//! The type-directed reply decoder: two sibling traits, one per decode mode,
//! each letting a caller name a Rust type as the decode target and have the
//! wire bytes shaped to fit it instead of building a generic value tree first.
//!
//! [`DecodeInline`] covers shapes that never need the heap: integers,
//! floats, `bool`, [`FixBuf`], `()`, and the nil/error wrappers
//! ([`Option`], [`OrErr`]) over any of those. [`DecodeAlloc`] covers
//! everything, including the inline set automatically (see the blanket
//! impl below) plus the heap-only shapes: [`String`], [`OwnedBytes`],
//! `Vec<T>`, `Box<T>`, [`OrFullErr`], and [`DynamicReply`].
//!
//! Both traits split their entry point from the tag-dispatch body. The
//! entry point (`decode_inline`/`decode_alloc`) reads the tag byte and, for
//! any type that does not declare `HANDLES_ERROR_TAG`, converts a RESP
//! error frame straight into `Err(DecodeError::ServerError { .. })`. The
//! dispatch body (`decode_given_tag`/`decode_alloc_given_tag`) receives an
//! already-read tag. This split is what lets `Option<T>` and `OrErr<T>`
//! see the tag once -- to check for nil or error -- and then hand that same
//! tag straight to `T`'s dispatch body without re-reading it from the wire.

use std::io::Read;
use std::mem::MaybeUninit;

use crate::alloc::{OwnedBytes, ReplyAllocator};
use crate::error::{DecodeError, ErrorCode};
use crate::resp::{
    self, ARRAY, BIG_NUMBER, BOOLEAN, BULK_STRING, DOUBLE, ERROR, INTEGER, MAP, NULL,
    RespReader, SET, SIMPLE_STRING,
};
use crate::shapes::{DynamicReply, FixBuf, KV, OrErr, OrFullErr};

/// Reads the header line of a RESP error frame (tag already consumed) and
/// splits it into its code and message.
fn read_server_error<R: Read>(r: &mut RespReader<R>) -> DecodeError {
    match r.read_header_line() {
        Ok(line) => {
            let (code, message) = split_error_line(line);
            DecodeError::ServerError { code, message }
        }
        Err(e) => e,
    }
}

fn split_error_line(line: &[u8]) -> (ErrorCode, String) {
    let text = String::from_utf8_lossy(line);
    match text.find(' ') {
        Some(idx) => (
            ErrorCode::from_bytes(text[..idx].as_bytes()),
            text[idx + 1..].to_string(),
        ),
        None => (ErrorCode::from_bytes(text.as_bytes()), String::new()),
    }
}

/// Reads a bulk string, simple string, or big number body as owned bytes.
/// Shared by `String`, `OwnedBytes`, and `DynamicReply`'s string variants.
fn read_bulk_or_simple_body<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Vec<u8>, DecodeError> {
    match tag {
        SIMPLE_STRING | BIG_NUMBER => Ok(r.read_header_line()?.to_vec()),
        BULK_STRING => {
            let line = r.read_header_line()?;
            let len = resp::parse_len(line)?;
            if len < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            r.read_body_owned(len as usize)
        }
        NULL => Err(DecodeError::UnexpectedNil),
        other => Err(DecodeError::UnexpectedTag { tag: other }),
    }
}

/// A decode target that never needs the heap.
pub trait DecodeInline: Sized {
    /// Set to `true` by types that want to see a RESP error frame
    /// themselves (e.g. [`OrErr`]) instead of having it auto-converted to
    /// `Err` by the entry point.
    const HANDLES_ERROR_TAG: bool = false;

    fn decode_inline<R: Read>(r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        let tag = r
            .read_tag()
            .map_err(|e| DecodeError::Protocol(e.to_string()))?;
        if !Self::HANDLES_ERROR_TAG && tag == ERROR {
            return Err(read_server_error(r));
        }
        Self::decode_given_tag(tag, r)
    }

    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError>;
}

/// A decode target that may allocate. Implemented automatically for every
/// [`DecodeInline`] type (see the blanket impl below), and directly for the
/// heap-only shapes.
pub trait DecodeAlloc: Sized {
    const HANDLES_ERROR_TAG: bool = false;

    fn decode_alloc<R: Read, A: ReplyAllocator>(
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        let tag = r
            .read_tag()
            .map_err(|e| DecodeError::Protocol(e.to_string()))?;
        if !Self::HANDLES_ERROR_TAG && tag == ERROR {
            return Err(read_server_error(r));
        }
        Self::decode_alloc_given_tag(tag, r, alloc)
    }

    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError>;
}

impl<T: DecodeInline> DecodeAlloc for T {
    const HANDLES_ERROR_TAG: bool = T::HANDLES_ERROR_TAG;

    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        _alloc: &A,
    ) -> Result<Self, DecodeError> {
        T::decode_given_tag(tag, r)
    }
}

/// Numeric conversion rules shared by every integer and float decode
/// target, so `i32`, `u64`, `f32`, etc. differ only in range checking.
pub trait NumericTarget: Sized {
    fn from_i64(v: i64) -> Result<Self, DecodeError>;
    fn from_f64(v: f64) -> Result<Self, DecodeError>;
}

macro_rules! impl_numeric_target_int {
    ($($t:ty),* $(,)?) => {
        $(impl NumericTarget for $t {
            fn from_i64(v: i64) -> Result<Self, DecodeError> {
                <$t>::try_from(v).map_err(|_| DecodeError::NumericRange)
            }
            fn from_f64(v: f64) -> Result<Self, DecodeError> {
                if v.fract() != 0.0 || v < <$t>::MIN as f64 || v > <$t>::MAX as f64 {
                    return Err(DecodeError::NumericRange);
                }
                Ok(v as $t)
            }
        })*
    };
}

macro_rules! impl_numeric_target_float {
    ($($t:ty),* $(,)?) => {
        $(impl NumericTarget for $t {
            fn from_i64(v: i64) -> Result<Self, DecodeError> {
                Ok(v as $t)
            }
            fn from_f64(v: f64) -> Result<Self, DecodeError> {
                Ok(v as $t)
            }
        })*
    };
}

impl_numeric_target_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_numeric_target_float!(f32, f64);

/// Numeric bulk-string bodies never need more than ~40 bytes (the longest
/// finite `f64` decimal rendering, plus sign and a margin); anything past
/// that cannot parse as a number anyway.
const NUMERIC_BODY_SCRATCH: usize = 48;

impl<T: NumericTarget> DecodeInline for T {
    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        match tag {
            INTEGER | BIG_NUMBER => {
                let line = r.read_header_line()?;
                let v = resp::parse_len(line)?;
                T::from_i64(v)
            }
            DOUBLE => {
                let line = r.read_header_line()?;
                let s = std::str::from_utf8(line).map_err(|_| DecodeError::NotANumber)?;
                let v: f64 = s.parse().map_err(|_| DecodeError::NotANumber)?;
                T::from_f64(v)
            }
            BULK_STRING => {
                let line = r.read_header_line()?;
                let len = resp::parse_len(line)?;
                if len < 0 {
                    return Err(DecodeError::UnexpectedNil);
                }
                let len = len as usize;
                if len > NUMERIC_BODY_SCRATCH {
                    let mut drain = vec![0u8; len];
                    r.read_body_exact(len, &mut drain)?;
                    return Err(DecodeError::NotANumber);
                }
                let mut buf = [0u8; NUMERIC_BODY_SCRATCH];
                r.read_body_exact(len, &mut buf[..len])?;
                let s = std::str::from_utf8(&buf[..len]).map_err(|_| DecodeError::NotANumber)?;
                if let Ok(i) = s.parse::<i64>() {
                    T::from_i64(i)
                } else {
                    let f: f64 = s.parse().map_err(|_| DecodeError::NotANumber)?;
                    T::from_f64(f)
                }
            }
            NULL => Err(DecodeError::UnexpectedNil),
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

impl DecodeInline for bool {
    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        match tag {
            BOOLEAN => {
                let line = r.read_header_line()?;
                match line {
                    b"t" => Ok(true),
                    b"f" => Ok(false),
                    _ => Err(DecodeError::NotABool),
                }
            }
            INTEGER => {
                let line = r.read_header_line()?;
                match resp::parse_len(line)? {
                    0 => Ok(false),
                    1 => Ok(true),
                    _ => Err(DecodeError::NotABool),
                }
            }
            BULK_STRING => {
                let line = r.read_header_line()?;
                let len = resp::parse_len(line)?;
                if len < 0 {
                    return Err(DecodeError::UnexpectedNil);
                }
                let len = len as usize;
                const MAX: usize = 8;
                if len > MAX {
                    let mut drain = vec![0u8; len];
                    r.read_body_exact(len, &mut drain)?;
                    return Err(DecodeError::NotABool);
                }
                let mut buf = [0u8; MAX];
                r.read_body_exact(len, &mut buf[..len])?;
                match &buf[..len] {
                    b"true" => Ok(true),
                    b"false" => Ok(false),
                    _ => Err(DecodeError::NotABool),
                }
            }
            NULL => Err(DecodeError::UnexpectedNil),
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

/// A no-op decode target that discards whatever frame it is given,
/// including every transitive child of an aggregate. Used by callers that
/// issue a command for its side effect only.
impl DecodeInline for () {
    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        r.skip_frame_body(tag)
    }
}

impl<const N: usize> DecodeInline for FixBuf<N> {
    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        match tag {
            SIMPLE_STRING | BIG_NUMBER => {
                let line = r.read_header_line()?;
                FixBuf::from_body(line)
            }
            BULK_STRING => {
                let line = r.read_header_line()?;
                let len = resp::parse_len(line)?;
                if len < 0 {
                    return Err(DecodeError::UnexpectedNil);
                }
                let len = len as usize;
                if len > N {
                    let mut drain = vec![0u8; len];
                    r.read_body_exact(len, &mut drain)?;
                    return Err(DecodeError::BufferTooSmall { capacity: N, needed: len });
                }
                let mut buf = [0u8; N];
                r.read_body_exact(len, &mut buf[..len])?;
                Ok(FixBuf::from_raw(buf, len))
            }
            NULL => Err(DecodeError::UnexpectedNil),
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

impl<T: DecodeInline> DecodeInline for Option<T> {
    const HANDLES_ERROR_TAG: bool = T::HANDLES_ERROR_TAG;

    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        if tag == NULL {
            r.read_header_line()?;
            return Ok(None);
        }
        match T::decode_given_tag(tag, r) {
            Ok(v) => Ok(Some(v)),
            Err(DecodeError::UnexpectedNil) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Catches both a nil reply and a RESP error frame, converting the latter
/// to its short error code rather than propagating it as `Err`.
impl<T: DecodeInline> DecodeInline for OrErr<T> {
    const HANDLES_ERROR_TAG: bool = true;

    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        if tag == ERROR {
            let line = r.read_header_line()?.to_vec();
            let (code, _message) = split_error_line(&line);
            return Ok(OrErr::Err(code));
        }
        if tag == NULL {
            r.read_header_line()?;
            return Ok(OrErr::Nil);
        }
        match T::decode_given_tag(tag, r) {
            Ok(v) => Ok(OrErr::Ok(v)),
            Err(DecodeError::UnexpectedNil) => Ok(OrErr::Nil),
            Err(e) => Err(e),
        }
    }
}

/// Decodes a fixed-size array in place with no intermediate `Vec`. Already
/// initialized elements are dropped individually if a later element fails,
/// so a decode error never leaks a partially built array.
impl<T: DecodeInline, const K: usize> DecodeInline for [T; K] {
    fn decode_given_tag<R: Read>(tag: u8, r: &mut RespReader<R>) -> Result<Self, DecodeError> {
        match tag {
            ARRAY | SET => {
                let line = r.read_header_line()?;
                let count = resp::parse_len(line)?;
                if count < 0 {
                    return Err(DecodeError::UnexpectedNil);
                }
                if count as usize != K {
                    return Err(DecodeError::Protocol(format!(
                        "expected {K} elements, got {count}"
                    )));
                }
                let mut arr: [MaybeUninit<T>; K] =
                    unsafe { MaybeUninit::uninit().assume_init() };
                let mut initialized = 0usize;
                for slot in arr.iter_mut() {
                    match T::decode_inline(r) {
                        Ok(v) => {
                            slot.write(v);
                            initialized += 1;
                        }
                        Err(e) => {
                            for done in &mut arr[..initialized] {
                                unsafe { done.assume_init_drop() };
                            }
                            return Err(e);
                        }
                    }
                }
                let ptr = &arr as *const [MaybeUninit<T>; K] as *const [T; K];
                let result = unsafe { ptr.read() };
                std::mem::forget(arr);
                Ok(result)
            }
            NULL => Err(DecodeError::UnexpectedNil),
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

impl DecodeAlloc for OwnedBytes {
    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        let bytes = read_bulk_or_simple_body(tag, r)?;
        Ok(alloc.wrap_bytes(bytes))
    }
}

impl DecodeAlloc for String {
    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        let bytes = read_bulk_or_simple_body(tag, r)?;
        let s = String::from_utf8(bytes)
            .map_err(|_| DecodeError::Protocol("body is not valid UTF-8".into()))?;
        alloc.note_alloc();
        Ok(s)
    }
}

/// A list or set reply. Each element is decoded via its own
/// [`DecodeAlloc`] impl, which is what makes `Vec<KV<K, V>>` able to
/// consume the array-of-two-element-sub-array wire shape automatically --
/// see [`decode_kv_list_alloc`] for the shapes this generic impl does not
/// cover (a flat alternating array, or a genuine RESP3 map).
impl<T: DecodeAlloc> DecodeAlloc for Vec<T> {
    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        match tag {
            ARRAY | SET => {
                let line = r.read_header_line()?;
                let count = resp::parse_len(line)?;
                if count < 0 {
                    return Err(DecodeError::UnexpectedNil);
                }
                let count = count as usize;
                let mut out = Vec::with_capacity(count);
                for _ in 0..count {
                    out.push(T::decode_alloc(r, alloc)?);
                }
                alloc.note_alloc();
                Ok(out)
            }
            NULL => Err(DecodeError::UnexpectedNil),
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

/// An owned pointer around a single nested frame.
impl<T: DecodeAlloc> DecodeAlloc for Box<T> {
    const HANDLES_ERROR_TAG: bool = T::HANDLES_ERROR_TAG;

    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        let inner = T::decode_alloc_given_tag(tag, r, alloc)?;
        Ok(alloc.alloc_box(inner))
    }
}

/// Like [`OrErr`] but keeps the full error message, which requires a heap
/// allocation -- this is why `OrFullErr` implements only `DecodeAlloc`.
impl<T: DecodeAlloc> DecodeAlloc for OrFullErr<T> {
    const HANDLES_ERROR_TAG: bool = true;

    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        if tag == ERROR {
            let line = r.read_header_line()?.to_vec();
            let (code, message) = split_error_line(&line);
            return Ok(OrFullErr::Err { code, message });
        }
        if tag == NULL {
            r.read_header_line()?;
            return Ok(OrFullErr::Nil);
        }
        match T::decode_alloc_given_tag(tag, r, alloc) {
            Ok(v) => Ok(OrFullErr::Ok(v)),
            Err(DecodeError::UnexpectedNil) => Ok(OrFullErr::Nil),
            Err(e) => Err(e),
        }
    }
}

impl DecodeAlloc for DynamicReply {
    const HANDLES_ERROR_TAG: bool = true;

    fn decode_alloc_given_tag<R: Read, A: ReplyAllocator>(
        tag: u8,
        r: &mut RespReader<R>,
        alloc: &A,
    ) -> Result<Self, DecodeError> {
        match tag {
            NULL => {
                r.read_header_line()?;
                Ok(DynamicReply::Nil)
            }
            BOOLEAN => {
                let line = r.read_header_line()?;
                match line {
                    b"t" => Ok(DynamicReply::Bool(true)),
                    b"f" => Ok(DynamicReply::Bool(false)),
                    _ => Err(DecodeError::NotABool),
                }
            }
            INTEGER => {
                let line = r.read_header_line()?;
                Ok(DynamicReply::Number(resp::parse_len(line)?))
            }
            DOUBLE => {
                let line = r.read_header_line()?;
                let s = std::str::from_utf8(line).map_err(|_| DecodeError::NotANumber)?;
                Ok(DynamicReply::Double(
                    s.parse().map_err(|_| DecodeError::NotANumber)?,
                ))
            }
            BIG_NUMBER => {
                let bytes = read_bulk_or_simple_body(tag, r)?;
                Ok(DynamicReply::BigNumber(alloc.wrap_bytes(bytes)))
            }
            SIMPLE_STRING | BULK_STRING => {
                let bytes = read_bulk_or_simple_body(tag, r)?;
                Ok(DynamicReply::String(alloc.wrap_bytes(bytes)))
            }
            ERROR => {
                let line = r.read_header_line()?.to_vec();
                let (code, message) = split_error_line(&line);
                Ok(DynamicReply::Error {
                    code,
                    message: alloc.wrap_bytes(message.into_bytes()),
                })
            }
            ARRAY => {
                let line = r.read_header_line()?;
                let count = resp::parse_len(line)?;
                if count < 0 {
                    return Ok(DynamicReply::Nil);
                }
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(DynamicReply::decode_alloc(r, alloc)?);
                }
                alloc.note_alloc();
                Ok(DynamicReply::List(items))
            }
            SET => {
                let line = r.read_header_line()?;
                let count = resp::parse_len(line)?;
                if count < 0 {
                    return Ok(DynamicReply::Nil);
                }
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(DynamicReply::decode_alloc(r, alloc)?);
                }
                alloc.note_alloc();
                Ok(DynamicReply::Set(items))
            }
            MAP => {
                let line = r.read_header_line()?;
                let count = resp::parse_len(line)?;
                if count < 0 {
                    return Ok(DynamicReply::Nil);
                }
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let key = DynamicReply::decode_alloc(r, alloc)?;
                    let value = DynamicReply::decode_alloc(r, alloc)?;
                    items.push(KV { key, value });
                }
                alloc.note_alloc();
                Ok(DynamicReply::Map(items))
            }
            other => Err(DecodeError::UnexpectedTag { tag: other }),
        }
    }
}

/// Decodes a reply shaped as a list of key/value pairs, resolving the
/// three wire shapes a server may use for it: a genuine RESP3 map (`%`,
/// flat key/value alternation), a flat RESP2-compatible array
/// (`[k, v, k, v, ...]`), or an array of two-element sub-arrays
/// (`[[k, v], [k, v], ...]`). `KV` itself carries no decode impl -- every
/// caller that wants a list of pairs goes through this function directly,
/// or through [`crate::client::Client::send_kv_list_alloc`], which wires it
/// into the normal request/response flow -- so the three shapes never have
/// to compete for the same blanket trait impl.
pub fn decode_kv_list_alloc<K, V, R, A>(
    r: &mut RespReader<R>,
    alloc: &A,
) -> Result<Vec<KV<K, V>>, DecodeError>
where
    K: DecodeAlloc,
    V: DecodeAlloc,
    R: Read,
    A: ReplyAllocator,
{
    let tag = r
        .read_tag()
        .map_err(|e| DecodeError::Protocol(e.to_string()))?;
    match tag {
        MAP => {
            let line = r.read_header_line()?;
            let count = resp::parse_len(line)?;
            if count < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            let mut out = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key = K::decode_alloc(r, alloc)?;
                let value = V::decode_alloc(r, alloc)?;
                out.push(KV { key, value });
            }
            alloc.note_alloc();
            Ok(out)
        }
        ARRAY => {
            let line = r.read_header_line()?;
            let count = resp::parse_len(line)?;
            if count < 0 {
                return Err(DecodeError::UnexpectedNil);
            }
            let count = count as usize;
            if count == 0 {
                return Ok(Vec::new());
            }
            let first_tag = r
                .peek_tag()
                .map_err(|e| DecodeError::Protocol(e.to_string()))?;
            let mut out = Vec::with_capacity(count);
            if first_tag == ARRAY {
                for _ in 0..count {
                    let sub_tag = r
                        .read_tag()
                        .map_err(|e| DecodeError::Protocol(e.to_string()))?;
                    if sub_tag != ARRAY {
                        return Err(DecodeError::UnexpectedTag { tag: sub_tag });
                    }
                    let sub_line = r.read_header_line()?;
                    let sub_count = resp::parse_len(sub_line)?;
                    if sub_count != 2 {
                        return Err(DecodeError::Protocol(format!(
                            "expected 2-element pair, got {sub_count}"
                        )));
                    }
                    let key = K::decode_alloc(r, alloc)?;
                    let value = V::decode_alloc(r, alloc)?;
                    out.push(KV { key, value });
                }
            } else {
                if count % 2 != 0 {
                    return Err(DecodeError::Protocol(
                        "flat key/value array has odd element count".into(),
                    ));
                }
                for _ in 0..count / 2 {
                    let key = K::decode_alloc(r, alloc)?;
                    let value = V::decode_alloc(r, alloc)?;
                    out.push(KV { key, value });
                }
            }
            alloc.note_alloc();
            Ok(out)
        }
        other => Err(DecodeError::UnexpectedTag { tag: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::GlobalAllocator;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> RespReader<Cursor<Vec<u8>>> {
        RespReader::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn decodes_integer_inline() {
        let mut r = reader(b":1000\r\n");
        let v: i64 = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v, 1000);
    }

    #[test]
    fn decodes_integer_from_bulk_string_body() {
        let mut r = reader(b"$2\r\n42\r\n");
        let v: i64 = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn decodes_float_from_bulk_string_body() {
        let mut r = reader(b"$4\r\n9.99\r\n");
        let v: f32 = DecodeInline::decode_inline(&mut r).unwrap();
        assert!((v - 9.99).abs() < 0.001);
    }

    #[test]
    fn bulk_string_non_numeric_body_is_not_a_number() {
        let mut r = reader(b"$6\r\nbanana\r\n");
        let v: Result<i64, _> = DecodeInline::decode_inline(&mut r);
        assert!(matches!(v, Err(DecodeError::NotANumber)));
    }

    #[test]
    fn decodes_bool_from_bulk_string_body() {
        let mut r = reader(b"$4\r\ntrue\r\n$5\r\nfalse\r\n");
        let a: bool = DecodeInline::decode_inline(&mut r).unwrap();
        let b: bool = DecodeInline::decode_inline(&mut r).unwrap();
        assert!(a);
        assert!(!b);
    }

    #[test]
    fn decodes_bulk_string_into_fixbuf() {
        let mut r = reader(b"$5\r\nhello\r\n");
        let v: FixBuf<16> = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v.as_str(), Some("hello"));
    }

    #[test]
    fn nil_bulk_string_becomes_none() {
        let mut r = reader(b"$-1\r\n");
        let v: Option<FixBuf<16>> = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn error_frame_converts_to_err_for_plain_types() {
        let mut r = reader(b"-ERR no such key\r\n");
        let v: Result<i64, _> = DecodeInline::decode_inline(&mut r);
        assert!(matches!(v, Err(DecodeError::ServerError { .. })));
    }

    #[test]
    fn or_err_captures_error_code() {
        let mut r = reader(b"-WRONGTYPE bad type\r\n");
        let v: OrErr<i64> = DecodeInline::decode_inline(&mut r).unwrap();
        assert!(v.is_err());
    }

    #[test]
    fn decodes_fixed_array_in_place() {
        let mut r = reader(b"*3\r\n:1\r\n:2\r\n:3\r\n");
        let v: [i64; 3] = DecodeInline::decode_inline(&mut r).unwrap();
        assert_eq!(v, [1, 2, 3]);
    }

    #[test]
    fn decodes_string_vec_allocating() {
        let mut r = reader(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        let alloc = GlobalAllocator;
        let v: Vec<String> = DecodeAlloc::decode_alloc(&mut r, &alloc).unwrap();
        assert_eq!(v, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn decodes_dynamic_reply_map() {
        let mut r = reader(b"%1\r\n$1\r\nk\r\n:9\r\n");
        let alloc = GlobalAllocator;
        let v = DynamicReply::decode_alloc(&mut r, &alloc).unwrap();
        match v {
            DynamicReply::Map(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].value, DynamicReply::Number(9));
            }
            other => panic!("expected Map, got {other:?}"),
        }
    }

    #[test]
    fn decode_kv_list_resolves_nested_pairs() {
        let mut r = reader(b"*2\r\n*2\r\n$1\r\na\r\n:1\r\n*2\r\n$1\r\nb\r\n:2\r\n");
        let alloc = GlobalAllocator;
        let v: Vec<KV<String, i64>> = decode_kv_list_alloc(&mut r, &alloc).unwrap();
        assert_eq!(v[0].key, "a");
        assert_eq!(v[1].value, 2);
    }

    #[test]
    fn decode_kv_list_resolves_flat_array() {
        let mut r = reader(b"*4\r\n$1\r\na\r\n:1\r\n$1\r\nb\r\n:2\r\n");
        let alloc = GlobalAllocator;
        let v: Vec<KV<String, i64>> = decode_kv_list_alloc(&mut r, &alloc).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].key, "b");
    }
}
