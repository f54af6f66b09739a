//! The free-reply walker: releases every heap allocation a
//! [`DecodeAlloc`](crate::decode::DecodeAlloc) decode made, through the
//! same [`ReplyAllocator`] the decode used. Freeing through a different
//! allocator instance than the one that did the allocating is a caller
//! error with undefined results, same as mixing allocators on any other
//! manual-allocation API.
//!
//! Every owning edge [`DecodeAlloc`](crate::decode::DecodeAlloc) creates
//! has a matching release call here: a `Vec`'s backing store, an
//! `OwnedBytes`/`String` buffer, a `Box` cell. Plain value types that own
//! nothing (integers, `bool`, [`FixBuf`](crate::shapes::FixBuf), and the
//! inline wrappers over them) get a no-op blanket impl via
//! [`DecodeInline`](crate::decode::DecodeInline).

use crate::alloc::{OwnedBytes, ReplyAllocator};
use crate::decode::DecodeInline;
use crate::shapes::{DynamicReply, KV, OrFullErr};

pub trait FreeReply: Sized {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A);
}

impl<T: DecodeInline> FreeReply for T {
    fn free_reply<A: ReplyAllocator>(self, _alloc: &A) {}
}

impl FreeReply for OwnedBytes {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        alloc.dealloc_bytes(self);
    }
}

impl FreeReply for String {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        drop(self);
        alloc.note_dealloc();
    }
}

impl<T: FreeReply> FreeReply for Vec<T> {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        for item in self {
            item.free_reply(alloc);
        }
        alloc.note_dealloc();
    }
}

impl<T: FreeReply> FreeReply for Box<T> {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        alloc.note_dealloc();
        (*self).free_reply(alloc);
    }
}

impl<K: FreeReply, V: FreeReply> FreeReply for KV<K, V> {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        self.key.free_reply(alloc);
        self.value.free_reply(alloc);
    }
}

impl<T: FreeReply> FreeReply for OrFullErr<T> {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        match self {
            OrFullErr::Ok(v) => v.free_reply(alloc),
            OrFullErr::Nil => {}
            OrFullErr::Err { message, .. } => {
                drop(message);
                alloc.note_dealloc();
            }
        }
    }
}

impl FreeReply for DynamicReply {
    fn free_reply<A: ReplyAllocator>(self, alloc: &A) {
        match self {
            DynamicReply::Nil | DynamicReply::Bool(_) | DynamicReply::Number(_) | DynamicReply::Double(_) => {}
            DynamicReply::BigNumber(b) | DynamicReply::String(b) => alloc.dealloc_bytes(b),
            DynamicReply::Error { message, .. } => alloc.dealloc_bytes(message),
            DynamicReply::List(items) | DynamicReply::Set(items) => {
                for item in items {
                    item.free_reply(alloc);
                }
                alloc.note_dealloc();
            }
            DynamicReply::Map(items) => {
                for kv in items {
                    kv.key.free_reply(alloc);
                    kv.value.free_reply(alloc);
                }
                alloc.note_dealloc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAllocator;
    use crate::decode::DecodeAlloc;
    use crate::resp::RespReader;
    use std::io::Cursor;

    #[test]
    fn freeing_a_decoded_vec_returns_outstanding_to_zero() {
        let alloc = CountingAllocator::new();
        let mut r = RespReader::new(Cursor::new(
            b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n".to_vec(),
        ));
        let v: Vec<String> = DecodeAlloc::decode_alloc(&mut r, &alloc).unwrap();
        assert!(alloc.outstanding() > 0);
        v.free_reply(&alloc);
        assert_eq!(alloc.outstanding(), 0);
    }

    #[test]
    fn freeing_a_dynamic_map_returns_outstanding_to_zero() {
        let alloc = CountingAllocator::new();
        let mut r = RespReader::new(Cursor::new(b"%1\r\n$1\r\nk\r\n:9\r\n".to_vec()));
        let v = DynamicReply::decode_alloc(&mut r, &alloc).unwrap();
        assert!(alloc.outstanding() > 0);
        v.free_reply(&alloc);
        assert_eq!(alloc.outstanding(), 0);
    }
}
