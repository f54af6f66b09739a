//! Stand-in for the explicit allocator the original library threads through
//! every allocating decode and through the free-reply walker.
//!
//! Rust's own `Allocator` trait is nightly-only, so this models the same
//! contract with a small library-defined trait. Production code uses
//! [`GlobalAllocator`] (a zero-sized wrapper over the process allocator via
//! `Vec`/`Box`), and tests use [`CountingAllocator`] to check Testable
//! Property 3 (free-reply completeness) directly instead of by inference.

use std::cell::Cell;
use std::rc::Rc;

use bytes::Bytes;

/// An owned, heap-backed byte buffer produced by the allocating decoder.
/// Backed by `bytes::Bytes` so a caller can cheaply clone or slice a reply
/// buffer (e.g. to hold onto a `BigNumber`'s digits past the decode call)
/// without a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedBytes(Bytes);

impl OwnedBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

/// Allocation bookkeeping consulted by the allocating decoder and mirrored
/// by the free-reply walker. Every owning edge the decoder creates (a byte
/// buffer, a `Vec` backing store, a `Box` cell) has a matching release call
/// here. Mixing allocators between a decode call and the matching free call
/// is a caller error with undefined results, exactly as in the original.
pub trait ReplyAllocator: Clone {
    fn note_alloc(&self);
    fn note_dealloc(&self);

    fn wrap_bytes(&self, data: Vec<u8>) -> OwnedBytes {
        self.note_alloc();
        OwnedBytes(Bytes::from(data))
    }

    fn dealloc_bytes(&self, bytes: OwnedBytes) {
        drop(bytes);
        self.note_dealloc();
    }

    fn alloc_box<T>(&self, value: T) -> Box<T> {
        self.note_alloc();
        Box::new(value)
    }

    fn dealloc_box<T>(&self, value: Box<T>) {
        drop(value);
        self.note_dealloc();
    }
}

/// Production allocator: every allocation goes through the process global
/// allocator via ordinary `Vec`/`Box`, and nothing is tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalAllocator;

impl ReplyAllocator for GlobalAllocator {
    fn note_alloc(&self) {}
    fn note_dealloc(&self) {}
}

/// Test allocator that tracks the number of outstanding allocations so a
/// test can assert the free-reply walker returned the count to zero.
#[derive(Debug, Clone, Default)]
pub struct CountingAllocator {
    outstanding: Rc<Cell<i64>>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding(&self) -> i64 {
        self.outstanding.get()
    }
}

impl ReplyAllocator for CountingAllocator {
    fn note_alloc(&self) {
        self.outstanding.set(self.outstanding.get() + 1);
    }

    fn note_dealloc(&self) {
        self.outstanding.set(self.outstanding.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_allocator_tracks_bytes() {
        let a = CountingAllocator::new();
        let buf = a.wrap_bytes(vec![1, 2, 3, 4]);
        assert_eq!(a.outstanding(), 1);
        a.dealloc_bytes(buf);
        assert_eq!(a.outstanding(), 0);
    }

    #[test]
    fn counting_allocator_tracks_boxes() {
        let a = CountingAllocator::new();
        let b = a.alloc_box(42i64);
        assert_eq!(a.outstanding(), 1);
        a.dealloc_box(b);
        assert_eq!(a.outstanding(), 0);
    }
}
