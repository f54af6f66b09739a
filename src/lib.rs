//! A RESP2/RESP3 client whose reply decoder is directed entirely by the
//! Rust type a caller names as the target: decoding an `i64` never touches
//! the heap, decoding a `Vec<String>` does, and both live behind the same
//! pair of traits rather than a intermediate generic frame value.

pub mod alloc;
pub mod client;
pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod free;
pub mod record;
pub mod resp;
pub mod shapes;

pub use alloc::{CountingAllocator, GlobalAllocator, OwnedBytes, ReplyAllocator};
pub use client::{Client, Cmd};
pub use command::ToArg;
pub use config::ConnectOptions;
pub use decode::{DecodeAlloc, DecodeInline, decode_kv_list_alloc};
pub use error::{ClientError, DecodeError, ErrorCode};
pub use free::FreeReply;
pub use record::{DecodePositionalAlloc, DecodePositionalInline};
pub use shapes::{DynamicReply, FixBuf, KV, OrErr, OrFullErr};
