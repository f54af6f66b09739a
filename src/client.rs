//! The connected session: dials or wraps a stream, performs the RESP3
//! handshake, and exposes `send`/`pipe`/`trans` in both decode modes.
//!
//! A `Client` tracks whether its connection is still usable. Per the
//! failure-handling rules, a transport error or a decode error that lost
//! frame alignment (`DecodeError::is_localized() == false`) marks the
//! session broken; every subsequent call short-circuits with
//! [`ClientError::ConnectionBroken`] instead of touching the stream again.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;

use tracing::debug;

use crate::alloc::{GlobalAllocator, ReplyAllocator};
use crate::command::{ToArg, encode_args};
use crate::config::ConnectOptions;
use crate::decode::{DecodeAlloc, DecodeInline};
use crate::error::ClientError;
use crate::record::{DecodePositionalAlloc, DecodePositionalInline};
use crate::resp::{self, RespReader};
use crate::shapes::{FixBuf, KV};

/// A single already-encoded command, ready to be written to the wire.
/// Built once via [`Cmd::new`] so [`Client::pipe`]/[`Client::trans`] can
/// write a whole batch before reading any reply back.
pub struct Cmd {
    name: Vec<u8>,
    args: Vec<Vec<u8>>,
}

impl Cmd {
    pub fn new<A: ToArg>(name: &str, args: &[A]) -> Result<Self, ClientError> {
        let mut encoded = encode_args(name, args)?;
        let name = encoded.remove(0);
        Ok(Self { name, args: encoded })
    }

    fn all_parts(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(self.args.len() + 1);
        out.push(self.name.clone());
        out.extend(self.args.iter().cloned());
        out
    }
}

pub struct Client<S> {
    reader: RespReader<S>,
    broken: bool,
}

impl Client<TcpStream> {
    /// Dials the host in a `redis://` URL and, if it carries credentials or
    /// a database index, runs a plain `AUTH`/`SELECT` handshake -- never
    /// `HELLO 3`. Upgrading to RESP3 is an opt-in step a caller takes
    /// separately via [`Client::hello3`]; the core never issues it on its
    /// own.
    pub fn connect(url: &str) -> Result<Self, ClientError> {
        let opts = ConnectOptions::from_url(url)?;
        let addrs = (opts.host.as_str(), opts.port)
            .to_socket_addrs()
            .map_err(ClientError::Io)?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, opts.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(ClientError::Io)?;
                    let mut client = Self::attach(stream);
                    client.authenticate(&opts)?;
                    return Ok(client);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(ClientError::Io(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
        })))
    }
}

#[cfg(unix)]
impl Client<UnixStream> {
    /// Wraps a Unix domain socket with no handshake of any kind -- a local
    /// socket carries no URL to source credentials or a database index
    /// from, and (per [`Client::connect`]'s rule) the core never issues
    /// `HELLO 3` on its own either.
    pub fn connect_unix(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).map_err(ClientError::Io)?;
        Ok(Self::attach(stream))
    }
}

impl<S: Read + Write> Client<S> {
    /// Wraps an already-connected stream with no handshake performed. Use
    /// this for a stream the caller set up (TLS, a test double) rather
    /// than going through [`Client::connect`].
    pub fn attach(stream: S) -> Self {
        Self {
            reader: RespReader::new(stream),
            broken: false,
        }
    }

    /// Performs the plain `AUTH`/`SELECT` round trip [`Client::connect`]
    /// runs automatically when a `redis://` URL carries credentials or a
    /// database index. Never touches the protocol version.
    fn authenticate(&mut self, opts: &ConnectOptions) -> Result<(), ClientError> {
        if let Some(password) = &opts.password {
            if let Some(username) = &opts.username {
                self.expect_ok("AUTH", &[username.as_str(), password.as_str()])?;
            } else {
                self.expect_ok("AUTH", &[password.as_str()])?;
            }
        }
        if let Some(db) = opts.db {
            self.expect_ok("SELECT", &[db])?;
        }
        Ok(())
    }

    fn expect_ok<A: ToArg>(&mut self, name: &str, args: &[A]) -> Result<(), ClientError> {
        let reply: FixBuf<32> = self.send(name, args)?;
        if reply.as_str() != Some("OK") {
            let err = ClientError::TransactionProtocol(format!(
                "{name} not acknowledged: {:?}",
                reply.as_str()
            ));
            self.broken = true;
            return Err(err);
        }
        Ok(())
    }

    /// Upgrades the connection to RESP3 via `HELLO 3 [AUTH user pass]`. Opt
    /// in only -- neither [`Client::connect`] nor [`Client::connect_unix`]
    /// ever calls this on a caller's behalf, so a session stays on RESP2
    /// unless this is called explicitly.
    pub fn hello3(&mut self, username: Option<&str>, password: Option<&str>) -> Result<(), ClientError> {
        let mut args: Vec<&str> = vec!["3"];
        if let Some(pass) = password {
            args.push("AUTH");
            args.push(username.unwrap_or("default"));
            args.push(pass);
        }
        let alloc = GlobalAllocator;
        let reply: crate::shapes::DynamicReply = self.send_alloc("HELLO", &args, &alloc)?;
        debug!(?reply, "RESP3 handshake complete");
        Ok(())
    }

    fn guard(&self) -> Result<(), ClientError> {
        if self.broken {
            return Err(ClientError::ConnectionBroken);
        }
        Ok(())
    }

    fn note_client_err(&mut self, err: ClientError) -> ClientError {
        if !err.leaves_session_usable() {
            self.broken = true;
        }
        err
    }

    fn write_parts(&mut self, parts: &[Vec<u8>]) -> Result<(), ClientError> {
        resp::encode_command(self.reader.writer_mut(), parts).map_err(ClientError::Io)
    }

    /// Sends a single command and decodes its reply without allocating.
    pub fn send<T: DecodeInline, A: ToArg>(&mut self, name: &str, args: &[A]) -> Result<T, ClientError> {
        self.guard()?;
        let parts = encode_args(name, args)?;
        if let Err(e) = self.write_parts(&parts) {
            return Err(self.note_client_err(e));
        }
        T::decode_inline(&mut self.reader).map_err(|e| self.note_client_err(e.into()))
    }

    /// Sends a single command and decodes its reply, allowing allocation.
    pub fn send_alloc<T: DecodeAlloc, A: ToArg, Alc: ReplyAllocator>(
        &mut self,
        name: &str,
        args: &[A],
        alloc: &Alc,
    ) -> Result<T, ClientError> {
        self.guard()?;
        let parts = encode_args(name, args)?;
        if let Err(e) = self.write_parts(&parts) {
            return Err(self.note_client_err(e));
        }
        T::decode_alloc(&mut self.reader, alloc).map_err(|e| self.note_client_err(e.into()))
    }

    /// Sends a command whose reply is a list of key/value pairs. `KV<K, V>`
    /// carries no [`DecodeAlloc`] impl of its own -- the map/flat-array/
    /// nested-array wire-shape ambiguity is resolved by
    /// [`crate::decode::decode_kv_list_alloc`] instead, which this wires
    /// into the normal `Client` request/response flow the way
    /// [`Client::send_alloc`] does for any other [`DecodeAlloc`] target.
    pub fn send_kv_list_alloc<K, V, A, Alc>(
        &mut self,
        name: &str,
        args: &[A],
        alloc: &Alc,
    ) -> Result<Vec<KV<K, V>>, ClientError>
    where
        K: DecodeAlloc,
        V: DecodeAlloc,
        A: ToArg,
        Alc: ReplyAllocator,
    {
        self.guard()?;
        let parts = encode_args(name, args)?;
        if let Err(e) = self.write_parts(&parts) {
            return Err(self.note_client_err(e));
        }
        crate::decode::decode_kv_list_alloc(&mut self.reader, alloc)
            .map_err(|e| self.note_client_err(e.into()))
    }

    /// Writes every command in the batch before reading any reply back,
    /// then decodes `Rec`'s fields positionally, one per command in
    /// declaration order -- a pipeline's replies are heterogeneous, one
    /// type per position, not one uniform type repeated. `Rec` is normally
    /// declared with [`crate::resp_positional_record!`]; `commands.len()`
    /// must equal `Rec::FIELD_COUNT`.
    pub fn pipe<Rec: DecodePositionalInline>(&mut self, commands: &[Cmd]) -> Result<Rec, ClientError> {
        self.guard()?;
        if commands.len() != Rec::FIELD_COUNT {
            return Err(ClientError::InvalidArgument);
        }
        self.write_batch(commands)?;
        Rec::decode_fields_inline(&mut self.reader).map_err(|e| self.note_client_err(e.into()))
    }

    pub fn pipe_alloc<Rec: DecodePositionalAlloc, Alc: ReplyAllocator>(
        &mut self,
        commands: &[Cmd],
        alloc: &Alc,
    ) -> Result<Rec, ClientError> {
        self.guard()?;
        if commands.len() != Rec::FIELD_COUNT {
            return Err(ClientError::InvalidArgument);
        }
        self.write_batch(commands)?;
        Rec::decode_fields_alloc(&mut self.reader, alloc).map_err(|e| self.note_client_err(e.into()))
    }

    fn write_batch(&mut self, commands: &[Cmd]) -> Result<(), ClientError> {
        for cmd in commands {
            let parts = cmd.all_parts();
            if let Err(e) = self.write_parts(&parts) {
                return Err(self.note_client_err(e));
            }
        }
        Ok(())
    }

    /// Runs `commands` inside `MULTI`/`EXEC`, checking that every queued
    /// command is acknowledged with `+QUEUED` before issuing `EXEC`, then
    /// decodes `EXEC`'s single array reply as `T`. `T` is typically
    /// [`crate::shapes::OrErr`] wrapping a [`crate::resp_positional_record!`]
    /// type, so a server-aborted transaction (a nil array) and a queued
    /// command's own error both surface without an `Err` return.
    pub fn trans<T: DecodeInline>(&mut self, commands: &[Cmd]) -> Result<T, ClientError> {
        self.guard()?;
        self.expect_simple_ack("MULTI", "OK")?;
        for cmd in commands {
            let parts = cmd.all_parts();
            if let Err(e) = self.write_parts(&parts) {
                return Err(self.note_client_err(e));
            }
            self.expect_ack_reply("QUEUED")?;
        }
        self.write_parts(&[b"EXEC".to_vec()])
            .map_err(|e| self.note_client_err(e))?;
        T::decode_inline(&mut self.reader).map_err(|e| self.note_client_err(e.into()))
    }

    pub fn trans_alloc<T: DecodeAlloc, Alc: ReplyAllocator>(
        &mut self,
        commands: &[Cmd],
        alloc: &Alc,
    ) -> Result<T, ClientError> {
        self.guard()?;
        self.expect_simple_ack("MULTI", "OK")?;
        for cmd in commands {
            let parts = cmd.all_parts();
            if let Err(e) = self.write_parts(&parts) {
                return Err(self.note_client_err(e));
            }
            self.expect_ack_reply("QUEUED")?;
        }
        self.write_parts(&[b"EXEC".to_vec()])
            .map_err(|e| self.note_client_err(e))?;
        T::decode_alloc(&mut self.reader, alloc).map_err(|e| self.note_client_err(e.into()))
    }

    fn expect_simple_ack(&mut self, command: &str, expect: &str) -> Result<(), ClientError> {
        self.write_parts(&[command.as_bytes().to_vec()])
            .map_err(|e| self.note_client_err(e))?;
        self.expect_ack_reply(expect)
    }

    fn expect_ack_reply(&mut self, expect: &str) -> Result<(), ClientError> {
        let reply: FixBuf<32> =
            DecodeInline::decode_inline(&mut self.reader).map_err(|e| self.note_client_err(e.into()))?;
        if reply.as_str() != Some(expect) {
            let err = ClientError::TransactionProtocol(format!(
                "expected +{expect}, got {:?}",
                reply.as_str()
            ));
            self.broken = true;
            return Err(err);
        }
        Ok(())
    }

    /// Closes the session. No graceful `QUIT` round trip is attempted --
    /// dropping the stream is enough, and a server that wants a clean
    /// shutdown handshake gets one from `QUIT` sent through [`Client::send`]
    /// instead.
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// An in-memory duplex good enough to drive a `Client` end to end in
    /// tests: reads come from a pre-seeded buffer, writes land in a
    /// separate one the test can inspect afterward.
    struct Duplex {
        read: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.read.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_encodes_command_and_decodes_reply() {
        let duplex = Duplex {
            read: Cursor::new(b":42\r\n".to_vec()),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let v: i64 = client.send("INCR", &["counter"]).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn broken_session_rejects_further_sends() {
        let duplex = Duplex {
            read: Cursor::new(b"not-a-tag\r\n".to_vec()),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let err: Result<i64, _> = client.send("GET", &["k"]);
        assert!(err.is_err());
        let second: Result<i64, _> = client.send("GET", &["k"]);
        assert!(matches!(second, Err(ClientError::ConnectionBroken)));
    }

    #[test]
    fn localized_decode_error_leaves_session_usable() {
        let duplex = Duplex {
            read: Cursor::new(b"-ERR no such key\r\n:5\r\n".to_vec()),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let first: Result<i64, _> = client.send("GET", &["missing"]);
        assert!(first.is_err());
        let second: i64 = client.send("GET", &["present"]).unwrap();
        assert_eq!(second, 5);
    }

    crate::resp_positional_record! {
        struct ThreeCommandBatch {
            c1: crate::shapes::OrErr<FixBuf<10>>,
            c2: u64,
            c3: crate::shapes::OrErr<()>,
        }
    }

    #[test]
    fn pipe_decodes_heterogeneous_replies_positionally() {
        let duplex = Duplex {
            read: Cursor::new(b"$3\r\nfoo\r\n:9\r\n+OK\r\n".to_vec()),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let commands = vec![
            Cmd::new::<&str>("GET", &["k"]).unwrap(),
            Cmd::new::<&str>("INCR", &["n"]).unwrap(),
            Cmd::new::<&str>("PING", &[]).unwrap(),
        ];
        let batch: ThreeCommandBatch = client.pipe(&commands).unwrap();
        assert_eq!(batch.c1.ok().unwrap().as_str(), Some("foo"));
        assert_eq!(batch.c2, 9);
        assert!(batch.c3.ok().is_some());
    }

    #[test]
    fn pipe_rejects_command_count_mismatched_with_record_fields() {
        let duplex = Duplex {
            read: Cursor::new(Vec::new()),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let commands = vec![Cmd::new::<&str>("GET", &["k"]).unwrap()];
        let err = client.pipe::<ThreeCommandBatch>(&commands).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument));
    }

    #[test]
    fn trans_decodes_exec_array_into_positional_record() {
        let duplex = Duplex {
            read: Cursor::new(
                b"+OK\r\n+QUEUED\r\n+QUEUED\r\n+QUEUED\r\n*3\r\n$3\r\nfoo\r\n:9\r\n+OK\r\n".to_vec(),
            ),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let commands = vec![
            Cmd::new::<&str>("GET", &["k"]).unwrap(),
            Cmd::new::<&str>("INCR", &["n"]).unwrap(),
            Cmd::new::<&str>("PING", &[]).unwrap(),
        ];
        let batch: ThreeCommandBatch = client.trans(&commands).unwrap();
        assert_eq!(batch.c2, 9);
    }

    #[test]
    fn trans_as_or_err_catches_aborted_transaction() {
        let duplex = Duplex {
            read: Cursor::new(b"+OK\r\n+QUEUED\r\n-EXECABORT aborted\r\n".to_vec()),
            written: Vec::new(),
        };
        let mut client = Client::attach(duplex);
        let commands = vec![Cmd::new::<&str>("GET", &["k"]).unwrap()];
        let result: crate::shapes::OrErr<i64> = client.trans(&commands).unwrap();
        assert!(result.is_err());
    }
}
