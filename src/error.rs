use std::fmt;

/// Everything that can go wrong while turning a RESP frame into a caller-chosen shape.
///
/// Variants map directly onto the error taxonomy: a decode failure is always
/// one of these, never an opaque string, so callers can match on the exact
/// cause instead of grepping a message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("wire bytes violate RESP framing: {0}")]
    Protocol(String),

    #[error("frame tag {tag:?} is incompatible with the requested shape")]
    UnexpectedTag { tag: u8 },

    #[error("nil frame where the target shape does not admit nil")]
    UnexpectedNil,

    #[error("server error {code}: {message}")]
    ServerError { code: ErrorCode, message: String },

    #[error("numeric value out of range for target type")]
    NumericRange,

    #[error("bulk body is not a valid number")]
    NotANumber,

    #[error("bulk/integer value is not a valid boolean")]
    NotABool,

    #[error("buffer of capacity {capacity} cannot hold a body of {needed} bytes")]
    BufferTooSmall { capacity: usize, needed: usize },

    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("record contains unexpected field '{0}'")]
    UnknownField(String),

    #[error("allocator could not satisfy the request")]
    AllocFailure,
}

/// A short, fixed-capacity error code, e.g. `ERR`, `WRONGTYPE`, `NOAUTH`.
///
/// Stored inline (no heap) so it is usable from the non-allocating decoder.
pub const ERROR_CODE_CAP: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    buf: [u8; ERROR_CODE_CAP],
    len: u8,
}

impl ErrorCode {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len().min(ERROR_CODE_CAP);
        let mut buf = [0u8; ERROR_CODE_CAP];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            buf,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or("")
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced from a [`Client`](crate::client::Client) operation.
///
/// Every variant other than [`ClientError::Decode`] with a localized cause
/// marks the owning session as broken (see §4.5's failure-handling rules).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection is broken and cannot be used")]
    ConnectionBroken,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("transaction acknowledgement deviated from +OK/+QUEUED: {0}")]
    TransactionProtocol(String),

    #[error("argument value is not a valid RESP command argument")]
    InvalidArgument,
}

impl DecodeError {
    /// True for the subset of decode errors the decoder guarantees it fully
    /// drained from the wire (the frame boundary was not lost), so the
    /// session can keep using the connection. Every other variant leaves the
    /// stream position undefined and the caller must close the connection.
    pub fn is_localized(&self) -> bool {
        matches!(
            self,
            DecodeError::ServerError { .. } | DecodeError::UnexpectedNil
        )
    }
}

impl ClientError {
    /// Mirrors [`DecodeError::is_localized`] at the client-error level: only
    /// decode errors whose frame was fully consumed leave the session usable.
    pub fn leaves_session_usable(&self) -> bool {
        matches!(self, ClientError::Decode(e) if e.is_localized())
    }
}
