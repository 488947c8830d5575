//! Error types for the ClickHouse native client.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, Error>`.

use thiserror::Error;

use crate::query::ServerException;

/// Errors that can occur when using the ClickHouse client.
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error occurred on the underlying TCP connection that doesn't
    /// carry enough context to be classified as [`Error::Transport`].
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is unusable: socket closed, premature close, or the
    /// initial connect attempt was refused. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(String),

    /// TLS handshake or certificate validation failed (`tls` feature only).
    #[error("TLS error: {0}")]
    Tls(String),

    /// A connect or query timeout elapsed.
    #[error("{operation} timed out")]
    Timeout {
        /// Which operation timed out, e.g. `"connect"` or `"query"`.
        operation: &'static str,
    },

    /// The caller aborted the in-flight operation via a cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// A protocol-level error: unexpected packet type, malformed block
    /// header, or other structurally invalid data from the server. Fatal to
    /// the session.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Alias-flavored variant for violations the session-layer identifies
    /// as unrecoverable (unknown packet id, bad custom-kind byte, frame
    /// size mismatch). Kept distinct from [`Error::Protocol`] so callers can
    /// match on "the session must now close" without string inspection.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The computed CityHash128 of a compressed frame did not match the
    /// frame's embedded checksum.
    #[error("checksum mismatch in compressed frame")]
    ChecksumMismatch,

    /// An error during LZ4 or ZSTD compression/decompression.
    #[error("compression error: {0}")]
    Compression(String),

    /// A type mismatch between expected and actual column types.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The type that was expected.
        expected: String,
        /// The type that was received.
        actual: String,
    },

    /// No codec exists for a type the parser otherwise understood.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A column's custom-kind tree names a kind this build refuses to
    /// decode.
    #[error("unsupported column kind: {0}")]
    UnsupportedKind(String),

    /// On insert, the caller-supplied schema did not match the server's
    /// header block.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A second query/insert was attempted while one was already in
    /// flight on the same session.
    #[error("session is busy with another operation")]
    SessionBusy,

    /// A validation error, such as mismatched row counts in a block.
    #[error("validation error: {0}")]
    Validation(String),

    /// A typed exception returned by the server, including its nested
    /// chain. The in-flight operation fails; the session remains usable.
    #[error("server exception {}: {}", .0.code, .0.message)]
    Server(ServerException),

    /// A feature or type that has not been implemented yet.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// An invalid argument was provided to a function.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A write exceeded the available buffer capacity.
    #[error("buffer overflow")]
    BufferOverflow,

    /// Invalid UTF-8 was encountered when reading a string.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Recoverable signal used only inside the synchronous decode layer: a
    /// [`crate::io::block_stream`] read ran past the end of the currently
    /// buffered bytes. The streaming reader catches this, pulls more bytes,
    /// and retries the decode from the saved offset. This variant must
    /// never reach a caller of the public API.
    #[error("buffer underflow (internal retry signal)")]
    Underflow,
}

impl Error {
    /// True for the internal retry-on-underflow signal. Decode loops use
    /// this to distinguish "need more bytes" from a real failure.
    pub fn is_underflow(&self) -> bool {
        matches!(self, Error::Underflow)
    }
}

/// A type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
