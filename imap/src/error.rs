//! Error types for the IMAP library.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Protocol parsing error.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Could not establish the underlying connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection dropped unexpectedly mid-operation.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The server greeting was not OK/PREAUTH.
    #[error("greeting failed: {0}")]
    GreetingFailed(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    LoginFailed(String),

    /// SELECT/EXAMINE failed.
    #[error("select failed: {0}")]
    SelectFailed(String),

    /// FETCH failed.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// STORE failed.
    #[error("store failed: {0}")]
    StoreFailed(String),

    /// COPY failed.
    #[error("copy failed: {0}")]
    CopyFailed(String),

    /// EXPUNGE failed.
    #[error("expunge failed: {0}")]
    ExpungeFailed(String),

    /// A command other than one with a dedicated variant failed.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// A caller-supplied argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A command was given an empty identifier set.
    #[error("identifier set is empty")]
    EmptyIdentifierSet,

    /// The server does not advertise the capability required for this command.
    #[error("command not supported: {0}")]
    CommandNotSupported(String),

    /// A convenience operation (move-to-trash, archive, ...) could not
    /// resolve a destination mailbox of the given special-use kind.
    #[error("no {0} mailbox found on this server")]
    UndefinedFolder(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation timed out.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
