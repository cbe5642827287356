/// Error taxonomy for sender and receiver operations.
///
/// Checksum mismatches are deliberately absent: corruption is reported
/// through the status callback and counted, never raised as an error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A malformed or truncated frame on the wire.
///
/// Terminal for the connection that produced it; the receiver's accept
/// loop survives and serves the next connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed mid-frame")]
    ConnectionClosed,
    #[error("length field is not a decimal number: {0:?}")]
    BadLength(String),
    #[error("empty header payload")]
    EmptyHeader,
    #[error("declared header length {0} is implausibly large")]
    OversizedHeader(usize),
    #[error("declared chunk length {0} is implausibly large")]
    OversizedChunk(usize),
    #[error("header payload is not valid UTF-8")]
    NotUtf8,
    #[error("header is missing the '|' delimiter")]
    MissingDelimiter,
    #[error("numeric header field does not parse: {0:?}")]
    BadNumber(String),
    #[error("unusable file name: {0:?}")]
    BadFileName(String),
}

/// Errors surfaced by [`run_sender`](crate::sender::run_sender) and
/// [`run_receiver`](crate::receiver::run_receiver).
#[derive(Debug, Error)]
pub enum TransferError {
    /// Sender preflight: the path does not name a regular file.
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    /// The host name could not be resolved to an address.
    #[error("cannot resolve address: {0}")]
    Resolve(String),
    /// The remote end is not listening.
    #[error("connection refused by {0}")]
    Refused(String),
    /// The listener could not be set up; ends the listen call itself.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
