/// Filebeam transfer core: checksummed file transfer over TCP.
///
/// Provides point-to-point transfer of a single file with:
/// - length-prefixed text frames with per-chunk MD5 headers
/// - a blocking single-pass sender
/// - an accept-loop receiver that survives bad transfers, tolerates
///   (but counts) corrupted chunks, and never overwrites an existing
///   destination file
/// - progress/status reporting through an injected observer

pub mod checksum;
pub mod error;
pub mod events;
pub mod protocol;
pub mod receiver;
pub mod sender;

// Re-export key types for convenience.
pub use checksum::checksum;
pub use error::{FrameError, TransferError};
pub use events::{NullObserver, ObserverHandle, TracingObserver, TransferObserver};
pub use protocol::{DEFAULT_CHUNK_SIZE, DELIMITER, LEN_FIELD, TERMINATOR};
pub use receiver::{DEFAULT_POLL_INTERVAL, ReceiverConfig, RecvSummary, run_receiver};
pub use sender::{SendSummary, SenderConfig, run_sender};
