/// Blocking TCP file sender.
///
/// One synchronous pass: connect, metadata frame, chunk frames with
/// per-chunk MD5 headers, terminator. There is no acknowledgment
/// phase: a successful return means every byte was handed to the
/// transport, not that the receiver verified it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;

use crate::checksum::checksum;
use crate::error::{FrameError, TransferError};
use crate::events::{ObserverHandle, emit_progress, emit_status};
use crate::protocol::{DEFAULT_CHUNK_SIZE, TERMINATOR, chunk_header_frame, metadata_frame};

/// Configuration for one send operation.
pub struct SenderConfig {
    pub file_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Bytes per chunk; 0 falls back to [`DEFAULT_CHUNK_SIZE`].
    pub chunk_size: u32,
    pub observer: ObserverHandle,
}

impl SenderConfig {
    pub fn new(file_path: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            file_path: file_path.into(),
            host: host.into(),
            port,
            chunk_size: DEFAULT_CHUNK_SIZE,
            observer: None,
        }
    }
}

/// Totals for a completed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub bytes_sent: u64,
    pub chunks_sent: u64,
}

/// Send one file to a listening receiver. Blocks until the terminator
/// has been handed to the transport or an error ends the attempt.
///
/// Every failure is reported through the status callback before being
/// returned; the sender never retries and never resends a partially
/// transmitted file.
pub fn run_sender(config: &SenderConfig) -> Result<SendSummary, TransferError> {
    send_file(config).map_err(|err| {
        let message = match &err {
            TransferError::NotAFile(path) => {
                format!("Error: File '{}' not found", path.display())
            }
            TransferError::Resolve(host) => {
                format!("Error: Invalid address or hostname: {host}")
            }
            TransferError::Refused(addr) => format!(
                "Error: Connection refused. Make sure the receiver is running at {addr}"
            ),
            other => format!("Error sending file: {other}"),
        };
        emit_status(&config.observer, &message);
        err
    })
}

fn send_file(config: &SenderConfig) -> Result<SendSummary, TransferError> {
    let path = &config.file_path;
    if !path.is_file() {
        return Err(TransferError::NotAFile(path.clone()));
    }
    let file_size = path.metadata()?.len();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| FrameError::BadFileName(path.display().to_string()))?;
    let chunk_size = if config.chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        config.chunk_size
    };

    emit_status(
        &config.observer,
        &format!("Sending file: {file_name} ({file_size} bytes)"),
    );
    emit_status(
        &config.observer,
        &format!("Connecting to {}:{}...", config.host, config.port),
    );

    let mut file = File::open(path)?;
    let mut stream = connect(&config.host, config.port)?;
    let summary = stream_chunks(
        &mut file,
        &mut stream,
        file_name,
        file_size,
        chunk_size,
        &config.observer,
    )?;

    emit_status(&config.observer, "File sent successfully!");
    Ok(summary)
}

/// Resolve and connect, distinguishing an unresolvable host from a
/// host that is not listening. Both are terminal; neither is retried.
fn connect(host: &str, port: u16) -> Result<TcpStream, TransferError> {
    let addrs: Vec<_> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(_) => return Err(TransferError::Resolve(host.to_string())),
    };
    if addrs.is_empty() {
        return Err(TransferError::Resolve(host.to_string()));
    }
    match TcpStream::connect(&addrs[..]) {
        Ok(stream) => Ok(stream),
        Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
            Err(TransferError::Refused(format!("{host}:{port}")))
        }
        Err(err) => Err(err.into()),
    }
}

/// Frame and write the whole transfer: metadata, sequential chunks,
/// terminator. The final chunk may be short; an empty source sends
/// metadata and terminator only.
fn stream_chunks<R: Read, W: Write>(
    src: &mut R,
    wire: &mut W,
    file_name: &str,
    file_size: u64,
    chunk_size: u32,
    observer: &ObserverHandle,
) -> Result<SendSummary, TransferError> {
    wire.write_all(&metadata_frame(file_name, file_size))?;

    let total_chunks = file_size.div_ceil(chunk_size as u64);
    let mut buf = vec![0u8; chunk_size as usize];
    let mut bytes_sent = 0u64;
    let mut chunks_sent = 0u64;

    while bytes_sent < file_size {
        let to_read = (file_size - bytes_sent).min(chunk_size as u64) as usize;
        src.read_exact(&mut buf[..to_read])?;
        let chunk = &buf[..to_read];

        let digest = checksum(chunk);
        wire.write_all(&chunk_header_frame(chunk.len(), &digest))?;
        wire.write_all(chunk)?;

        chunks_sent += 1;
        bytes_sent += chunk.len() as u64;

        let percentage = bytes_sent as f64 / file_size as f64 * 100.0;
        emit_progress(
            observer,
            percentage,
            &format!(
                "{chunks_sent}/{total_chunks} chunks ({bytes_sent}/{file_size} bytes - {percentage:.1}%)"
            ),
        );
    }

    wire.write_all(TERMINATOR)?;
    wire.flush()?;

    if file_size == 0 {
        emit_progress(observer, 100.0, "0/0 chunks (0/0 bytes - 100.0%)");
    }

    Ok(SendSummary {
        bytes_sent,
        chunks_sent,
    })
}
