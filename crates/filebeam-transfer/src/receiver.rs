/// Blocking TCP receiver: accept loop plus a per-connection transfer
/// state machine.
///
/// One connection is serviced at a time. A malformed or dropped
/// transfer closes that connection and the loop accepts the next one;
/// only bind-phase failures end the listener itself.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::checksum::checksum;
use crate::error::{FrameError, TransferError};
use crate::events::{ObserverHandle, emit_progress, emit_status};
use crate::protocol::{parse_chunk_header, parse_metadata, read_body, read_header, read_len_field};

/// How long the accept loop sleeps before re-polling the stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a receiving endpoint.
pub struct ReceiverConfig {
    pub host: String,
    pub port: u16,
    /// Directory where received files are written.
    pub save_dir: PathBuf,
    /// Bounded wait between accept attempts; a stop request is
    /// observed within one interval even while idle.
    pub poll_interval: Duration,
    pub observer: ObserverHandle,
    /// Optional pre-bound listener. When set, `host`/`port` are
    /// ignored and the accept loop runs on this listener. Lets a
    /// caller bind port 0 first and learn the real port before the
    /// loop starts.
    pub pre_bound: Option<TcpListener>,
}

impl ReceiverConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            save_dir: PathBuf::from("."),
            poll_interval: DEFAULT_POLL_INTERVAL,
            observer: None,
            pre_bound: None,
        }
    }
}

/// Accumulated state for one completed inbound transfer.
#[derive(Debug, Clone)]
pub struct RecvSummary {
    pub file_name: String,
    pub saved_path: PathBuf,
    pub bytes_received: u64,
    pub chunks_received: u64,
    pub corrupted_chunks: u64,
}

/// Listen for inbound transfers until the stop flag is set.
///
/// The flag is checked between accept attempts only; a transfer in
/// flight runs to completion or connection-drop first. A stop-flag
/// exit is `Ok(())`; only bind-phase failures return `Err`.
pub fn run_receiver(config: ReceiverConfig, stop: Arc<AtomicBool>) -> Result<(), TransferError> {
    let observer = &config.observer;

    let listener = match prepare_listener(&config) {
        Ok(listener) => listener,
        Err(err) => {
            emit_status(observer, &bind_failure_message(&config, &err));
            return Err(err);
        }
    };
    let local_addr = listener.local_addr()?;
    emit_status(
        observer,
        &format!("Listening on {local_addr} for incoming file transfers..."),
    );

    loop {
        if stop.load(Ordering::Relaxed) {
            emit_status(observer, "Stopping receiver...");
            return Ok(());
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                emit_status(observer, &format!("Connected by {peer}"));
                match serve_connection(stream, &config) {
                    Ok(summary) => {
                        tracing::debug!(
                            peer = %peer,
                            bytes = summary.bytes_received,
                            chunks = summary.chunks_received,
                            corrupted = summary.corrupted_chunks,
                            "transfer complete",
                        );
                    }
                    Err(err) => {
                        emit_status(observer, &format!("Error during file transfer: {err}"));
                        tracing::warn!(peer = %peer, "transfer failed: {err}");
                    }
                }
                emit_status(observer, "Waiting for next file transfer...");
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(config.poll_interval);
            }
            Err(err) => {
                emit_status(observer, &format!("Error accepting connection: {err}"));
                tracing::warn!("accept failed: {err}");
                thread::sleep(config.poll_interval);
            }
        }
    }
}

fn prepare_listener(config: &ReceiverConfig) -> Result<TcpListener, TransferError> {
    // A pre-bound listener skips the bind phase but still needs the
    // non-blocking accept that the poll loop relies on.
    if let Some(listener) = &config.pre_bound {
        let listener = listener.try_clone()?;
        listener.set_nonblocking(true)?;
        return Ok(listener);
    }

    let addr = match (config.host.as_str(), config.port).to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .ok_or_else(|| TransferError::Resolve(config.host.clone()))?,
        Err(_) => return Err(TransferError::Resolve(config.host.clone())),
    };
    bind_listener(addr).map_err(|source| TransferError::Bind {
        addr: format!("{}:{}", config.host, config.port),
        source,
    })
}

/// Bind with address reuse enabled so repeated runs on the same port
/// do not fail spuriously while the old socket lingers in TIME_WAIT.
fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1)?;
    let listener: TcpListener = socket.into();
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn bind_failure_message(config: &ReceiverConfig, err: &TransferError) -> String {
    match err {
        TransferError::Resolve(host) => format!("Error: Invalid address: {host}"),
        TransferError::Bind { source, .. } if source.kind() == io::ErrorKind::AddrInUse => {
            format!("Error: Port {} is already in use", config.port)
        }
        TransferError::Bind { source, .. } => {
            format!("Error binding to {}:{}: {source}", config.host, config.port)
        }
        other => format!("Error: {other}"),
    }
}

fn serve_connection(
    mut stream: TcpStream,
    config: &ReceiverConfig,
) -> Result<RecvSummary, TransferError> {
    // Accepted streams inherit non-blocking mode on some platforms.
    stream.set_nonblocking(false)?;
    receive_transfer(&mut stream, &config.save_dir, &config.observer)
}

/// Execute the inbound state machine for one established connection:
/// metadata frame, destination resolution, chunk loop, terminator.
///
/// Checksum mismatches are counted and warned about but never abort
/// the transfer; the bytes are written as received.
fn receive_transfer<R: Read>(
    wire: &mut R,
    save_dir: &Path,
    observer: &ObserverHandle,
) -> Result<RecvSummary, TransferError> {
    let header_len = read_len_field(wire)?.ok_or(FrameError::EmptyHeader)?;
    let payload = read_header(wire, header_len)?;
    let (raw_name, file_size) = parse_metadata(&payload)?;
    let file_name = sanitized_name(&raw_name)?;

    emit_status(
        observer,
        &format!("Receiving file: {file_name} ({file_size} bytes)"),
    );

    let saved_path = unique_destination(save_dir, &file_name);
    let mut out = BufWriter::new(File::create(&saved_path)?);

    let mut bytes_received = 0u64;
    let mut chunks_received = 0u64;
    let mut corrupted_chunks = 0u64;

    while let Some(header_len) = read_len_field(wire)? {
        let payload = read_header(wire, header_len)?;
        let (chunk_len, expected) = parse_chunk_header(&payload)?;
        let chunk = read_body(wire, chunk_len)?;

        if checksum(&chunk) != expected {
            corrupted_chunks += 1;
            emit_status(
                observer,
                &format!(
                    "Warning: Checksum mismatch on chunk {}. Data may be corrupted.",
                    chunks_received + 1
                ),
            );
        }

        out.write_all(&chunk)?;
        bytes_received += chunk.len() as u64;
        chunks_received += 1;

        if file_size > 0 {
            let percentage = bytes_received as f64 / file_size as f64 * 100.0;
            emit_progress(
                observer,
                percentage,
                &format!(
                    "{chunks_received} chunks ({bytes_received}/{file_size} bytes - {percentage:.1}%)"
                ),
            );
        }
    }

    out.flush()?;
    drop(out);

    if file_size == 0 {
        emit_progress(observer, 100.0, "0 chunks (0/0 bytes - 100.0%)");
    }

    if corrupted_chunks > 0 {
        emit_status(
            observer,
            &format!(
                "File received with {corrupted_chunks} corrupted chunks. Data integrity might be compromised."
            ),
        );
    } else {
        emit_status(observer, "File received successfully with verified integrity.");
    }
    emit_status(observer, &format!("Saved as: {}", saved_path.display()));

    Ok(RecvSummary {
        file_name,
        saved_path,
        bytes_received,
        chunks_received,
        corrupted_chunks,
    })
}

/// Keep only the final path component of the transmitted name, so a
/// hostile `../../x` lands inside the save directory.
fn sanitized_name(raw: &str) -> Result<String, TransferError> {
    match Path::new(raw).file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(FrameError::BadFileName(raw.to_string()).into()),
    }
}

/// Resolve the destination path, inserting `_N` before the extension
/// until the name is free. Check-then-create: not atomic against
/// writers outside this process.
fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str());

    let mut counter = 1u64;
    loop {
        let name = match extension {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use super::*;
    use crate::events::TransferObserver;
    use crate::protocol::{TERMINATOR, chunk_header_frame, encode_len_field, metadata_frame};

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<String>>,
    }

    impl TransferObserver for Recorder {
        fn on_progress(&self, _percentage: f64, _message: &str) {}
        fn on_status(&self, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }
    }

    fn wire_for(name: &str, chunks: &[(&[u8], &str)]) -> Vec<u8> {
        let total: usize = chunks.iter().map(|(data, _)| data.len()).sum();
        let mut wire = metadata_frame(name, total as u64);
        for (data, digest) in chunks {
            wire.extend_from_slice(&chunk_header_frame(data.len(), digest));
            wire.extend_from_slice(data);
        }
        wire.extend_from_slice(TERMINATOR);
        wire
    }

    fn receive(wire: Vec<u8>, dir: &Path) -> (Result<RecvSummary, TransferError>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let observer: ObserverHandle = Some(recorder.clone());
        let result = receive_transfer(&mut Cursor::new(wire), dir, &observer);
        (result, recorder)
    }

    #[test]
    fn clean_transfer_round_trips() {
        let dir = TempDir::new().unwrap();
        let data = b"chunk payload bytes";
        let wire = wire_for("out.bin", &[(data.as_slice(), &checksum(data))]);

        let (result, _) = receive(wire, dir.path());
        let summary = result.unwrap();
        assert_eq!(summary.bytes_received, data.len() as u64);
        assert_eq!(summary.chunks_received, 1);
        assert_eq!(summary.corrupted_chunks, 0);
        assert_eq!(std::fs::read(&summary.saved_path).unwrap(), data);
    }

    #[test]
    fn corrupted_chunk_is_counted_and_still_written() {
        let dir = TempDir::new().unwrap();
        let data = b"these bytes were altered in transit";
        let wire = wire_for("out.bin", &[(data.as_slice(), &checksum(b"original bytes"))]);

        let (result, recorder) = receive(wire, dir.path());
        let summary = result.unwrap();
        assert_eq!(summary.corrupted_chunks, 1);
        assert_eq!(std::fs::read(&summary.saved_path).unwrap(), data);

        let statuses = recorder.statuses.lock().unwrap();
        assert!(statuses.iter().any(|s| s.contains("Checksum mismatch on chunk 1")));
        assert!(statuses.iter().any(|s| s.contains("1 corrupted chunks")));
    }

    #[test]
    fn empty_transfer_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let wire = wire_for("empty.bin", &[]);

        let (result, _) = receive(wire, dir.path());
        let summary = result.unwrap();
        assert_eq!(summary.bytes_received, 0);
        assert_eq!(summary.chunks_received, 0);
        assert_eq!(std::fs::read(&summary.saved_path).unwrap(), b"");
    }

    #[test]
    fn metadata_without_delimiter_fails_the_connection() {
        let dir = TempDir::new().unwrap();
        let payload = b"no delimiter anywhere";
        let mut wire = encode_len_field(payload.len()).to_vec();
        wire.extend_from_slice(payload);

        let (result, _) = receive(wire, dir.path());
        assert!(matches!(
            result,
            Err(TransferError::Frame(FrameError::MissingDelimiter))
        ));
    }

    #[test]
    fn missing_terminator_fails_the_connection() {
        let dir = TempDir::new().unwrap();
        let data = b"half a transfer";
        let mut wire = wire_for("out.bin", &[(data.as_slice(), &checksum(data))]);
        wire.truncate(wire.len() - TERMINATOR.len());

        let (result, _) = receive(wire, dir.path());
        assert!(matches!(
            result,
            Err(TransferError::Frame(FrameError::ConnectionClosed))
        ));
    }

    #[test]
    fn traversal_name_lands_in_save_dir() {
        let dir = TempDir::new().unwrap();
        let data = b"x";
        let wire = wire_for("../../escape.bin", &[(data.as_slice(), &checksum(data))]);

        let (result, _) = receive(wire, dir.path());
        let summary = result.unwrap();
        assert_eq!(summary.file_name, "escape.bin");
        assert_eq!(summary.saved_path, dir.path().join("escape.bin"));
    }

    #[test]
    fn sanitized_name_rejects_empty() {
        assert!(sanitized_name("").is_err());
        assert!(sanitized_name("..").is_err());
    }

    #[test]
    fn destination_without_collision_is_unchanged() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            unique_destination(dir.path(), "file.txt"),
            dir.path().join("file.txt")
        );
    }

    #[test]
    fn collisions_insert_suffix_before_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("file.txt"), b"first").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "file.txt"),
            dir.path().join("file_1.txt")
        );

        std::fs::write(dir.path().join("file_1.txt"), b"second").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "file.txt"),
            dir.path().join("file_2.txt")
        );
    }

    #[test]
    fn collision_without_extension_appends_suffix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Makefile"), b"all:").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "Makefile"),
            dir.path().join("Makefile_1")
        );
    }
}
